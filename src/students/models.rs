use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 30;
pub const AGE_MIN: i32 = 6;
pub const AGE_MAX: i32 = 16;
pub const AVG_MARK_MIN: f64 = 2.0;
pub const AVG_MARK_MAX: f64 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    /// Exact, case-sensitive match on the wire value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub gender: Gender,
    pub avg_mark: f64,
    pub on_duty: bool,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full student payload used by create and replace.
#[derive(Clone, Debug, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentInput {
    pub name: String,
    pub age: i32,
    pub gender: Gender,
    pub avg_mark: f64,
    #[serde(default)]
    pub on_duty: bool,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Partial update; absent fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub avg_mark: Option<f64>,
    pub on_duty: Option<bool>,
}

fn check_name(name: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len < NAME_MIN {
        return Err(format!("name should have at least {NAME_MIN} characters"));
    }
    if len > NAME_MAX {
        return Err(format!("name should have at most {NAME_MAX} characters"));
    }
    Ok(())
}

fn check_age(age: i32) -> Result<(), String> {
    if (AGE_MIN..=AGE_MAX).contains(&age) {
        Ok(())
    } else {
        Err(format!("age must be between {AGE_MIN} and {AGE_MAX}"))
    }
}

fn check_avg_mark(avg_mark: f64) -> Result<(), String> {
    if avg_mark.is_finite() && (AVG_MARK_MIN..=AVG_MARK_MAX).contains(&avg_mark) {
        Ok(())
    } else {
        Err(format!(
            "avgMark must be between {AVG_MARK_MIN} and {AVG_MARK_MAX}"
        ))
    }
}

impl StudentInput {
    /// # Errors
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_age(self.age)?;
        check_avg_mark(self.avg_mark)
    }
}

impl StudentPatch {
    /// # Errors
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            check_name(name)?;
        }
        if let Some(age) = self.age {
            check_age(age)?;
        }
        if let Some(avg_mark) = self.avg_mark {
            check_avg_mark(avg_mark)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the patch onto an existing record.
    pub fn apply(&self, student: &mut Student) {
        if let Some(name) = &self.name {
            student.name = name.trim().to_string();
        }
        if let Some(age) = self.age {
            student.age = age;
        }
        if let Some(gender) = self.gender {
            student.gender = gender;
        }
        if let Some(avg_mark) = self.avg_mark {
            student.avg_mark = avg_mark;
        }
        if let Some(on_duty) = self.on_duty {
            student.on_duty = on_duty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn input() -> StudentInput {
        StudentInput {
            name: "Taras".to_string(),
            age: 10,
            gender: Gender::Male,
            avg_mark: 9.5,
            on_duty: false,
            parent_id: None,
        }
    }

    #[test]
    fn input_deserializes_camel_case() -> Result<()> {
        let parsed: StudentInput = serde_json::from_str(
            r#"{"name":"Olena","age":12,"gender":"female","avgMark":11.2}"#,
        )?;
        assert_eq!(parsed.gender, Gender::Female);
        assert!(!parsed.on_duty);
        assert!(parsed.parent_id.is_none());
        assert!((parsed.avg_mark - 11.2).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn unknown_gender_is_rejected() {
        let parsed = serde_json::from_str::<StudentInput>(
            r#"{"name":"Olena","age":12,"gender":"robot","avgMark":11}"#,
        );
        assert!(parsed.is_err());
        assert_eq!(Gender::parse("Male"), None);
        assert_eq!(Gender::parse("other"), Some(Gender::Other));
    }

    #[test]
    fn input_validation_ranges() {
        assert!(input().validate().is_ok());
        assert!(StudentInput { name: "Al".into(), ..input() }.validate().is_err());
        assert!(StudentInput { name: "x".repeat(31), ..input() }.validate().is_err());
        assert!(StudentInput { age: 5, ..input() }.validate().is_err());
        assert!(StudentInput { age: 17, ..input() }.validate().is_err());
        assert!(StudentInput { avg_mark: 1.9, ..input() }.validate().is_err());
        assert!(StudentInput { avg_mark: 12.1, ..input() }.validate().is_err());
        assert!(StudentInput { avg_mark: f64::NAN, ..input() }.validate().is_err());
    }

    #[test]
    fn patch_applies_only_present_fields() -> Result<()> {
        let now = Utc::now();
        let mut student = Student {
            id: Uuid::new_v4(),
            name: "Taras".to_string(),
            age: 10,
            gender: Gender::Male,
            avg_mark: 9.5,
            on_duty: false,
            parent_id: None,
            created_at: now,
            updated_at: now,
        };
        let patch: StudentPatch = serde_json::from_str(r#"{"onDuty":true,"age":11}"#)?;
        assert!(patch.validate().is_ok());
        assert!(!patch.is_empty());
        patch.apply(&mut student);
        assert!(student.on_duty);
        assert_eq!(student.age, 11);
        assert_eq!(student.name, "Taras");
        assert!(StudentPatch::default().is_empty());
        Ok(())
    }

    #[test]
    fn student_serializes_camel_case() -> Result<()> {
        let now = Utc::now();
        let student = Student {
            id: Uuid::nil(),
            name: "Taras".to_string(),
            age: 10,
            gender: Gender::Other,
            avg_mark: 9.5,
            on_duty: true,
            parent_id: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&student)?;
        assert_eq!(value["avgMark"], 9.5);
        assert_eq!(value["onDuty"], true);
        assert_eq!(value["gender"], "other");
        assert!(value.get("parentId").is_some());
        Ok(())
    }
}
