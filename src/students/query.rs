//! Pagination, sort and filter parameters for the student list.
//!
//! Parsing is lenient: unknown or unparseable values fall back to defaults or
//! are ignored, never rejected.

use std::{cmp::Ordering, collections::HashMap};

use serde::Serialize;
use utoipa::ToSchema;

use super::models::{Gender, Student};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Id,
    Name,
    Age,
    Gender,
    AvgMark,
    OnDuty,
}

impl SortField {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "_id" | "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "age" => Some(Self::Age),
            "gender" => Some(Self::Gender),
            "avgMark" => Some(Self::AvgMark),
            "onDuty" => Some(Self::OnDuty),
            _ => None,
        }
    }

    /// Column name; only ever one of a fixed set, safe to splice into SQL.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Age => "age",
            Self::Gender => "gender",
            Self::AvgMark => "avg_mark",
            Self::OnDuty => "on_duty",
        }
    }

    #[must_use]
    pub fn compare(self, a: &Student, b: &Student) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Name => a.name.cmp(&b.name),
            Self::Age => a.age.cmp(&b.age),
            Self::Gender => a.gender.as_str().cmp(b.gender.as_str()),
            Self::AvgMark => a.avg_mark.total_cmp(&b.avg_mark),
            Self::OnDuty => a.on_duty.cmp(&b.on_duty),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudentFilter {
    pub gender: Option<Gender>,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub min_avg_mark: Option<f64>,
    pub max_avg_mark: Option<f64>,
}

impl StudentFilter {
    #[must_use]
    pub fn matches(&self, student: &Student) -> bool {
        let age = i64::from(student.age);
        self.gender.map_or(true, |g| g == student.gender)
            && self.min_age.map_or(true, |min| age >= min)
            && self.max_age.map_or(true, |max| age <= max)
            && self.min_avg_mark.map_or(true, |min| student.avg_mark >= min)
            && self.max_avg_mark.map_or(true, |max| student.avg_mark <= max)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub page: i64,
    pub per_page: i64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub filter: StudentFilter,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
            filter: StudentFilter::default(),
        }
    }
}

fn parse_int(value: Option<&String>) -> Option<i64> {
    value.and_then(|v| v.trim().parse::<i64>().ok())
}

fn parse_float(value: Option<&String>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

impl ListQuery {
    #[must_use]
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let page = parse_int(params.get("page"))
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE);
        let per_page = parse_int(params.get("perPage"))
            .filter(|p| *p >= 1)
            .map_or(DEFAULT_PER_PAGE, |p| p.min(MAX_PER_PAGE));
        let sort_by = params
            .get("sortBy")
            .and_then(|v| SortField::parse(v))
            .unwrap_or_default();
        let sort_order = params
            .get("sortOrder")
            .and_then(|v| SortOrder::parse(v))
            .unwrap_or_default();
        let filter = StudentFilter {
            gender: params.get("gender").and_then(|v| Gender::parse(v)),
            min_age: parse_int(params.get("minAge")),
            max_age: parse_int(params.get("maxAge")),
            min_avg_mark: parse_float(params.get("minAvgMark")),
            max_avg_mark: parse_float(params.get("maxAvgMark")),
        };
        Self {
            page,
            per_page,
            sort_by,
            sort_order,
            filter,
        }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationData {
    pub page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PaginationData {
    #[must_use]
    pub fn calculate(total_items: i64, per_page: i64, page: i64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = (total_items + per_page - 1) / per_page;
        Self {
            page,
            per_page,
            total_items,
            total_pages,
            has_next_page: total_items > page.saturating_mul(per_page),
            has_previous_page: page != 1 && page <= total_pages + 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentPage {
    pub data: Vec<Student>,
    #[serde(flatten)]
    pub pagination: PaginationData,
}
