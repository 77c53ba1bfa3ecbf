//! In-process store backed by hash maps behind a single `RwLock`.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::HealthCheck;
use crate::{
    session::{
        CreateOutcome, Identity, IdentityRepo, NewIdentity, OwnershipRepo, RedeemOutcome,
        ResetTokenRepo, ResourceKind, SessionRecord, SessionRepo,
    },
    students::{ListQuery, SortOrder, Student, StudentInput, StudentPatch, StudentRepo},
};

struct ResetRecord {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    identities: HashMap<Uuid, Identity>,
    sessions: HashMap<Uuid, SessionRecord>,
    students: HashMap<Uuid, Student>,
    reset_tokens: HashMap<Vec<u8>, ResetRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions owned by `user_id`.
    pub async fn session_count_for(&self, user_id: Uuid) -> usize {
        self.inner
            .read()
            .await
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

fn build_student(id: Uuid, input: StudentInput, created_at: DateTime<Utc>) -> Student {
    Student {
        id,
        name: input.name.trim().to_string(),
        age: input.age,
        gender: input.gender,
        avg_mark: input.avg_mark,
        on_duty: input.on_duty,
        parent_id: input.parent_id,
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl IdentityRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let inner = self.inner.read().await;
        Ok(inner
            .identities
            .values()
            .find(|identity| identity.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self.inner.read().await.identities.get(&id).cloned())
    }

    async fn create(&self, identity: NewIdentity) -> Result<CreateOutcome> {
        let mut inner = self.inner.write().await;
        if inner
            .identities
            .values()
            .any(|existing| existing.email == identity.email)
        {
            return Ok(CreateOutcome::Conflict);
        }
        let now = Utc::now();
        let created = Identity {
            id: Uuid::new_v4(),
            name: identity.name,
            email: identity.email,
            password_hash: identity.password_hash,
            role: identity.role,
            created_at: now,
            updated_at: now,
        };
        inner.identities.insert(created.id, created.clone());
        Ok(CreateOutcome::Created(created))
    }
}

#[async_trait]
impl SessionRepo for MemoryStore {
    async fn find_by_access_token(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .values()
            .find(|s| s.access_token_hash == token_hash)
            .cloned())
    }

    async fn find_by_id_and_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
    ) -> Result<Option<SessionRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .get(&id)
            .filter(|s| s.refresh_token_hash == token_hash)
            .cloned())
    }

    async fn create(&self, session: &SessionRecord) -> Result<()> {
        self.inner
            .write()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.write().await.sessions.remove(&id).is_some())
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| s.user_id != user_id);
        Ok((before - inner.sessions.len()) as u64)
    }
}

#[async_trait]
impl ResetTokenRepo for MemoryStore {
    async fn create(&self, user_id: Uuid, token_hash: &[u8], expires_at: DateTime<Utc>) -> Result<()> {
        self.inner
            .write()
            .await
            .reset_tokens
            .insert(token_hash.to_vec(), ResetRecord { user_id, expires_at });
        Ok(())
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.reset_tokens.len();
        inner.reset_tokens.retain(|_, record| record.user_id != user_id);
        Ok((before - inner.reset_tokens.len()) as u64)
    }

    async fn redeem(
        &self,
        token_hash: &[u8],
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome> {
        let mut inner = self.inner.write().await;
        let Some(user_id) = inner
            .reset_tokens
            .get(token_hash)
            .filter(|record| record.expires_at >= now)
            .map(|record| record.user_id)
        else {
            return Ok(RedeemOutcome::InvalidToken);
        };
        let Some(identity) = inner.identities.get_mut(&user_id) else {
            return Ok(RedeemOutcome::UnknownIdentity);
        };
        identity.password_hash = password_hash.to_string();
        identity.updated_at = Utc::now();
        inner.reset_tokens.retain(|_, record| record.user_id != user_id);
        Ok(RedeemOutcome::Redeemed(user_id))
    }
}

#[async_trait]
impl OwnershipRepo for MemoryStore {
    async fn find_owned_resource(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool> {
        match kind {
            ResourceKind::Student => Ok(self
                .inner
                .read()
                .await
                .students
                .get(&resource_id)
                .is_some_and(|s| s.parent_id == Some(owner_id))),
        }
    }
}

#[async_trait]
impl StudentRepo for MemoryStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Student>, i64)> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Student> = inner
            .students
            .values()
            .filter(|s| query.filter.matches(s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            let ordering = query.sort_by.compare(a, b).then_with(|| a.id.cmp(&b.id));
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });
        let total = i64::try_from(matching.len())?;
        let offset = usize::try_from(query.offset())?;
        let limit = usize::try_from(query.per_page)?;
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.inner.read().await.students.get(&id).cloned())
    }

    async fn create(&self, input: StudentInput) -> Result<Student> {
        let student = build_student(Uuid::new_v4(), input, Utc::now());
        self.inner
            .write()
            .await
            .students
            .insert(student.id, student.clone());
        Ok(student)
    }

    async fn upsert(&self, id: Uuid, input: StudentInput) -> Result<(Student, bool)> {
        let mut inner = self.inner.write().await;
        let existing = inner.students.get(&id).map(|s| s.created_at);
        let student = build_student(id, input, existing.unwrap_or_else(Utc::now));
        inner.students.insert(id, student.clone());
        Ok((student, existing.is_none()))
    }

    async fn update(&self, id: Uuid, patch: &StudentPatch) -> Result<Option<Student>> {
        let mut inner = self.inner.write().await;
        Ok(inner.students.get_mut(&id).map(|student| {
            patch.apply(student);
            student.updated_at = Utc::now();
            student.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Student>> {
        Ok(self.inner.write().await.students.remove(&id))
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
