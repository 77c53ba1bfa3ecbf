use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::{
    models::{Student, StudentInput, StudentPatch},
    query::ListQuery,
};

/// Student persistence. Every call is a single-record (or single-query) operation.
#[async_trait]
pub trait StudentRepo: Send + Sync {
    /// Returns the requested page and the total number of matching records.
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Student>, i64)>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>>;
    async fn create(&self, input: StudentInput) -> Result<Student>;
    /// Replace the record or create it under `id`; the flag is `true` when created.
    async fn upsert(&self, id: Uuid, input: StudentInput) -> Result<(Student, bool)>;
    async fn update(&self, id: Uuid, patch: &StudentPatch) -> Result<Option<Student>>;
    /// Returns the deleted record.
    async fn delete(&self, id: Uuid) -> Result<Option<Student>>;
}
