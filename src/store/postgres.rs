//! PostgreSQL store (`sql/schema.sql`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Connection, FromRow, PgPool, Postgres, QueryBuilder, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::HealthCheck;
use crate::{
    session::{
        CreateOutcome, Identity, IdentityRepo, NewIdentity, OwnershipRepo, RedeemOutcome,
        ResetTokenRepo, ResourceKind, Role, SessionRecord, SessionRepo,
    },
    students::{Gender, ListQuery, Student, StudentInput, StudentPatch, StudentRepo},
};

const IDENTITY_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";
const SESSION_COLUMNS: &str =
    "id, user_id, access_token_hash, refresh_token_hash, access_expires_at, refresh_expires_at";
const STUDENT_COLUMNS: &str =
    "id, name, age, gender, avg_mark, on_duty, parent_id, created_at, updated_at";

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

impl<'r> FromRow<'r, PgRow> for Identity {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: Role::parse(&role)
                .ok_or_else(|| decode_error(format!("invalid users.role value: {role}")))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for SessionRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            access_token_hash: row.try_get("access_token_hash")?,
            refresh_token_hash: row.try_get("refresh_token_hash")?,
            access_expires_at: row.try_get("access_expires_at")?,
            refresh_expires_at: row.try_get("refresh_expires_at")?,
        })
    }
}

impl<'r> FromRow<'r, PgRow> for Student {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let gender: String = row.try_get("gender")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            age: row.try_get("age")?,
            gender: Gender::parse(&gender)
                .ok_or_else(|| decode_error(format!("invalid students.gender value: {gender}")))?,
            avg_mark: row.try_get("avg_mark")?,
            on_duty: row.try_get("on_duty")?,
            parent_id: row.try_get("parent_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn query_span(operation: &'static str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityRepo for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let query = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, Identity>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch user by email")
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        let query = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, Identity>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch user by id")
    }

    async fn create(&self, identity: NewIdentity) -> Result<CreateOutcome> {
        let query = format!(
            "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING {IDENTITY_COLUMNS}"
        );
        let result = sqlx::query_as::<_, Identity>(&query)
            .bind(&identity.name)
            .bind(&identity.email)
            .bind(&identity.password_hash)
            .bind(identity.role.as_str())
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;
        match result {
            Ok(created) => Ok(CreateOutcome::Created(created)),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(err).context("Failed to insert user"),
        }
    }
}

#[async_trait]
impl SessionRepo for PgStore {
    async fn find_by_access_token(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE access_token_hash = $1");
        sqlx::query_as::<_, SessionRecord>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch session by access token")
    }

    async fn find_by_id_and_refresh_token(
        &self,
        id: Uuid,
        token_hash: &[u8],
    ) -> Result<Option<SessionRecord>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1 AND refresh_token_hash = $2"
        );
        sqlx::query_as::<_, SessionRecord>(&query)
            .bind(id)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch session by refresh token")
    }

    async fn create(&self, session: &SessionRecord) -> Result<()> {
        let query = r"
            INSERT INTO sessions
            (id, user_id, access_token_hash, refresh_token_hash, access_expires_at, refresh_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        sqlx::query(query)
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.access_token_hash)
            .bind(&session.refresh_token_hash)
            .bind(session.access_expires_at)
            .bind(session.refresh_expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("Failed to insert session")?;
        Ok(())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM sessions WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to delete session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to delete user sessions")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ResetTokenRepo for PgStore {
    async fn create(&self, user_id: Uuid, token_hash: &[u8], expires_at: DateTime<Utc>) -> Result<()> {
        let query =
            "INSERT INTO password_reset_tokens (token_hash, user_id, expires_at) VALUES ($1, $2, $3)";
        sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("Failed to insert password reset token")?;
        Ok(())
    }

    async fn delete_by_owner(&self, user_id: Uuid) -> Result<u64> {
        let query = "DELETE FROM password_reset_tokens WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to delete password reset tokens")?;
        Ok(result.rows_affected())
    }

    async fn redeem(
        &self,
        token_hash: &[u8],
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin password reset transaction")?;

        let query = r"
            DELETE FROM password_reset_tokens
            WHERE token_hash = $1
              AND expires_at >= $2
            RETURNING user_id
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&mut *tx)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to redeem password reset token")?;
        let Some(row) = row else {
            return Ok(RedeemOutcome::InvalidToken);
        };
        let user_id: Uuid = row
            .try_get("user_id")
            .context("Failed to decode password reset token owner")?;

        let query = "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1";
        let updated = sqlx::query(query)
            .bind(user_id)
            .bind(password_hash)
            .execute(&mut *tx)
            .instrument(query_span("UPDATE", query))
            .await
            .context("Failed to update password hash")?;
        if updated.rows_affected() == 0 {
            tx.rollback()
                .await
                .context("Failed to roll back password reset")?;
            return Ok(RedeemOutcome::UnknownIdentity);
        }

        let query = "DELETE FROM password_reset_tokens WHERE user_id = $1";
        sqlx::query(query)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE", query))
            .await
            .context("Failed to delete remaining password reset tokens")?;

        tx.commit()
            .await
            .context("Failed to commit password reset")?;
        Ok(RedeemOutcome::Redeemed(user_id))
    }
}

#[async_trait]
impl OwnershipRepo for PgStore {
    async fn find_owned_resource(
        &self,
        kind: ResourceKind,
        resource_id: Uuid,
        owner_id: Uuid,
    ) -> Result<bool> {
        let query = match kind {
            ResourceKind::Student => {
                "SELECT EXISTS (SELECT 1 FROM students WHERE id = $1 AND parent_id = $2)"
            }
        };
        let row = sqlx::query(query)
            .bind(resource_id)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("Failed to check resource ownership")?;
        row.try_get::<bool, _>(0)
            .context("Failed to decode ownership check")
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    let filter = &query.filter;
    builder.push(" WHERE TRUE");
    if let Some(gender) = filter.gender {
        builder.push(" AND gender = ").push_bind(gender.as_str());
    }
    if let Some(min_age) = filter.min_age {
        builder.push(" AND age >= ").push_bind(min_age);
    }
    if let Some(max_age) = filter.max_age {
        builder.push(" AND age <= ").push_bind(max_age);
    }
    if let Some(min_avg_mark) = filter.min_avg_mark {
        builder.push(" AND avg_mark >= ").push_bind(min_avg_mark);
    }
    if let Some(max_avg_mark) = filter.max_avg_mark {
        builder.push(" AND avg_mark <= ").push_bind(max_avg_mark);
    }
}

#[async_trait]
impl StudentRepo for PgStore {
    async fn list(&self, query: &ListQuery) -> Result<(Vec<Student>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM students");
        push_filters(&mut count, query);
        let count_sql = count.sql().to_string();
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", &count_sql))
            .await
            .context("Failed to count students")?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {STUDENT_COLUMNS} FROM students"));
        push_filters(&mut select, query);
        select
            .push(format!(
                " ORDER BY {} {}, id ASC",
                query.sort_by.column(),
                query.sort_order.sql()
            ))
            .push(" LIMIT ")
            .push_bind(query.per_page)
            .push(" OFFSET ")
            .push_bind(query.offset());
        let select_sql = select.sql().to_string();
        let students = select
            .build_query_as::<Student>()
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &select_sql))
            .await
            .context("Failed to list students")?;

        Ok((students, total))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        let query = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1");
        sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("Failed to fetch student")
    }

    async fn create(&self, input: StudentInput) -> Result<Student> {
        let query = format!(
            "INSERT INTO students (name, age, gender, avg_mark, on_duty, parent_id) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {STUDENT_COLUMNS}"
        );
        sqlx::query_as::<_, Student>(&query)
            .bind(input.name.trim())
            .bind(input.age)
            .bind(input.gender.as_str())
            .bind(input.avg_mark)
            .bind(input.on_duty)
            .bind(input.parent_id)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .context("Failed to insert student")
    }

    async fn upsert(&self, id: Uuid, input: StudentInput) -> Result<(Student, bool)> {
        // xmax = 0 only for freshly inserted rows.
        let query = format!(
            r"
            INSERT INTO students (id, name, age, gender, avg_mark, on_duty, parent_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                age = EXCLUDED.age,
                gender = EXCLUDED.gender,
                avg_mark = EXCLUDED.avg_mark,
                on_duty = EXCLUDED.on_duty,
                parent_id = EXCLUDED.parent_id,
                updated_at = NOW()
            RETURNING {STUDENT_COLUMNS}, (xmax = 0) AS inserted
            "
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(input.name.trim())
            .bind(input.age)
            .bind(input.gender.as_str())
            .bind(input.avg_mark)
            .bind(input.on_duty)
            .bind(input.parent_id)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .context("Failed to upsert student")?;
        let student = Student::from_row(&row).context("Failed to decode student")?;
        let inserted: bool = row.try_get("inserted").context("Failed to decode upsert flag")?;
        Ok((student, inserted))
    }

    async fn update(&self, id: Uuid, patch: &StudentPatch) -> Result<Option<Student>> {
        let query = format!(
            r"
            UPDATE students SET
                name = COALESCE($2, name),
                age = COALESCE($3, age),
                gender = COALESCE($4, gender),
                avg_mark = COALESCE($5, avg_mark),
                on_duty = COALESCE($6, on_duty),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {STUDENT_COLUMNS}
            "
        );
        sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .bind(patch.name.as_deref().map(str::trim))
            .bind(patch.age)
            .bind(patch.gender.map(|g| g.as_str()))
            .bind(patch.avg_mark)
            .bind(patch.on_duty)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("Failed to update student")
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Student>> {
        let query = format!("DELETE FROM students WHERE id = $1 RETURNING {STUDENT_COLUMNS}");
        sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("DELETE", &query))
            .await
            .context("Failed to delete student")
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("Failed to acquire database connection")?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("Failed to ping database")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeDbError(&'static str);

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("fake database error")
        }
    }

    impl std::error::Error for FakeDbError {}

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "fake"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(std::borrow::Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    #[test]
    fn unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(FakeDbError("23505")));
        assert!(is_unique_violation(&err));
        let err = sqlx::Error::Database(Box::new(FakeDbError("23503")));
        assert!(!is_unique_violation(&err));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
