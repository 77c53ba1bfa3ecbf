//! Role and ownership based access decisions.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::{
    error::{AuthError, CredentialError},
    models::{Identity, Role},
    repo::OwnershipRepo,
};

/// Kind of resource whose ownership can be checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Student,
}

impl ResourceKind {
    #[must_use]
    pub const fn invalid_id_message(self) -> &'static str {
        match self {
            Self::Student => "Invalid student ID",
        }
    }
}

/// Reference to a target resource as it arrived on the request, not yet validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceRef {
    Student(String),
}

impl ResourceRef {
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Student(_) => ResourceKind::Student,
        }
    }

    #[must_use]
    pub fn raw_id(&self) -> &str {
        match self {
            Self::Student(id) => id,
        }
    }

    fn parse_id(&self) -> Option<Uuid> {
        Uuid::parse_str(self.raw_id().trim()).ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden(&'static str),
    BadRequest(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl From<DenyReason> for AuthError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => Self::Unauthenticated(CredentialError::NoIdentity),
            DenyReason::Forbidden(msg) => Self::Forbidden(msg),
            DenyReason::BadRequest(msg) => Self::BadRequest(msg),
        }
    }
}

const NOT_PERMITTED: &str = "action not permitted for this role";
const NOT_OWNER: &str = "access denied";

#[derive(Clone)]
pub struct Authorizer {
    ownership: Arc<dyn OwnershipRepo>,
}

impl Authorizer {
    #[must_use]
    pub fn new(ownership: Arc<dyn OwnershipRepo>) -> Self {
        Self { ownership }
    }

    /// Decide whether `identity` may act on `resource` given the route's allowed roles.
    ///
    /// Privileged callers never trigger an ownership lookup.
    ///
    /// # Errors
    /// Returns `AuthError::Internal` only when the ownership lookup fails.
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        allowed: &[Role],
        resource: Option<&ResourceRef>,
    ) -> Result<Decision, AuthError> {
        let Some(identity) = identity else {
            return Ok(Decision::Deny(DenyReason::Unauthenticated));
        };

        if !allowed.contains(&identity.role) {
            return Ok(Decision::Deny(DenyReason::Forbidden(NOT_PERMITTED)));
        }

        if identity.role.is_privileged() {
            return Ok(Decision::Allow);
        }

        let Some(resource) = resource else {
            return Ok(Decision::Deny(DenyReason::Forbidden(NOT_PERMITTED)));
        };
        let Some(resource_id) = resource.parse_id() else {
            return Ok(Decision::Deny(DenyReason::BadRequest(
                resource.kind().invalid_id_message(),
            )));
        };

        let owned = self
            .ownership
            .find_owned_resource(resource.kind(), resource_id, identity.id)
            .await?;
        if owned {
            Ok(Decision::Allow)
        } else {
            debug!(user_id = %identity.id, %resource_id, "ownership check failed");
            Ok(Decision::Deny(DenyReason::Forbidden(NOT_OWNER)))
        }
    }

    /// Like [`Self::authorize`] but folds a deny into the matching `AuthError`.
    ///
    /// # Errors
    /// Returns the deny reason as an `AuthError`, or `Internal` on store failure.
    pub async fn require(
        &self,
        identity: Option<&Identity>,
        allowed: &[Role],
        resource: Option<&ResourceRef>,
    ) -> Result<(), AuthError> {
        match self.authorize(identity, allowed, resource).await? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOwnership {
        resource: Uuid,
        owner: Uuid,
        lookups: AtomicUsize,
        fail: bool,
    }

    impl FixedOwnership {
        fn new(resource: Uuid, owner: Uuid) -> Self {
            Self {
                resource,
                owner,
                lookups: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl OwnershipRepo for FixedOwnership {
        async fn find_owned_resource(
            &self,
            _kind: ResourceKind,
            resource_id: Uuid,
            owner_id: Uuid,
        ) -> Result<bool> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("store down"));
            }
            Ok(resource_id == self.resource && owner_id == self.owner)
        }
    }

    fn identity(role: Role, id: Uuid) -> Identity {
        let now = Utc::now();
        Identity {
            id,
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    const BOTH: &[Role] = &[Role::Teacher, Role::Parent];

    #[tokio::test]
    async fn missing_identity_is_unauthenticated() -> Result<()> {
        let repo = Arc::new(FixedOwnership::new(Uuid::new_v4(), Uuid::new_v4()));
        let authorizer = Authorizer::new(repo);
        let decision = authorizer.authorize(None, BOTH, None).await?;
        assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));

        let err = authorizer.require(None, BOTH, None).await.err();
        assert!(matches!(
            err,
            Some(AuthError::Unauthenticated(CredentialError::NoIdentity))
        ));
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("unauthenticated")
        );
        Ok(())
    }

    #[tokio::test]
    async fn teacher_skips_ownership_lookup() -> Result<()> {
        let repo = Arc::new(FixedOwnership::new(Uuid::new_v4(), Uuid::new_v4()));
        let authorizer = Authorizer::new(repo.clone());
        let teacher = identity(Role::Teacher, Uuid::new_v4());
        let bogus = ResourceRef::Student("not-a-uuid".to_string());

        let decision = authorizer.authorize(Some(&teacher), BOTH, Some(&bogus)).await?;
        assert_eq!(decision, Decision::Allow);
        let decision = authorizer.authorize(Some(&teacher), BOTH, None).await?;
        assert_eq!(decision, Decision::Allow);
        assert_eq!(repo.lookups.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn parent_allowed_on_owned_student() -> Result<()> {
        let parent_id = Uuid::new_v4();
        let student = Uuid::new_v4();
        let authorizer = Authorizer::new(Arc::new(FixedOwnership::new(student, parent_id)));
        let parent = identity(Role::Parent, parent_id);
        let target = ResourceRef::Student(student.to_string());

        let decision = authorizer.authorize(Some(&parent), BOTH, Some(&target)).await?;
        assert_eq!(decision, Decision::Allow);
        Ok(())
    }

    #[tokio::test]
    async fn parent_denied_on_student_owned_by_someone_else() -> Result<()> {
        let student = Uuid::new_v4();
        let authorizer = Authorizer::new(Arc::new(FixedOwnership::new(student, Uuid::new_v4())));
        let parent = identity(Role::Parent, Uuid::new_v4());
        let target = ResourceRef::Student(student.to_string());

        let decision = authorizer.authorize(Some(&parent), BOTH, Some(&target)).await?;
        assert!(matches!(decision, Decision::Deny(DenyReason::Forbidden(_))));
        Ok(())
    }

    #[tokio::test]
    async fn parent_denied_on_nonexistent_student() -> Result<()> {
        let parent_id = Uuid::new_v4();
        let authorizer = Authorizer::new(Arc::new(FixedOwnership::new(Uuid::new_v4(), parent_id)));
        let parent = identity(Role::Parent, parent_id);
        let target = ResourceRef::Student(Uuid::new_v4().to_string());

        let decision = authorizer.authorize(Some(&parent), BOTH, Some(&target)).await?;
        assert!(matches!(decision, Decision::Deny(DenyReason::Forbidden(_))));
        Ok(())
    }

    #[tokio::test]
    async fn parent_missing_or_invalid_reference() -> Result<()> {
        let repo = Arc::new(FixedOwnership::new(Uuid::new_v4(), Uuid::new_v4()));
        let authorizer = Authorizer::new(repo.clone());
        let parent = identity(Role::Parent, Uuid::new_v4());

        let decision = authorizer.authorize(Some(&parent), BOTH, None).await?;
        assert!(matches!(decision, Decision::Deny(DenyReason::Forbidden(_))));

        let bogus = ResourceRef::Student("7".to_string());
        let decision = authorizer.authorize(Some(&parent), BOTH, Some(&bogus)).await?;
        assert_eq!(
            decision,
            Decision::Deny(DenyReason::BadRequest("Invalid student ID"))
        );
        assert_eq!(repo.lookups.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn role_outside_allowed_set_is_forbidden() -> Result<()> {
        let authorizer = Authorizer::new(Arc::new(FixedOwnership::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
        )));
        let parent = identity(Role::Parent, Uuid::new_v4());
        let err = authorizer
            .require(Some(&parent), &[Role::Teacher], None)
            .await
            .err();
        assert!(matches!(err, Some(AuthError::Forbidden(NOT_PERMITTED))));
        Ok(())
    }

    #[tokio::test]
    async fn ownership_store_failure_is_internal() {
        let student = Uuid::new_v4();
        let mut repo = FixedOwnership::new(student, Uuid::new_v4());
        repo.fail = true;
        let authorizer = Authorizer::new(Arc::new(repo));
        let parent = identity(Role::Parent, Uuid::new_v4());
        let target = ResourceRef::Student(student.to_string());
        let result = authorizer.require(Some(&parent), BOTH, Some(&target)).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }
}
