//! Issue service
//!
//! Validates raw caller input against the issue domain, allocates public IDs
//! and forwards to the store. Every public ID argument is normalized here, so
//! callers may pass user input as typed.

use chrono::{Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    format_ttl, project_token, ClaimLease, IdError, Issue, IssueId, IssuePatch, IssueStatus,
    ListRequest, NewIssue, SuffixGenerator, ValidationError,
};
use crate::storage::{IssueStore, StoreError};

/// Root ID draws before allocation gives up
pub const MAX_ID_ATTEMPTS: usize = 30;

/// Recently closed issues included in [`Info`]
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Could not allocate a unique issue ID after {attempts} attempts")]
    AllocationExhausted { attempts: usize },
}

impl From<IdError> for ServiceError {
    fn from(err: IdError) -> Self {
        ServiceError::Validation(err.into())
    }
}

impl ServiceError {
    /// Contention on a claim, which callers usually treat as "pick another"
    pub fn is_already_claimed(&self) -> bool {
        matches!(self, ServiceError::Store(StoreError::AlreadyClaimed(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Store(err) if err.is_not_found())
    }
}

/// Project summary
#[derive(Debug, Clone, Serialize)]
pub struct Info {
    pub open_count: u64,
    pub recently_closed: Vec<Issue>,
}

/// Entry point for every issue operation
pub struct IssueService {
    store: IssueStore,
    token: String,
    ids: Box<dyn SuffixGenerator>,
}

impl IssueService {
    /// Builds a service; `token` is normalized with [`project_token`]
    pub fn new(store: IssueStore, token: impl AsRef<str>, ids: Box<dyn SuffixGenerator>) -> Self {
        Self {
            store,
            token: project_token(token.as_ref()),
            ids,
        }
    }

    /// Token prefixed to new root IDs
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Trims, lowercases and validates a public ID
    pub fn normalize_id(raw: &str) -> Result<IssueId, ServiceError> {
        Ok(IssueId::parse(raw)?)
    }

    /// Creates an issue and returns its public ID
    pub fn create(&mut self, new: NewIssue) -> Result<String, ServiceError> {
        let draft = new.validate()?;

        let id = match &draft.parent {
            Some(parent) => {
                if parent.is_child() {
                    return Err(IdError::UnsupportedNesting(parent.to_string()).into());
                }
                let index = self.store.next_child_index(parent)?;
                parent.child(index)?
            }
            None => self.allocate_root_id()?,
        };

        let id = self.store.create_issue(&id, &draft)?;
        info!(id = %id, "created issue");
        Ok(id)
    }

    fn allocate_root_id(&mut self) -> Result<IssueId, ServiceError> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let suffix = self.ids.next_suffix();
            let candidate = IssueId::root(&self.token, &suffix)?;
            if !self.store.public_id_exists(&candidate)? {
                return Ok(candidate);
            }
            debug!(candidate = %candidate, attempt, "issue ID already taken");
        }

        Err(ServiceError::AllocationExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Applies a partial update
    ///
    /// A status written here is stored as given: `closed_at` and any claim
    /// stay untouched. `close`, `reopen` and `claim` manage those.
    pub fn update(&self, id: &str, patch: IssuePatch) -> Result<(), ServiceError> {
        let id = Self::normalize_id(id)?;
        let changes = patch.validate(&id)?;

        match changes.status {
            Some(IssueStatus::Closed) => warn!(
                id = %id,
                "status set to closed directly; closed_at and claim are unchanged, use close instead"
            ),
            Some(status) => debug!(id = %id, status = %status, "status set directly"),
            None => {}
        }

        self.store.update_fields(&id, &changes)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Issue, ServiceError> {
        let id = Self::normalize_id(id)?;
        Ok(self.store.get_issue(&id)?)
    }

    pub fn list(&self, request: ListRequest) -> Result<Vec<Issue>, ServiceError> {
        let filter = request.validate()?;
        Ok(self.store.list_issues(&filter)?)
    }

    /// Open issue count and the most recently closed issues
    pub fn info(&self) -> Result<Info, ServiceError> {
        Ok(Info {
            open_count: self.store.open_count()?,
            recently_closed: self.store.recent_completed(RECENT_LIMIT)?,
        })
    }

    /// Issues that can be picked up now
    pub fn ready(&self) -> Result<Vec<Issue>, ServiceError> {
        Ok(self.store.ready_issues()?)
    }

    pub fn children(&self, parent: &str) -> Result<Vec<Issue>, ServiceError> {
        let parent = Self::normalize_id(parent)?;
        Ok(self.store.list_children(&parent)?)
    }

    /// Issues that `id` waits on
    pub fn dependencies(&self, id: &str) -> Result<Vec<Issue>, ServiceError> {
        let id = Self::normalize_id(id)?;
        Ok(self.store.list_dependencies(&id)?)
    }

    /// Issues waiting on `id`
    pub fn dependents(&self, id: &str) -> Result<Vec<Issue>, ServiceError> {
        let id = Self::normalize_id(id)?;
        Ok(self.store.list_dependents(&id)?)
    }

    pub fn add_dependency(&self, issue: &str, depends_on: &str) -> Result<(), ServiceError> {
        let issue = Self::normalize_id(issue)?;
        let depends_on = Self::normalize_id(depends_on)?;
        if issue == depends_on {
            return Err(ValidationError::SelfDependency(issue).into());
        }

        self.store.add_dependency(&issue, &depends_on)?;
        Ok(())
    }

    pub fn remove_dependency(&self, issue: &str, depends_on: &str) -> Result<(), ServiceError> {
        let issue = Self::normalize_id(issue)?;
        let depends_on = Self::normalize_id(depends_on)?;
        self.store.remove_dependency(&issue, &depends_on)?;
        Ok(())
    }

    pub fn close(&self, id: &str) -> Result<(), ServiceError> {
        let id = Self::normalize_id(id)?;
        self.store.close_issue(&id)?;
        Ok(())
    }

    pub fn reopen(&self, id: &str) -> Result<(), ServiceError> {
        let id = Self::normalize_id(id)?;
        self.store.reopen_issue(&id)?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let id = Self::normalize_id(id)?;
        self.store.delete_issue(&id)?;
        info!(id = %id, "deleted issue");
        Ok(())
    }

    /// Takes the claim lease for `ttl`
    pub fn claim(&self, id: &str, ttl: Duration) -> Result<ClaimLease, ServiceError> {
        let id = Self::normalize_id(id)?;
        if ttl <= Duration::zero() || ClaimLease::starting_at(Utc::now(), ttl).is_none() {
            return Err(ValidationError::InvalidTtl(format_ttl(ttl)).into());
        }

        Ok(self.store.claim_issue(&id, ttl)?)
    }
}
