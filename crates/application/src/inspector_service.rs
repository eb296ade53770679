use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fieldlens_core::{AppError, AppResult, OrgDomain};
use fieldlens_domain::{
    FieldIdentity, Mutation, OrgUser, PermissionGrid, QualifiedFieldName, RowKey,
    UserAccessProfile, UserAccessVerdict,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::soql::{active_users_query, user_access_query};
use crate::user_access::ActiveUserRecord;
use crate::{
    FieldPermissionRecord, OrgGateway, OrgRestTransport, PermissionFetcher, SessionTokenProvider,
    SkippedEdit, UserRecord, evaluate_user_access, merge_catalog,
};

mod save;

const DEFAULT_USER_LOOKUP_LIMIT: usize = 50;

/// Everything loaded for one inspected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldPermissionView {
    /// Identity resolved from the page.
    pub identity: FieldIdentity,
    /// Qualified name used in queries.
    pub field: QualifiedFieldName,
    /// Complete grid including catalog placeholders.
    pub grid: PermissionGrid,
    /// Sparse rows as fetched, used to route create mutations.
    #[serde(skip)]
    pub records: Vec<FieldPermissionRecord>,
}

/// Aggregate result of a save batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// No mutation was planned.
    NothingToSave,
    /// Every planned mutation was written.
    AllSucceeded,
    /// Some mutations failed.
    Partial,
    /// Every planned mutation failed.
    AllFailed,
}

/// Result of writing one planned mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    /// Row the mutation came from.
    pub row_key: RowKey,
    /// Mutation that was attempted.
    pub mutation: Mutation,
    /// Failure message, when the write was rejected.
    pub error: Option<String>,
}

impl MutationOutcome {
    /// Returns whether the write went through.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-row report of a save batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// Summary across all planned mutations.
    pub outcome: BatchOutcome,
    /// Outcomes in submission order.
    pub outcomes: Vec<MutationOutcome>,
    /// Edits that produced no mutation.
    pub skipped: Vec<SkippedEdit>,
}

impl SaveReport {
    /// Returns the number of accepted writes.
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.succeeded()).count()
    }

    /// Returns the rejected writes.
    pub fn failed(&self) -> impl Iterator<Item = &MutationOutcome> + '_ {
        self.outcomes.iter().filter(|outcome| !outcome.succeeded())
    }
}

/// Entry point for the presentation layer: load a field's grid, save edits,
/// and check a user's effective access.
///
/// Only one network-bound operation runs at a time per service; a second call
/// while one is in flight fails with [`AppError::Conflict`].
#[derive(Clone)]
pub struct InspectorService {
    gateway: OrgGateway,
    fetcher: PermissionFetcher,
    user_lookup_limit: usize,
    busy: Arc<AtomicBool>,
}

impl InspectorService {
    /// Creates an inspector service from port implementations.
    #[must_use]
    pub fn new(
        tokens: Arc<dyn SessionTokenProvider>,
        transport: Arc<dyn OrgRestTransport>,
    ) -> Self {
        let gateway = OrgGateway::new(tokens, transport);

        Self {
            fetcher: PermissionFetcher::new(gateway.clone()),
            gateway,
            user_lookup_limit: DEFAULT_USER_LOOKUP_LIMIT,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides how many active users [`Self::list_active_users`] returns.
    #[must_use]
    pub fn with_user_lookup_limit(mut self, limit: usize) -> Self {
        self.user_lookup_limit = limit;
        self
    }

    /// Loads the complete permission grid for one field.
    ///
    /// Nothing is returned on failure, so callers never render a partial grid.
    pub async fn load_field_permissions(
        &self,
        page_host: &str,
        identity: &FieldIdentity,
    ) -> AppResult<FieldPermissionView> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        let domain = OrgDomain::from_presentation_host(page_host)?;

        let fetched = self.fetcher.fetch(identity, &domain).await?;
        let catalog = self.fetcher.fetch_catalog(&domain).await?;
        let grid = merge_catalog(fetched.grid, catalog.as_slice());

        debug!(
            field = %fetched.field,
            catalog = catalog.len(),
            permission_sets = grid.permission_sets().len(),
            "merged permission set catalog"
        );

        Ok(FieldPermissionView {
            identity: identity.clone(),
            field: fetched.field,
            grid,
            records: fetched.records,
        })
    }

    /// Evaluates whether a user can access the field shown in `grid`.
    pub async fn check_user_access(
        &self,
        page_host: &str,
        user_id: &str,
        grid: &PermissionGrid,
    ) -> AppResult<UserAccessVerdict> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        let domain = OrgDomain::from_presentation_host(page_host)?;
        let query = user_access_query(user_id.trim())?;

        let user: UserAccessProfile = self
            .gateway
            .query_records::<UserRecord>(&domain, query.as_str())
            .await?
            .into_iter()
            .next()
            .map(UserAccessProfile::from)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' was not found")))?;

        let verdict = evaluate_user_access(&user, grid);
        info!(
            user_id = %user.user_id,
            has_access = verdict.has_access,
            via_profile = verdict.via_profile,
            via_permission_sets = verdict.via_permission_sets.len(),
            "evaluated user field access"
        );

        Ok(verdict)
    }

    /// Lists active users for the access lookup picker.
    pub async fn list_active_users(&self, page_host: &str) -> AppResult<Vec<OrgUser>> {
        let _busy = BusyGuard::acquire(&self.busy)?;
        let domain = OrgDomain::from_presentation_host(page_host)?;

        let users = self
            .gateway
            .query_records::<ActiveUserRecord>(
                &domain,
                active_users_query(self.user_lookup_limit).as_str(),
            )
            .await?;

        Ok(users.into_iter().map(OrgUser::from).collect())
    }
}

/// Holds the service's busy flag until dropped.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> AppResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                AppError::Conflict("another inspector operation is still in progress".to_owned())
            })?;

        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests;
