use fieldlens_core::{AppResult, OrgDomain};
use fieldlens_domain::PendingEdits;
use tracing::{info, warn};

use super::{BatchOutcome, BusyGuard, FieldPermissionView, InspectorService, MutationOutcome, SaveReport};
use crate::map_edits;

impl InspectorService {
    /// Maps pending edits to mutations and submits them one at a time.
    ///
    /// A failed write does not stop the batch. `edits` is cleared only when
    /// every planned mutation succeeded and no edit was skipped.
    pub async fn save_edits(
        &self,
        page_host: &str,
        view: &FieldPermissionView,
        edits: &mut PendingEdits,
    ) -> AppResult<SaveReport> {
        if edits.is_empty() {
            info!(field = %view.field, "no changes to save");
            return Ok(SaveReport {
                outcome: BatchOutcome::NothingToSave,
                outcomes: Vec::new(),
                skipped: Vec::new(),
            });
        }

        let _busy = BusyGuard::acquire(&self.busy)?;
        let domain = OrgDomain::from_presentation_host(page_host)?;
        let plan = map_edits(edits, &view.grid, view.records.as_slice());

        let mut outcomes = Vec::with_capacity(plan.mutations.len());
        for planned in plan.mutations {
            let error = match self.gateway.apply_mutation(&domain, &planned.mutation).await {
                Ok(()) => None,
                Err(error) => {
                    warn!(row = %planned.row_key, error = %error, "field permission write failed");
                    Some(error.to_string())
                }
            };

            outcomes.push(MutationOutcome {
                row_key: planned.row_key,
                mutation: planned.mutation,
                error,
            });
        }

        let failed = outcomes.iter().filter(|outcome| !outcome.succeeded()).count();
        let outcome = match (outcomes.len(), failed) {
            (0, _) => BatchOutcome::NothingToSave,
            (_, 0) => BatchOutcome::AllSucceeded,
            (total, failed) if failed == total => BatchOutcome::AllFailed,
            _ => BatchOutcome::Partial,
        };

        if outcome == BatchOutcome::AllSucceeded && plan.skipped.is_empty() {
            edits.clear();
        }

        info!(
            field = %view.field,
            outcome = ?outcome,
            submitted = outcomes.len(),
            failed,
            skipped = plan.skipped.len(),
            "saved field permissions"
        );

        Ok(SaveReport {
            outcome,
            outcomes,
            skipped: plan.skipped,
        })
    }
}
