use std::collections::HashSet;

use fieldlens_domain::{AccessFlags, PermissionGrid, PermissionKind, PermissionRow, RecordId};
use tracing::{debug, warn};

use crate::{FieldPermissionRecord, PermissionSetCatalogEntry};

/// Normalizes sparse field permission rows into a deduplicated, sorted grid.
///
/// Profile rows are keyed by the linked profile name (falling back to the
/// parent name), permission set rows by the parent name. The first row for a
/// key wins.
#[must_use]
pub fn ingest_records(records: &[FieldPermissionRecord]) -> PermissionGrid {
    let mut profiles = Vec::new();
    let mut permission_sets = Vec::new();
    let mut seen_profiles = HashSet::new();
    let mut seen_permission_sets = HashSet::new();

    for record in records {
        let parent = record.parent.as_ref();
        let kind = PermissionKind::from_parent_type(
            parent
                .and_then(|value| value.parent_type.as_deref())
                .unwrap_or_default(),
        );
        let key = match kind {
            PermissionKind::Profile => {
                parent.and_then(|value| value.profile_name().or(value.name.as_deref()))
            }
            PermissionKind::PermissionSet => parent.and_then(|value| value.name.as_deref()),
        }
        .filter(|value| !value.is_empty());

        let Some(key) = key else {
            warn!(
                record_id = record.id.as_deref().unwrap_or("<none>"),
                "skipping field permission row without a parent name"
            );
            continue;
        };

        if record.id.is_none() {
            warn!(parent = key, "field permission row has no record id");
        }

        let seen = match kind {
            PermissionKind::Profile => &mut seen_profiles,
            PermissionKind::PermissionSet => &mut seen_permission_sets,
        };
        if !seen.insert(key.to_owned()) {
            debug!(parent = key, kind = kind.as_str(), "dropping duplicate field permission row");
            continue;
        }

        let row = PermissionRow::new(
            kind,
            record.id.clone().and_then(RecordId::new),
            record.resolved_parent_id().map(str::to_owned),
            key,
            AccessFlags::new(
                record.permissions_read.unwrap_or(false),
                record.permissions_edit.unwrap_or(false),
            ),
        );

        match kind {
            PermissionKind::Profile => profiles.push(row),
            PermissionKind::PermissionSet => permission_sets.push(row),
        }
    }

    PermissionGrid::from_rows(profiles, permission_sets)
}

/// Adds a zero-access virtual row for every catalog permission set missing
/// from the grid, then re-sorts.
#[must_use]
pub fn merge_catalog(grid: PermissionGrid, catalog: &[PermissionSetCatalogEntry]) -> PermissionGrid {
    let (profiles, mut permission_sets) = grid.into_parts();
    let mut known: HashSet<String> = permission_sets
        .iter()
        .filter_map(|row| row.parent_id().map(str::to_owned))
        .collect();

    for entry in catalog {
        if known.insert(entry.id.clone()) {
            permission_sets.push(PermissionRow::virtual_row(
                PermissionKind::PermissionSet,
                entry.id.as_str(),
                entry.name.as_str(),
            ));
        }
    }

    PermissionGrid::from_rows(profiles, permission_sets)
}
