use fieldlens_core::{AppError, AppResult};
use fieldlens_domain::{AccessColumn, PendingEdits, PermissionGrid, PermissionKind, RowKey};
use serde::Deserialize;

/// One checkbox change read from an edit file.
///
/// Without `name` the change applies to the whole column of `kind`, like the
/// select-all toggle above each table.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EditInstruction {
    kind: PermissionKind,
    #[serde(default)]
    name: Option<String>,
    column: AccessColumn,
    value: bool,
}

pub(crate) fn parse_edit_script(text: &str) -> AppResult<Vec<EditInstruction>> {
    serde_json::from_str(text)
        .map_err(|error| AppError::Parse(format!("edit file is not a valid edit list: {error}")))
}

/// Replays instructions against `grid` in file order.
pub(crate) fn apply_edit_script(
    grid: &PermissionGrid,
    instructions: &[EditInstruction],
) -> AppResult<PendingEdits> {
    let mut edits = PendingEdits::new();

    for instruction in instructions {
        match instruction.name.as_deref() {
            Some(name) => {
                let index = grid
                    .rows(instruction.kind)
                    .iter()
                    .position(|row| row.name() == name)
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "no {} row named '{name}'",
                            instruction.kind.as_str()
                        ))
                    })?;
                edits.record(
                    grid,
                    RowKey::new(instruction.kind, index),
                    instruction.column,
                    instruction.value,
                );
            }
            None => edits.set_column(grid, instruction.kind, instruction.column, instruction.value),
        }
    }

    Ok(edits)
}

#[cfg(test)]
mod tests {
    use fieldlens_core::AppError;
    use fieldlens_domain::{AccessFlags, PermissionGrid, PermissionKind, PermissionRow, RecordId, RowKey};

    use super::{apply_edit_script, parse_edit_script};

    fn grid() -> PermissionGrid {
        PermissionGrid::from_rows(
            vec![PermissionRow::new(
                PermissionKind::Profile,
                RecordId::new("01k5g00000AbCdEfGH"),
                Some("0PS1".to_owned()),
                "Standard User",
                AccessFlags::new(true, false),
            )],
            vec![
                PermissionRow::virtual_row(PermissionKind::PermissionSet, "0PS2", "Sales PS"),
                PermissionRow::virtual_row(PermissionKind::PermissionSet, "0PS3", "Support PS"),
            ],
        )
    }

    #[test]
    fn named_and_column_instructions_become_pending_edits() {
        let instructions = parse_edit_script(
            r#"[
                { "kind": "profile", "name": "Standard User", "column": "edit", "value": true },
                { "kind": "permission_set", "column": "read", "value": true }
            ]"#,
        )
        .unwrap_or_else(|error| panic!("script should parse: {error}"));

        let edits = apply_edit_script(&grid(), &instructions)
            .unwrap_or_else(|error| panic!("script should apply: {error}"));

        let keys: Vec<RowKey> = edits.iter().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![
                RowKey::new(PermissionKind::Profile, 0),
                RowKey::new(PermissionKind::PermissionSet, 0),
                RowKey::new(PermissionKind::PermissionSet, 1),
            ]
        );
    }

    #[test]
    fn unknown_row_name_is_not_found() {
        let instructions = parse_edit_script(
            r#"[{ "kind": "permission_set", "name": "Ghost PS", "column": "read", "value": true }]"#,
        )
        .unwrap_or_else(|error| panic!("script should parse: {error}"));

        assert!(matches!(
            apply_edit_script(&grid(), &instructions),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_script_is_a_parse_failure() {
        assert!(matches!(parse_edit_script("{}"), Err(AppError::Parse(_))));
    }
}
