use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// What to do with a captured column that the authoritative table schema does not contain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownColumnPolicy {
    /// Fail the cursor with a reconciliation error.
    #[default]
    Reject,
    /// Skip the raw value and keep going.
    Discard,
}

/// Layout of the rows returned by a change stream.
///
/// Column indices are zero-based positions in the raw result. Every column before
/// `data_column_offset` is a marker column and never part of the row payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChangeSourceConfig {
    /// Width in bytes of every non-empty log position.
    #[serde(default = "default_position_width")]
    pub position_width: usize,
    /// Column holding the commit position of the owning transaction.
    #[serde(default = "default_commit_position_column")]
    pub commit_position_column: usize,
    /// Column holding the position of the row inside its transaction.
    #[serde(default = "default_row_position_column")]
    pub row_position_column: usize,
    /// Column holding the operation code.
    #[serde(default = "default_operation_column")]
    pub operation_column: usize,
    /// Column holding the bitmask of updated columns, if the source exposes one.
    #[serde(default = "default_update_mask_column")]
    pub update_mask_column: Option<usize>,
    /// Index of the first payload column.
    #[serde(default = "default_data_column_offset")]
    pub data_column_offset: usize,
    /// Read time-of-day columns through the typed accessor instead of the generic one.
    #[serde(default = "default_typed_time_accessor")]
    pub typed_time_accessor: bool,
    /// Handling of captured columns missing from the table schema.
    #[serde(default)]
    pub unknown_column_policy: UnknownColumnPolicy,
}

impl ChangeSourceConfig {
    /// Width of a SQL Server style log sequence number.
    pub const DEFAULT_POSITION_WIDTH: usize = 10;

    /// Validates the column layout.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.position_width == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "source.position_width".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        let mut markers = vec![
            ("commit_position_column", self.commit_position_column),
            ("row_position_column", self.row_position_column),
            ("operation_column", self.operation_column),
        ];
        if let Some(update_mask_column) = self.update_mask_column {
            markers.push(("update_mask_column", update_mask_column));
        }

        for (i, (field, index)) in markers.iter().enumerate() {
            if *index >= self.data_column_offset {
                return Err(ValidationError::MarkerColumnInData {
                    field: *field,
                    index: *index,
                    offset: self.data_column_offset,
                });
            }

            if let Some((other, _)) = markers[i + 1..].iter().find(|(_, other)| other == index) {
                return Err(ValidationError::OverlappingColumns {
                    first: *field,
                    second: *other,
                    index: *index,
                });
            }
        }

        Ok(())
    }
}

impl Default for ChangeSourceConfig {
    fn default() -> Self {
        Self {
            position_width: default_position_width(),
            commit_position_column: default_commit_position_column(),
            row_position_column: default_row_position_column(),
            operation_column: default_operation_column(),
            update_mask_column: default_update_mask_column(),
            data_column_offset: default_data_column_offset(),
            typed_time_accessor: default_typed_time_accessor(),
            unknown_column_policy: UnknownColumnPolicy::default(),
        }
    }
}

fn default_position_width() -> usize {
    ChangeSourceConfig::DEFAULT_POSITION_WIDTH
}

fn default_commit_position_column() -> usize {
    0
}

fn default_row_position_column() -> usize {
    1
}

fn default_operation_column() -> usize {
    2
}

fn default_update_mask_column() -> Option<usize> {
    Some(3)
}

fn default_data_column_offset() -> usize {
    4
}

fn default_typed_time_accessor() -> bool {
    true
}
