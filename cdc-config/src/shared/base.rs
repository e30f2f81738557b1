use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// Two marker columns of the change stream point at the same index.
    #[error("Invalid source config: `{first}` and `{second}` both use column {index}")]
    OverlappingColumns {
        first: &'static str,
        second: &'static str,
        index: usize,
    },
    /// A marker column lies inside the data columns of the change stream.
    #[error(
        "Invalid source config: `{field}` (column {index}) must be below `data_column_offset` ({offset})"
    )]
    MarkerColumnInData {
        field: &'static str,
        index: usize,
        offset: usize,
    },
}
