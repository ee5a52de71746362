use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Configuration has no structure section")]
    MissingStructure,

    #[error("No period specification: provide structure.periodMapping or both structure.periodsRow and structure.periodsRange")]
    MissingPeriodSpecification,

    #[error("Invalid periods row {0}: must be a positive row number")]
    InvalidPeriodsRow(i64),

    #[error("Invalid periods range '{0}': expected a single-row range such as 'B3:N3'")]
    InvalidPeriodsRange(String),

    #[error("Invalid column reference '{0}': expected letters such as 'A', 'B' or 'AA'")]
    InvalidColumn(String),

    #[error("Category group '{group}' is not valid for a {statement_type} statement")]
    UnexpectedCategoryGroup {
        group: String,
        statement_type: String,
    },

    #[error("Invalid engine settings: {0}")]
    InvalidSettings(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;
