use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

/// Errors surfaced by loading and report generation.
///
/// Shape errors (bad records) and configuration errors (bad user selection)
/// are kept apart so the front end can report them differently. A period with
/// no matching rows is not an error at all.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("record {record}: missing required field `{field}`")]
    MissingField { record: String, field: String },

    #[error("record {record}: field `{field}` is invalid: {reason}")]
    InvalidField {
        record: String,
        field: String,
        reason: String,
    },

    #[error("no thickness breakpoints given")]
    EmptyBreakpoints,

    #[error("invalid thickness breakpoint: {0}")]
    InvalidBreakpoint(String),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("record store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config file error: {0}")]
    Config(#[from] toml::de::Error),
}

impl ReportError {
    pub fn missing(record: &str, field: &str) -> Self {
        ReportError::MissingField {
            record: record.to_string(),
            field: field.to_string(),
        }
    }

    pub fn invalid(record: &str, field: &str, reason: impl Into<String>) -> Self {
        ReportError::InvalidField {
            record: record.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the user's selection rather than the data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReportError::EmptyBreakpoints
                | ReportError::InvalidBreakpoint(_)
                | ReportError::InvalidSelection(_)
                | ReportError::InvalidConfig(_)
        )
    }
}
