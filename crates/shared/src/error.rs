use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldKeyError {
    #[error("unknown audit field '{0}'")]
    UnknownField(String),
    #[error("expected key=value, got '{0}'")]
    MissingValue(String),
    #[error("field '{field}' expects true/false, got '{value}'")]
    InvalidToggle { field: &'static str, value: String },
    #[error(transparent)]
    Enum(#[from] ParseEnumError),
}
