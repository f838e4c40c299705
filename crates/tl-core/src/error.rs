use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Message text was empty after trimming.
    EmptyMessage,
    /// Topology input violates referential integrity.
    InvalidGraph(String),
    DuplicatePeer(String),
    InvalidDistance { id: String, value: f64 },
    /// A persisted log failed replay validation.
    CorruptLog(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::EmptyMessage => write!(f, "message text is empty"),
            CoreError::InvalidGraph(msg) => write!(f, "invalid graph: {msg}"),
            CoreError::DuplicatePeer(id) => write!(f, "duplicate peer id: {id}"),
            CoreError::InvalidDistance { id, value } => {
                write!(f, "invalid distance {value} for peer {id}")
            }
            CoreError::CorruptLog(msg) => write!(f, "corrupt message log: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

pub type Result<T> = std::result::Result<T, CoreError>;
