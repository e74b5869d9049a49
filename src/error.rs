use std::fmt::{self, Debug, Display};
use std::io;

/// Recoverable errors raised while configuring or loading a contact model.
///
/// Broken simulation invariants are not represented here: they panic, because the run cannot
/// safely continue.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum TransmissionError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    IllegalParameter(String),
    InvalidAgeGroups(String),
    Population(String),
    Geography(String),
}

impl From<io::Error> for TransmissionError {
    fn from(error: io::Error) -> Self {
        TransmissionError::IoError(error)
    }
}

impl From<serde_json::Error> for TransmissionError {
    fn from(error: serde_json::Error) -> Self {
        TransmissionError::JsonError(error)
    }
}

impl From<csv::Error> for TransmissionError {
    fn from(error: csv::Error) -> Self {
        TransmissionError::CsvError(error)
    }
}

impl std::error::Error for TransmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransmissionError::IoError(e) => Some(e),
            TransmissionError::JsonError(e) => Some(e),
            TransmissionError::CsvError(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for TransmissionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransmissionError::IoError(e) => write!(f, "I/O error: {e}"),
            TransmissionError::JsonError(e) => write!(f, "JSON error: {e}"),
            TransmissionError::CsvError(e) => write!(f, "CSV error: {e}"),
            TransmissionError::IllegalParameter(msg) => write!(f, "illegal parameter: {msg}"),
            TransmissionError::InvalidAgeGroups(msg) => write!(f, "invalid age groups: {msg}"),
            TransmissionError::Population(msg) => write!(f, "population error: {msg}"),
            TransmissionError::Geography(msg) => write!(f, "geography error: {msg}"),
        }
    }
}
