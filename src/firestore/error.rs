use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FirestoreErrorCode {
    InvalidArgument,
    /// A mutation could not be folded onto its base document.
    InvalidMutation,
    /// An upstream diff or registry handed over inconsistent data.
    InvariantViolation,
    /// The base document changed underneath a mutation fold.
    StaleBase,
    Unavailable,
}

impl FirestoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FirestoreErrorCode::InvalidArgument => "firestore/invalid-argument",
            FirestoreErrorCode::InvalidMutation => "firestore/invalid-mutation",
            FirestoreErrorCode::InvariantViolation => "firestore/invariant-violation",
            FirestoreErrorCode::StaleBase => "firestore/stale-base",
            FirestoreErrorCode::Unavailable => "firestore/unavailable",
        }
    }
}

#[derive(Clone, Debug)]
pub struct FirestoreError {
    pub code: FirestoreErrorCode,
    message: String,
}

impl FirestoreError {
    pub fn new(code: FirestoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `false` for failures that will reproduce on every attempt.
    ///
    /// Invalid mutations must be dropped from the pending queue and surfaced to
    /// the writer; invariant violations indicate a bug upstream.
    pub fn is_retryable(&self) -> bool {
        match self.code {
            FirestoreErrorCode::InvalidArgument
            | FirestoreErrorCode::InvalidMutation
            | FirestoreErrorCode::InvariantViolation => false,
            FirestoreErrorCode::StaleBase | FirestoreErrorCode::Unavailable => true,
        }
    }
}

impl Display for FirestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl Error for FirestoreError {}

pub type FirestoreResult<T> = Result<T, FirestoreError>;

pub fn invalid_argument(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::InvalidArgument, message)
}

pub fn invalid_mutation(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::InvalidMutation, message)
}

pub fn invariant_violation(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::InvariantViolation, message)
}

pub fn stale_base(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::StaleBase, message)
}

pub fn unavailable(message: impl Into<String>) -> FirestoreError {
    FirestoreError::new(FirestoreErrorCode::Unavailable, message)
}
