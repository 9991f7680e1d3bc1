//! The error surface shared by the crates' façade layers.
//!
//! Parse errors inside the parsing crates borrow tokens from the source
//! buffer; the façade renders them into this owned kind + location form so a
//! caller can keep an error around after the buffer is gone.

use crate::location::Location;
use thiserror::Error;

/// What went wrong, rendered free of the source buffer's lifetime
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CssErrorKind {
    /// The input ended where the grammar required more
    #[error("unexpected end of input")]
    EndOfInput,
    /// Any other syntax error, with the rendered message
    #[error("{0}")]
    Syntax(String),
}

/// A located, owned css error as surfaced by the façade helpers
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{kind} at {location}")]
pub struct CssError {
    /// What went wrong
    pub kind: CssErrorKind,
    /// Where it went wrong
    pub location: Location,
}

impl CssError {
    #[must_use]
    pub fn new(kind: CssErrorKind, location: Location) -> Self {
        CssError { kind, location }
    }

    /// A syntax error with an already-rendered message
    #[must_use]
    pub fn syntax(message: &str, location: Location) -> Self {
        CssError {
            kind: CssErrorKind::Syntax(message.to_string()),
            location,
        }
    }

    /// True when the input simply ran out
    #[must_use]
    pub fn is_end_of_input(&self) -> bool {
        matches!(self.kind, CssErrorKind::EndOfInput)
    }
}

pub type CssResult<T> = Result<T, CssError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let error = CssError::syntax("expected a selector", Location::new(3, 7, 40));
        assert_eq!(error.to_string(), "expected a selector at (3:7)");

        let error = CssError::new(CssErrorKind::EndOfInput, Location::new(1, 12, 11));
        assert_eq!(error.to_string(), "unexpected end of input at (1:12)");
    }

    #[test]
    fn end_of_input_is_distinguishable() {
        let eof = CssError::new(CssErrorKind::EndOfInput, Location::default());
        assert!(eof.is_end_of_input());

        let syntax = CssError::syntax("unexpected token", Location::default());
        assert!(!syntax.is_end_of_input());
    }
}
