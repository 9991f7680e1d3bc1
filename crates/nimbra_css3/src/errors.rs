//! Error results that can be returned from the css3 parsing core.
//!
//! Every parsing entry point returns a result carrying either a value or a
//! located error. `BasicParseError` covers the driver-level kinds;
//! `ParseError<E>` additionally carries a consumer-supplied typed error.

use crate::tokenizer::Token;
use nimbra_shared::lexeme::Lexeme;
use nimbra_shared::location::Location;
use std::fmt;
use thiserror::Error;

/// Error kinds produced by the parser driver itself
#[derive(Clone, Debug, PartialEq, Error)]
pub enum BasicParseErrorKind<'i> {
    /// The end of the input (or of the delimited region) was reached
    #[error("unexpected end of input")]
    EndOfInput,
    /// A token that does not fit the grammar at this point
    #[error("unexpected token: {0}")]
    UnexpectedToken(Token<'i>),
    /// A qualified rule that could not be parsed
    #[error("invalid qualified rule")]
    QualifiedRuleInvalid,
    /// An at-rule with an unknown or invalid prelude
    #[error("invalid @{0} rule")]
    AtRuleInvalid(Lexeme<'i>),
    /// An at-rule body that could not be parsed
    #[error("invalid at-rule body")]
    AtRuleBodyInvalid,
    /// A declaration that did not end where one must
    #[error("expected a ; or the end of the declaration block")]
    ExpectedSemicolonOrCloseBrace,
}

/// A parser-driver error on the given position
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{kind} at {location}")]
pub struct BasicParseError<'i> {
    /// What went wrong
    pub kind: BasicParseErrorKind<'i>,
    /// Where it went wrong
    pub location: Location,
}

impl<'i> BasicParseError<'i> {
    /// An unexpected-token error located at the token itself
    #[must_use]
    pub fn unexpected_token(token: Token<'i>) -> Self {
        let location = token.location;
        BasicParseError {
            kind: BasicParseErrorKind::UnexpectedToken(token),
            location,
        }
    }
}

/// Either a driver-level error kind or a consumer-supplied one
#[derive(Clone, Debug, PartialEq)]
pub enum ParseErrorKind<'i, E> {
    /// A kind produced by the parser driver
    Basic(BasicParseErrorKind<'i>),
    /// A kind produced by the consumer of the driver
    Custom(E),
}

impl<'i, E: fmt::Display> fmt::Display for ParseErrorKind<'i, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Basic(kind) => kind.fmt(f),
            ParseErrorKind::Custom(kind) => kind.fmt(f),
        }
    }
}

/// A located parse error, possibly carrying a consumer-supplied typed error
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError<'i, E> {
    /// What went wrong
    pub kind: ParseErrorKind<'i, E>,
    /// Where it went wrong
    pub location: Location,
}

impl<'i, E: fmt::Display> fmt::Display for ParseError<'i, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.location)
    }
}

impl<'i, E: fmt::Debug + fmt::Display> std::error::Error for ParseError<'i, E> {}

impl<'i, E> ParseError<'i, E> {
    /// Returns the basic kind when this error carries one
    #[must_use]
    pub fn basic_kind(&self) -> Option<&BasicParseErrorKind<'i>> {
        match &self.kind {
            ParseErrorKind::Basic(kind) => Some(kind),
            ParseErrorKind::Custom(_) => None,
        }
    }

    /// Maps the custom error kind, keeping the location
    pub fn map_custom<F, E2>(self, f: F) -> ParseError<'i, E2>
    where
        F: FnOnce(E) -> E2,
    {
        ParseError {
            kind: match self.kind {
                ParseErrorKind::Basic(kind) => ParseErrorKind::Basic(kind),
                ParseErrorKind::Custom(e) => ParseErrorKind::Custom(f(e)),
            },
            location: self.location,
        }
    }
}

impl<'i, E> From<BasicParseError<'i>> for ParseError<'i, E> {
    fn from(error: BasicParseError<'i>) -> Self {
        ParseError {
            kind: ParseErrorKind::Basic(error.kind),
            location: error.location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TokenType;

    #[test]
    fn display() {
        let error = BasicParseError {
            kind: BasicParseErrorKind::EndOfInput,
            location: Location::new(2, 5, 11),
        };
        assert_eq!(error.to_string(), "unexpected end of input at (2:5)");

        let token = Token::new(TokenType::Semicolon, Location::new(1, 3, 2));
        let error: ParseError<'_, std::convert::Infallible> =
            ParseError::from(BasicParseError::unexpected_token(token));
        assert_eq!(error.to_string(), "unexpected token: ; at (1:3)");
        assert!(error.basic_kind().is_some());
    }
}
