//! CSS3 parsing core for Nimbra.
//!
//! The crate is a four-layer pipeline: a byte-oriented tokenizer with
//! zero-copy lexemes ([`tokenizer`]), a block-aware parser driver with a
//! one-slot lookahead cache and transactional rollback ([`parser`]), and on
//! top of those the Selectors Level 4 recognizer ([`selector`]), the math
//! expression parser ([`calc`]), the CSS Color 4 parser ([`colors`]) and the
//! basic value recognizers ([`values`]).
//!
//! Parsed values are plain data and freely shareable across threads; a parser
//! instance itself owns its cursor and is single-threaded.

pub mod calc;
pub mod colors;
pub mod errors;
pub mod parser;
pub mod selector;
pub mod serialize;
pub mod tokenizer;
pub mod values;

pub use errors::{BasicParseError, BasicParseErrorKind, ParseError, ParseErrorKind};
pub use nimbra_shared::errors::{CssError, CssErrorKind, CssResult};
pub use nimbra_shared::lexeme::Lexeme;
pub use nimbra_shared::location::Location;
pub use parser::{BlockType, Delimiters, Parser, ParserInput, ParserState};
pub use tokenizer::{Number, NumericValue, SourcePosition, Token, TokenType, Tokenizer};

use crate::calc::CalcExpr;
use crate::colors::Color;
use crate::selector::SelectorList;
use crate::values::CssDimension;
use std::fmt::Display;

/// Renders a borrowed parse error into the owned façade error, keeping a
/// bare end-of-input distinguishable from other syntax errors
fn into_css_error<E: Display>(error: ParseError<'_, E>) -> CssError {
    let kind = match &error.kind {
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => CssErrorKind::EndOfInput,
        kind => CssErrorKind::Syntax(kind.to_string()),
    };
    CssError::new(kind, error.location)
}

/// Parses a complete selector list from a string, surfacing the first error
pub fn parse_selector_list(css: &str) -> CssResult<SelectorList<'_>> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parser
        .parse_entirely(SelectorList::parse)
        .map_err(into_css_error)
}

/// Parses a complete selector list, dropping invalid selectors silently
pub fn parse_selector_list_forgiving(css: &str) -> CssResult<SelectorList<'_>> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parser
        .parse_entirely(SelectorList::parse_forgiving)
        .map_err(into_css_error)
}

/// Parses a complete `<color>` value from a string
pub fn parse_color(css: &str) -> CssResult<Color<'_>> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parser.parse_entirely(Color::parse).map_err(into_css_error)
}

/// Parses and folds a complete math expression from a string, with any
/// dimension accepted as a leaf
pub fn parse_calc(css: &str) -> CssResult<CalcExpr<CssDimension>> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parser
        .parse_entirely(|p| CalcExpr::parse(p))
        .map_err(into_css_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::Rgba;
    use crate::selector::{Combinator, Component, Specificity};
    use crate::values::Length;
    use simple_logger::SimpleLogger;

    fn init_logging() {
        // second init in the same process is fine to ignore
        let _ = SimpleLogger::new().init();
    }

    #[test]
    fn scenario_compound_chain() {
        init_logging();

        let list = match parse_selector_list(".a > .b + .c") {
            Ok(list) => list,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(list.len(), 1);
        let selector = &list.selectors[0];
        assert_eq!(selector.components().len(), 5);
        assert_eq!(selector.specificity(), Specificity::new(0, 3, 0));

        let compounds: Vec<_> = selector.compounds().collect();
        assert_eq!(compounds.len(), 3);
        assert!(matches!(compounds[0][0], Component::Class(ref c) if *c == "a"));
        assert!(matches!(compounds[1][0], Component::Class(ref c) if *c == "b"));
        assert!(matches!(compounds[2][0], Component::Class(ref c) if *c == "c"));
        let combinators: Vec<_> = selector.combinators().collect();
        assert_eq!(combinators, vec![Combinator::Child, Combinator::NextSibling]);
    }

    #[test]
    fn scenario_is_specificity() {
        let list = match parse_selector_list(":is(.a, #b) .c") {
            Ok(list) => list,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(list.len(), 1);
        assert_eq!(list.selectors[0].specificity(), Specificity::new(1, 1, 0));
    }

    #[test]
    fn scenario_calc_product() {
        let mut input = ParserInput::new("calc( (1 + 2) * 3px )");
        let mut parser = Parser::new(&mut input);
        let expr: CalcExpr<Length> = match parser.parse_entirely(|p| CalcExpr::parse(p)) {
            Ok(expr) => expr,
            Err(e) => panic!("{e}"),
        };
        match expr {
            CalcExpr::Product(leaf, factor) => {
                assert_eq!(factor, 3.0);
                assert_eq!(*leaf, CalcExpr::Value(Length::new(3.0, crate::values::LengthUnit::Px)));
            }
            other => panic!("expected a product, got {other:?}"),
        }
    }

    #[test]
    fn scenario_url_with_quoted_string() {
        let mut input = ParserInput::new("url( \"x\" )");
        let mut parser = Parser::new(&mut input);
        assert!(matches!(parser.expect_url(), Ok(ref url) if *url == "x"));
        assert!(parser.is_exhausted());
    }

    #[test]
    fn scenario_hash_color() {
        let mut tokenizer = Tokenizer::new("#abcd");
        let token = tokenizer.next_token();
        assert!(matches!(
            token.map(|t| t.token_type),
            Some(TokenType::IDHash(ref v)) if *v == "abcd"
        ));

        let color = match parse_color("#abcd") {
            Ok(Color::Rgba(rgba)) => rgba,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(
            color,
            Rgba::new(170, 187, 204, f64::from(0xdd_u8) / 255.0)
        );
    }

    #[test]
    fn scenario_bad_string_stops_at_the_newline() {
        let mut tokenizer = Tokenizer::new("'unterminated\n");
        let token = tokenizer.next_token();
        assert!(matches!(
            token.map(|t| t.token_type),
            Some(TokenType::BadString(ref v)) if *v == "unterminated"
        ));
        let token = match tokenizer.next_token() {
            Some(token) => token,
            None => panic!("expected the newline to remain"),
        };
        assert!(matches!(token.token_type, TokenType::Whitespace("\n")));
    }

    #[test]
    fn facade_reports_located_errors() {
        let error = match parse_selector_list(".a >") {
            Err(error) => error,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(error.kind, CssErrorKind::Syntax(_)));
        assert_eq!(error.location.line, 1);

        let error = match parse_color("") {
            Err(error) => error,
            Ok(_) => panic!("expected an error"),
        };
        assert!(error.is_end_of_input());

        assert!(parse_color("calc(").is_err());
        assert!(parse_calc("calc(1 + )").is_err());
    }

    #[test]
    fn substitution_tracking_through_the_parser() {
        let mut input = ParserInput::new("calc(var(--x) + 1px)");
        let mut parser = Parser::new(&mut input);
        parser.track_substitution_functions(&["var", "env"]);
        while parser.next().is_ok() {}
        assert!(parser.seen_substitution_function());
        assert!(!parser.seen_substitution_function());
    }

    #[test]
    fn forgiving_facade() {
        let list = match parse_selector_list_forgiving("a, !!, b") {
            Ok(list) => list,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(list.len(), 2);
    }
}
