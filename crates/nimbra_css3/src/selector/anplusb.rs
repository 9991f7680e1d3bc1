//! The [An+B microsyntax](https://www.w3.org/TR/css-syntax-3/#anb-microsyntax)
//! used by the `:nth-*` pseudo-classes.
//!
//! The tokenizer has already merged signs, digits and `n` runs into number,
//! dimension and ident tokens, so this follows the microsyntax's per-token
//! case analysis rather than rescanning characters.

use crate::errors::BasicParseError;
use crate::parser::Parser;
use crate::selector::parser::SelectorParseError;
use crate::selector::AnPlusB;
use crate::tokenizer::{Token, TokenType};
use nimbra_shared::location::Location;

fn unexpected<'i>(token_type: TokenType<'i>, location: Location) -> SelectorParseError<'i> {
    BasicParseError::unexpected_token(Token::new(token_type, location)).into()
}

/// Parses the `An+B` notation, including `even`, `odd` and the dimension and
/// ident forms the tokenizer produces for inputs like `2n`, `-n-3` or `n- 4`.
pub fn parse_anplusb<'i, 't>(
    parser: &mut Parser<'i, 't>,
) -> Result<AnPlusB, SelectorParseError<'i>> {
    log::trace!("parse_anplusb");

    let token = parser.next()?;
    let location = token.location;
    match token.token_type {
        TokenType::Number(value) if value.int_value.is_some() => {
            Ok(AnPlusB::new(0, value.int_value.unwrap_or(0)))
        }
        TokenType::Dimension { value, unit } if value.int_value.is_some() => {
            let a = value.int_value.unwrap_or(0);
            if unit.eq_ignore_ascii_case("n") {
                parse_b(parser, a)
            } else if unit.eq_ignore_ascii_case("n-") {
                parse_signless_b(parser, a, -1)
            } else {
                match parse_n_dash_digits(&unit) {
                    Ok(b) => Ok(AnPlusB::new(a, b)),
                    Err(()) => Err(unexpected(TokenType::Dimension { value, unit }, location)),
                }
            }
        }
        TokenType::Ident(value) => {
            if value.eq_ignore_ascii_case("even") {
                Ok(AnPlusB::new(2, 0))
            } else if value.eq_ignore_ascii_case("odd") {
                Ok(AnPlusB::new(2, 1))
            } else if value.eq_ignore_ascii_case("n") {
                parse_b(parser, 1)
            } else if value.eq_ignore_ascii_case("-n") {
                parse_b(parser, -1)
            } else if value.eq_ignore_ascii_case("n-") {
                parse_signless_b(parser, 1, -1)
            } else if value.eq_ignore_ascii_case("-n-") {
                parse_signless_b(parser, -1, -1)
            } else if let Some(rest) = value.strip_prefix('-') {
                match parse_n_dash_digits(rest) {
                    Ok(b) => Ok(AnPlusB::new(-1, b)),
                    Err(()) => Err(unexpected(TokenType::Ident(value), location)),
                }
            } else {
                match parse_n_dash_digits(&value) {
                    Ok(b) => Ok(AnPlusB::new(1, b)),
                    Err(()) => Err(unexpected(TokenType::Ident(value), location)),
                }
            }
        }
        // `+n` and friends: the sign is a delim that must touch the ident
        TokenType::Delim('+') => {
            let token = parser.next_including_whitespace()?;
            let location = token.location;
            match token.token_type {
                TokenType::Ident(value) => {
                    if value.eq_ignore_ascii_case("n") {
                        parse_b(parser, 1)
                    } else if value.eq_ignore_ascii_case("n-") {
                        parse_signless_b(parser, 1, -1)
                    } else {
                        match parse_n_dash_digits(&value) {
                            Ok(b) => Ok(AnPlusB::new(1, b)),
                            Err(()) => Err(unexpected(TokenType::Ident(value), location)),
                        }
                    }
                }
                other => Err(unexpected(other, location)),
            }
        }
        other => Err(unexpected(other, location)),
    }
}

/// After `An`: an optional `+ B` / `- B` with whitespace allowed, or a signed
/// integer stuck to the end
fn parse_b<'i, 't>(parser: &mut Parser<'i, 't>, a: i32) -> Result<AnPlusB, SelectorParseError<'i>> {
    let state = parser.state();
    match parser.next() {
        Ok(token) => match token.token_type {
            TokenType::Delim('+') => parse_signless_b(parser, a, 1),
            TokenType::Delim('-') => parse_signless_b(parser, a, -1),
            TokenType::Number(value) if value.has_sign && value.int_value.is_some() => {
                Ok(AnPlusB::new(a, value.int_value.unwrap_or(0)))
            }
            _ => {
                parser.reset(&state);
                Ok(AnPlusB::new(a, 0))
            }
        },
        Err(_) => {
            parser.reset(&state);
            Ok(AnPlusB::new(a, 0))
        }
    }
}

/// After an explicit sign: the `B` part must be a signless integer
fn parse_signless_b<'i, 't>(
    parser: &mut Parser<'i, 't>,
    a: i32,
    b_sign: i32,
) -> Result<AnPlusB, SelectorParseError<'i>> {
    let token = parser.next()?;
    let location = token.location;
    match token.token_type {
        TokenType::Number(value) if !value.has_sign && value.int_value.is_some() => {
            Ok(AnPlusB::new(a, b_sign * value.int_value.unwrap_or(0)))
        }
        other => Err(unexpected(other, location)),
    }
}

/// `n-123` glued into one ident or dimension unit; the digits carry the minus
fn parse_n_dash_digits(text: &str) -> Result<i32, ()> {
    let bytes = text.as_bytes();
    if bytes.len() >= 3
        && (bytes[0] == b'n' || bytes[0] == b'N')
        && bytes[1] == b'-'
        && bytes[2..].iter().all(u8::is_ascii_digit)
    {
        text[1..].parse().map_err(|_| ())
    } else {
        Err(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserInput;

    macro_rules! test_anplusb {
        ($input:expr, $a:expr, $b:expr) => {
            let mut input = ParserInput::new($input);
            let mut parser = Parser::new(&mut input);
            let result = parse_anplusb(&mut parser);
            assert_eq!(
                result.ok(),
                Some(AnPlusB::new($a, $b)),
                "for input {:?}",
                $input
            );
        };
    }

    macro_rules! test_anplusb_invalid {
        ($input:expr) => {
            let mut input = ParserInput::new($input);
            let mut parser = Parser::new(&mut input);
            assert!(parse_anplusb(&mut parser).is_err(), "for input {:?}", $input);
        };
    }

    #[test]
    fn anplusb() {
        test_anplusb!("even", 2, 0);
        test_anplusb!("odd", 2, 1);
        test_anplusb!("EVEN", 2, 0);
        test_anplusb!("5", 0, 5);
        test_anplusb!("-5", 0, -5);
        test_anplusb!("n", 1, 0);
        test_anplusb!("-n", -1, 0);
        test_anplusb!("+n", 1, 0);
        test_anplusb!("2n", 2, 0);
        test_anplusb!("1n+2", 1, 2);
        test_anplusb!("1n-2", 1, -2);
        test_anplusb!("-1n+2", -1, 2);
        test_anplusb!("-1n-20", -1, -20);
        test_anplusb!("10n-5", 10, -5);
        test_anplusb!("0n+5", 0, 5);
        test_anplusb!("n+0", 1, 0);
        test_anplusb!("2N+1", 2, 1);
        test_anplusb!("3n + 1", 3, 1);
        test_anplusb!("3n - 1", 3, -1);
        test_anplusb!("+3n - 2", 3, -2);
        test_anplusb!("-n+6", -1, 6);
        test_anplusb!("-n + 6", -1, 6);
        test_anplusb!("-n- 2", -1, -2);
        test_anplusb!("n- 4", 1, -4);
        test_anplusb!("-n-3", -1, -3);
        test_anplusb!("n-3", 1, -3);
    }

    #[test]
    fn anplusb_invalid() {
        test_anplusb_invalid!("3n + +2");
        test_anplusb_invalid!("3n + -2");
        test_anplusb_invalid!("n - +3");
        test_anplusb_invalid!("3m+1");
        test_anplusb_invalid!("+ n");
        test_anplusb_invalid!("2.5");
        test_anplusb_invalid!("{}");
    }
}
