//! CSS tokenizer according to the [w3 specification](https://www.w3.org/TR/css-syntax-3/#tokenization).
//!
//! The tokenizer scans raw bytes and hands out one token at a time. Values
//! borrow straight from the input wherever possible; only escape sequences,
//! NUL replacement and escaped newlines force an owned buffer.

use crate::serialize::{serialize_identifier, serialize_string, serialize_unquoted_url};
use nimbra_shared::lexeme::Lexeme;
use nimbra_shared::location::Location;
use std::fmt::{self, Write};

pub type Number = f64;

/// The numeric payload shared by number, percentage and dimension tokens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumericValue<'i> {
    /// Whether the source had a leading `+` or `-`
    pub has_sign: bool,
    /// The numeric value. Percentages are already divided by 100.
    pub value: Number,
    /// `Some` when the source had no fractional or exponent part. For
    /// percentages this stays un-divided.
    pub int_value: Option<i32>,
    /// The exact numeric text as it appeared in the source
    pub repr: &'i str,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenType<'i> {
    /// An [`<at-keyword-token>`](https://www.w3.org/TR/css-syntax-3/#at-keyword-token-diagram)
    ///
    /// The value does not include the `@` marker.
    AtKeyword(Lexeme<'i>),
    Ident(Lexeme<'i>),
    /// A [`<function-token>`](https://www.w3.org/TR/css-syntax-3/#function-token-diagram)
    ///
    /// The value does not include the `(` marker.
    Function(Lexeme<'i>),
    /// An unquoted [`<url-token>`](https://www.w3.org/TR/css-syntax-3/#url-token-diagram)
    Url(Lexeme<'i>),
    /// A `<bad-url-token>`. Always a parse error.
    BadUrl(Lexeme<'i>),
    Dimension {
        value: NumericValue<'i>,
        unit: Lexeme<'i>,
    },
    /// A percentage. `value.value` is already divided by 100.
    Percentage(NumericValue<'i>),
    Number(NumericValue<'i>),
    /// A [`<string-token>`](https://www.w3.org/TR/css-syntax-3/#string-token-diagram)
    ///
    /// The value does not include the quotes.
    QuotedString(Lexeme<'i>),
    /// A `<bad-string-token>`. Always a parse error.
    BadString(Lexeme<'i>),
    /// A [`<whitespace-token>`](https://www.w3.org/TR/css-syntax-3/#whitespace-token-diagram),
    /// carrying the exact source slice.
    Whitespace(&'i str),
    /// A comment, including the `/*` and `*/` markers.
    Comment(&'i str),
    /// A [`<hash-token>`](https://www.w3.org/TR/css-syntax-3/#hash-token-diagram) with the type flag set to "unrestricted"
    ///
    /// The value does not include the `#` marker.
    Hash(Lexeme<'i>),
    /// A [`<hash-token>`](https://www.w3.org/TR/css-syntax-3/#hash-token-diagram) with the type flag set to "id"
    ///
    /// Hash that is a valid ID selector. The value does not include the `#`.
    IDHash(Lexeme<'i>),
    /// A `<delim-token>`
    Delim(char),
    /// A `<(-token>`. Opens a parenthesis block.
    LParen,
    /// A `<)-token>`. A parse error when unmatched.
    RParen,
    /// A `<[-token>`. Opens a square bracket block.
    LBracket,
    /// A `<]-token>`. A parse error when unmatched.
    RBracket,
    /// A `<{-token>`. Opens a curly bracket block.
    LCurly,
    /// A `<}-token>`. A parse error when unmatched.
    RCurly,
    /// A `<comma-token>`
    Comma,
    /// A `:` `<colon-token>`
    Colon,
    /// A `;` `<semicolon-token>`
    Semicolon,
    /// `~=`
    IncludeMatch,
    /// `|=`
    DashMatch,
    /// `^=`
    PrefixMatch,
    /// `$=`
    SuffixMatch,
    /// `*=`
    SubstringMatch,
    /// `||`
    Column,
    /// `<!--`
    Cdo,
    /// `-->`
    Cdc,
    /// A `<unicode-range-token>` such as `u+26` or `u+0-7f` or `u+4??`
    UnicodeRange { start: u32, end: u32 },
    /// Queued after a string token when the input ended inside the string
    EofInString,
    /// Queued after a url token when the input ended inside the url
    EofInUrl,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token<'i> {
    /// Type of the token
    pub token_type: TokenType<'i>,
    /// Location of the token in the source
    pub location: Location,
}

impl<'i> Token<'i> {
    /// Returns a new token for the given type on the given location
    pub(crate) fn new(token_type: TokenType<'i>, location: Location) -> Token<'i> {
        Token { token_type, location }
    }

    /// Parse-error tokens should be surfaced by strict consumers.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::BadUrl(_)
                | TokenType::BadString(_)
                | TokenType::EofInString
                | TokenType::EofInUrl
                | TokenType::RParen
                | TokenType::RBracket
                | TokenType::RCurly
        )
    }

    pub(crate) fn is_whitespace(&self) -> bool {
        matches!(self.token_type, TokenType::Whitespace(_))
    }

    pub(crate) fn is_comment(&self) -> bool {
        matches!(self.token_type, TokenType::Comment(_))
    }

    pub(crate) fn is_delim(&self, delim: char) -> bool {
        matches!(self.token_type, TokenType::Delim(c) if c == delim)
    }
}

impl fmt::Display for TokenType<'_> {
    /// Writes the CSS text form of the token. Concatenating every token of a
    /// tokenized stylesheet reproduces the input, up to escape normalization
    /// and bad-string / bad-url recovery regions.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::AtKeyword(value) => {
                f.write_str("@")?;
                serialize_identifier(value, f)
            }
            TokenType::Ident(value) => serialize_identifier(value, f),
            TokenType::Function(name) => {
                serialize_identifier(name, f)?;
                f.write_str("(")
            }
            TokenType::Url(value) => {
                f.write_str("url(")?;
                serialize_unquoted_url(value, f)?;
                f.write_str(")")
            }
            TokenType::BadUrl(value) => write!(f, "url({value})"),
            TokenType::Dimension { value, unit } => {
                f.write_str(value.repr)?;
                serialize_identifier(unit, f)
            }
            TokenType::Percentage(value) => write!(f, "{}%", value.repr),
            TokenType::Number(value) => f.write_str(value.repr),
            TokenType::QuotedString(value) => serialize_string(value, f),
            TokenType::BadString(value) => write!(f, "\"{value}"),
            TokenType::Whitespace(value) | TokenType::Comment(value) => f.write_str(value),
            TokenType::Hash(value) => {
                f.write_str("#")?;
                crate::serialize::serialize_name(value, f)
            }
            TokenType::IDHash(value) => {
                f.write_str("#")?;
                serialize_identifier(value, f)
            }
            TokenType::Delim(c) => f.write_char(*c),
            TokenType::LParen => f.write_str("("),
            TokenType::RParen => f.write_str(")"),
            TokenType::LBracket => f.write_str("["),
            TokenType::RBracket => f.write_str("]"),
            TokenType::LCurly => f.write_str("{"),
            TokenType::RCurly => f.write_str("}"),
            TokenType::Comma => f.write_str(","),
            TokenType::Colon => f.write_str(":"),
            TokenType::Semicolon => f.write_str(";"),
            TokenType::IncludeMatch => f.write_str("~="),
            TokenType::DashMatch => f.write_str("|="),
            TokenType::PrefixMatch => f.write_str("^="),
            TokenType::SuffixMatch => f.write_str("$="),
            TokenType::SubstringMatch => f.write_str("*="),
            TokenType::Column => f.write_str("||"),
            TokenType::Cdo => f.write_str("<!--"),
            TokenType::Cdc => f.write_str("-->"),
            TokenType::UnicodeRange { start, end } => {
                if start == end {
                    write!(f, "U+{start:X}")
                } else {
                    write!(f, "U+{start:X}-{end:X}")
                }
            }
            TokenType::EofInString | TokenType::EofInUrl => Ok(()),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.token_type, f)
    }
}

/// Error token queued to be emitted on the call after the content token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PendingErrorToken {
    EofInString,
    EofInUrl,
}

/// A byte position into the source, usable for zero-copy slicing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePosition(pub(crate) usize);

impl SourcePosition {
    #[must_use]
    pub fn byte_index(self) -> usize {
        self.0
    }
}

/// Captured tokenizer state, restorable in O(1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenizerState {
    pub(crate) position: usize,
    pub(crate) current_line_start_position: usize,
    pub(crate) current_line_number: u32,
    pub(crate) pending_error_token: Option<PendingErrorToken>,
}

impl TokenizerState {
    #[must_use]
    pub fn position(&self) -> SourcePosition {
        SourcePosition(self.position)
    }

    #[must_use]
    pub fn source_location(&self) -> Location {
        Location::new(
            self.current_line_number,
            self.position.wrapping_sub(self.current_line_start_position).wrapping_add(1) as u32,
            self.position,
        )
    }
}

pub struct Tokenizer<'i> {
    input: &'i str,
    /// Byte position of the NEXT read
    position: usize,
    /// Virtual start-of-line offset. Decremented for every 4-byte UTF-8 lead
    /// and incremented for every continuation byte, so that
    /// `position - current_line_start_position + 1` is the UTF-16 column.
    current_line_start_position: usize,
    /// Line number, starting with 1
    current_line_number: u32,
    /// Error token queued for the next `next_token` call
    pending_error_token: Option<PendingErrorToken>,
    /// Last `sourceMappingURL=` seen in a comment
    source_map_url: Option<&'i str>,
    /// Last `sourceURL=` seen in a comment
    source_url: Option<&'i str>,
    /// Function names armed for substitution detection, lowercased
    substitution_functions: Vec<String>,
    substitution_seen: bool,
}

impl<'i> Tokenizer<'i> {
    pub fn new(input: &'i str) -> Self {
        Self {
            input,
            position: 0,
            current_line_start_position: 0,
            current_line_number: 1,
            pending_error_token: None,
            source_map_url: None,
            source_url: None,
            substitution_functions: Vec::new(),
            substitution_seen: false,
        }
    }

    /// Returns the location of the next byte to be consumed
    #[must_use]
    pub fn current_location(&self) -> Location {
        Location::new(
            self.current_line_number,
            self.position.wrapping_sub(self.current_line_start_position).wrapping_add(1) as u32,
            self.position,
        )
    }

    /// Returns true when every byte of the input has been consumed
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.position >= self.input.len() && self.pending_error_token.is_none()
    }

    #[must_use]
    pub fn position(&self) -> SourcePosition {
        SourcePosition(self.position)
    }

    /// Returns a borrowed slice of the source between two captured positions
    #[must_use]
    pub fn slice(&self, start: SourcePosition, end: SourcePosition) -> &'i str {
        &self.input[start.0..end.0]
    }

    /// Returns a borrowed slice from a captured position to the current one
    #[must_use]
    pub fn slice_from(&self, start: SourcePosition) -> &'i str {
        &self.input[start.0..self.position]
    }

    /// Captures the tokenizer state for later restoration
    #[must_use]
    pub fn state(&self) -> TokenizerState {
        TokenizerState {
            position: self.position,
            current_line_start_position: self.current_line_start_position,
            current_line_number: self.current_line_number,
            pending_error_token: self.pending_error_token,
        }
    }

    /// Restores a previously captured state
    pub fn reset(&mut self, state: &TokenizerState) {
        self.position = state.position;
        self.current_line_start_position = state.current_line_start_position;
        self.current_line_number = state.current_line_number;
        self.pending_error_token = state.pending_error_token;
    }

    /// The `sourceMappingURL` from the last `/*# ... */` comment seen so far
    #[must_use]
    pub fn current_source_map_url(&self) -> Option<&'i str> {
        self.source_map_url
    }

    /// The `sourceURL` from the last `/*@ ... */` comment seen so far
    #[must_use]
    pub fn current_source_url(&self) -> Option<&'i str> {
        self.source_url
    }

    /// Arms the tokenizer with function names to watch for. Whenever a
    /// function token with one of these names is produced, a flag is set that
    /// can be read (and reset) with [`Tokenizer::seen_substitution_function`].
    pub fn track_substitution_functions(&mut self, names: &[&str]) {
        self.substitution_functions = names.iter().map(|n| n.to_ascii_lowercase()).collect();
    }

    /// Reads and resets the substitution-function flag
    pub fn seen_substitution_function(&mut self) -> bool {
        std::mem::take(&mut self.substitution_seen)
    }

    pub(crate) fn next_byte(&self) -> Option<u8> {
        self.input.as_bytes().get(self.position).copied()
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.position + offset).copied()
    }

    fn starts_with(&self, needle: &[u8]) -> bool {
        self.input.as_bytes()[self.position..].starts_with(needle)
    }

    /// Advances over bytes known to be ASCII and not newlines
    fn advance(&mut self, n: usize) {
        self.position += n;
    }

    /// Consumes one newline, treating `\r\n` as a single line break
    fn consume_newline(&mut self) {
        let byte = self.next_byte();
        self.position += 1;
        if byte == Some(b'\r') && self.next_byte() == Some(b'\n') {
            self.position += 1;
        }
        self.current_line_start_position = self.position;
        self.current_line_number += 1;
    }

    /// Consumes one (possibly multi-byte) character, adjusting the virtual
    /// line start so UTF-16 column arithmetic stays correct: continuation
    /// bytes must not advance the column, and a supplementary-plane character
    /// counts as two UTF-16 units for four UTF-8 bytes.
    fn consume_char(&mut self) -> char {
        match self.input[self.position..].chars().next() {
            Some(c) => {
                let len = c.len_utf8();
                self.position += len;
                self.current_line_start_position =
                    self.current_line_start_position.wrapping_add(len - 1);
                if len == 4 {
                    self.current_line_start_position =
                        self.current_line_start_position.wrapping_sub(1);
                }
                c
            }
            None => '\u{FFFD}',
        }
    }

    fn has_newline_at(&self, offset: usize) -> bool {
        matches!(self.byte_at(offset), Some(b'\n' | b'\r' | b'\x0C'))
    }

    /// 4.3.8. [Check if two code points are a valid escape](https://www.w3.org/TR/css-syntax-3/#starts-with-a-valid-escape)
    fn is_valid_escape_at(&self, offset: usize) -> bool {
        self.byte_at(offset) == Some(b'\\') && !self.has_newline_at(offset + 1)
    }

    /// 4.3.9. [Check if three code points would start an ident sequence](https://www.w3.org/TR/css-syntax-3/#would-start-an-identifier)
    fn would_start_ident_sequence(&self, offset: usize) -> bool {
        match self.byte_at(offset) {
            Some(b'-') => match self.byte_at(offset + 1) {
                Some(b'-') => true,
                Some(b'\\') => !self.has_newline_at(offset + 2),
                Some(b) => is_name_start_byte(b),
                None => false,
            },
            Some(b'\\') => !self.has_newline_at(offset + 1),
            Some(b) => is_name_start_byte(b),
            None => false,
        }
    }

    /// 4.3.10. [Check if three code points would start a number](https://www.w3.org/TR/css-syntax-3/#starts-with-a-number)
    fn would_start_number(&self, offset: usize) -> bool {
        match self.byte_at(offset) {
            Some(b'+' | b'-') => match self.byte_at(offset + 1) {
                Some(b) if b.is_ascii_digit() => true,
                Some(b'.') => matches!(self.byte_at(offset + 2), Some(b) if b.is_ascii_digit()),
                _ => false,
            },
            Some(b'.') => matches!(self.byte_at(offset + 1), Some(b) if b.is_ascii_digit()),
            Some(b) => b.is_ascii_digit(),
            None => false,
        }
    }

    /// 4.3.1. [Consume a token](https://www.w3.org/TR/css-syntax-3/#consume-token)
    ///
    /// Returns `None` when the input is exhausted.
    pub fn next_token(&mut self) -> Option<Token<'i>> {
        if let Some(pending) = self.pending_error_token.take() {
            let token_type = match pending {
                PendingErrorToken::EofInString => TokenType::EofInString,
                PendingErrorToken::EofInUrl => TokenType::EofInUrl,
            };
            return Some(Token::new(token_type, self.current_location()));
        }

        let location = self.current_location();
        let b = self.next_byte()?;

        let token_type = match b {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' => self.consume_whitespace(),
            b'"' => self.consume_quoted_string(false),
            b'#' => {
                self.advance(1);
                if matches!(self.next_byte(), Some(b) if is_name_byte(b) || b >= 0x80 || b == b'\0')
                    || self.is_valid_escape_at(0)
                {
                    if self.would_start_ident_sequence(0) {
                        TokenType::IDHash(self.consume_name())
                    } else {
                        TokenType::Hash(self.consume_name())
                    }
                } else {
                    TokenType::Delim('#')
                }
            }
            b'$' => {
                if self.byte_at(1) == Some(b'=') {
                    self.advance(2);
                    TokenType::SuffixMatch
                } else {
                    self.advance(1);
                    TokenType::Delim('$')
                }
            }
            b'\'' => self.consume_quoted_string(true),
            b'(' => {
                self.advance(1);
                TokenType::LParen
            }
            b')' => {
                self.advance(1);
                TokenType::RParen
            }
            b'*' => {
                if self.byte_at(1) == Some(b'=') {
                    self.advance(2);
                    TokenType::SubstringMatch
                } else {
                    self.advance(1);
                    TokenType::Delim('*')
                }
            }
            b'+' => {
                if self.would_start_number(0) {
                    self.consume_numeric()
                } else {
                    self.advance(1);
                    TokenType::Delim('+')
                }
            }
            b',' => {
                self.advance(1);
                TokenType::Comma
            }
            b'-' => {
                if self.would_start_number(0) {
                    self.consume_numeric()
                } else if self.starts_with(b"-->") {
                    self.advance(3);
                    TokenType::Cdc
                } else if self.would_start_ident_sequence(0) {
                    self.consume_ident_like()
                } else {
                    self.advance(1);
                    TokenType::Delim('-')
                }
            }
            b'.' => {
                if self.would_start_number(0) {
                    self.consume_numeric()
                } else {
                    self.advance(1);
                    TokenType::Delim('.')
                }
            }
            b'/' => {
                if self.byte_at(1) == Some(b'*') {
                    self.consume_comment()
                } else {
                    self.advance(1);
                    TokenType::Delim('/')
                }
            }
            b'0'..=b'9' => self.consume_numeric(),
            b':' => {
                self.advance(1);
                TokenType::Colon
            }
            b';' => {
                self.advance(1);
                TokenType::Semicolon
            }
            b'<' => {
                if self.starts_with(b"<!--") {
                    self.advance(4);
                    TokenType::Cdo
                } else {
                    self.advance(1);
                    TokenType::Delim('<')
                }
            }
            b'@' => {
                self.advance(1);
                if self.would_start_ident_sequence(0) {
                    TokenType::AtKeyword(self.consume_name())
                } else {
                    TokenType::Delim('@')
                }
            }
            b'[' => {
                self.advance(1);
                TokenType::LBracket
            }
            b'\\' => {
                if self.is_valid_escape_at(0) {
                    self.consume_ident_like()
                } else {
                    // parse error
                    self.advance(1);
                    TokenType::Delim('\\')
                }
            }
            b']' => {
                self.advance(1);
                TokenType::RBracket
            }
            b'^' => {
                if self.byte_at(1) == Some(b'=') {
                    self.advance(2);
                    TokenType::PrefixMatch
                } else {
                    self.advance(1);
                    TokenType::Delim('^')
                }
            }
            b'u' | b'U' => {
                if self.byte_at(1) == Some(b'+')
                    && matches!(self.byte_at(2), Some(b) if b.is_ascii_hexdigit() || b == b'?')
                {
                    self.consume_unicode_range()
                } else {
                    self.consume_ident_like()
                }
            }
            b'{' => {
                self.advance(1);
                TokenType::LCurly
            }
            b'|' => match self.byte_at(1) {
                Some(b'|') => {
                    self.advance(2);
                    TokenType::Column
                }
                Some(b'=') => {
                    self.advance(2);
                    TokenType::DashMatch
                }
                _ => {
                    self.advance(1);
                    TokenType::Delim('|')
                }
            },
            b'}' => {
                self.advance(1);
                TokenType::RCurly
            }
            b'~' => {
                if self.byte_at(1) == Some(b'=') {
                    self.advance(2);
                    TokenType::IncludeMatch
                } else {
                    self.advance(1);
                    TokenType::Delim('~')
                }
            }
            b if is_name_start_byte(b) => self.consume_ident_like(),
            b if b < 0x80 => {
                self.advance(1);
                TokenType::Delim(b as char)
            }
            _ => {
                // unreachable in valid UTF-8; non-ASCII leads are name starts
                TokenType::Delim(self.consume_char())
            }
        };

        let token = Token::new(token_type, location);
        log::trace!("{:?}", token);
        Some(token)
    }

    fn consume_whitespace(&mut self) -> TokenType<'i> {
        let start = self.position;
        loop {
            match self.next_byte() {
                Some(b' ' | b'\t') => self.advance(1),
                Some(b'\n' | b'\r' | b'\x0C') => self.consume_newline(),
                _ => break,
            }
        }
        TokenType::Whitespace(&self.input[start..self.position])
    }

    /// 4.3.2. [Consume comments](https://www.w3.org/TR/css-syntax-3/#consume-comment)
    fn consume_comment(&mut self) -> TokenType<'i> {
        let start = self.position;
        self.advance(2); // consume '/*'
        loop {
            match self.next_byte() {
                Some(b'*') if self.byte_at(1) == Some(b'/') => {
                    self.advance(2);
                    break;
                }
                Some(b'\n' | b'\r' | b'\x0C') => self.consume_newline(),
                Some(b) if b < 0x80 => self.advance(1),
                Some(_) => {
                    self.consume_char();
                }
                None => break,
            }
        }
        let comment = &self.input[start..self.position];
        self.check_for_source_map(comment);
        TokenType::Comment(comment)
    }

    /// Records `sourceMappingURL` / `sourceURL` values from `/*# ... */` and
    /// `/*@ ... */` comments.
    fn check_for_source_map(&mut self, comment: &'i str) {
        let inner = comment.strip_prefix("/*").unwrap_or(comment);
        let inner = inner.strip_suffix("*/").unwrap_or(inner);
        let inner = inner.trim_start();
        let directive = match inner.strip_prefix('#').or_else(|| inner.strip_prefix('@')) {
            Some(d) => d.trim_start(),
            None => return,
        };
        if let Some(rest) = directive.strip_prefix("sourceMappingURL=") {
            self.source_map_url = rest.split_whitespace().next();
        } else if let Some(rest) = directive.strip_prefix("sourceURL=") {
            self.source_url = rest.split_whitespace().next();
        }
    }

    /// 4.3.5. [Consume a string token](https://www.w3.org/TR/css-syntax-3/#consume-string-token)
    ///
    /// Returns either a `<string-token>` or `<bad-string-token>`. A string
    /// terminated by a newline produces `<bad-string-token>` and leaves the
    /// newline unconsumed. A string terminated by the end of input queues an
    /// `EofInString` error token for the next call.
    fn consume_quoted_string(&mut self, single_quote: bool) -> TokenType<'i> {
        self.advance(1); // consume the opening quote
        let quote = if single_quote { b'\'' } else { b'"' };
        let start = self.position;

        loop {
            match self.next_byte() {
                None => {
                    self.pending_error_token = Some(PendingErrorToken::EofInString);
                    return TokenType::QuotedString(Lexeme::Borrowed(
                        &self.input[start..self.position],
                    ));
                }
                Some(b) if b == quote => {
                    let value = &self.input[start..self.position];
                    self.advance(1);
                    return TokenType::QuotedString(Lexeme::Borrowed(value));
                }
                Some(b'\n' | b'\r' | b'\x0C') => {
                    return TokenType::BadString(Lexeme::Borrowed(
                        &self.input[start..self.position],
                    ));
                }
                Some(b'\\' | b'\0') => break,
                Some(b) if b < 0x80 => self.advance(1),
                Some(_) => {
                    self.consume_char();
                }
            }
        }

        // Slow path: escapes or NULs force an owned buffer.
        let mut value = self.input[start..self.position].to_string();
        loop {
            match self.next_byte() {
                None => {
                    self.pending_error_token = Some(PendingErrorToken::EofInString);
                    return TokenType::QuotedString(Lexeme::Owned(value));
                }
                Some(b) if b == quote => {
                    self.advance(1);
                    return TokenType::QuotedString(Lexeme::Owned(value));
                }
                Some(b'\n' | b'\r' | b'\x0C') => {
                    return TokenType::BadString(Lexeme::Owned(value));
                }
                Some(b'\\') => match self.byte_at(1) {
                    Some(b'\n' | b'\r' | b'\x0C') => {
                        // escaped newline: the string continues
                        self.advance(1);
                        self.consume_newline();
                    }
                    None => self.advance(1),
                    Some(_) => {
                        self.advance(1);
                        value.push(self.consume_escaped_code_point());
                    }
                },
                Some(b'\0') => {
                    self.advance(1);
                    value.push('\u{FFFD}');
                }
                Some(b) if b < 0x80 => {
                    value.push(b as char);
                    self.advance(1);
                }
                Some(_) => value.push(self.consume_char()),
            }
        }
    }

    /// 4.3.7. [Consume an escaped code point](https://www.w3.org/TR/css-syntax-3/#consume-escaped-code-point)
    ///
    /// The backslash has already been consumed.
    fn consume_escaped_code_point(&mut self) -> char {
        match self.next_byte() {
            Some(b) if b.is_ascii_hexdigit() => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while digits < 6 {
                    match self.next_byte() {
                        Some(b) if b.is_ascii_hexdigit() => {
                            value = value * 16 + (b as char).to_digit(16).unwrap_or(0);
                            self.advance(1);
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                // a single whitespace after the escape belongs to it
                match self.next_byte() {
                    Some(b' ' | b'\t') => self.advance(1),
                    Some(b'\n' | b'\r' | b'\x0C') => self.consume_newline(),
                    _ => {}
                }
                if value == 0 || (0xD800..=0xDFFF).contains(&value) || value > 0x10_FFFF {
                    '\u{FFFD}'
                } else {
                    char::from_u32(value).unwrap_or('\u{FFFD}')
                }
            }
            None => '\u{FFFD}', // parse error
            Some(b'\0') => {
                self.advance(1);
                '\u{FFFD}'
            }
            Some(_) => self.consume_char(),
        }
    }

    /// 4.3.11. [Consume an ident sequence](https://www.w3.org/TR/css-syntax-3/#consume-name)
    ///
    /// The caller must ensure the stream starts with an ident sequence. The
    /// returned lexeme borrows from the input unless an escape or NUL forced
    /// an owned buffer.
    fn consume_name(&mut self) -> Lexeme<'i> {
        let start = self.position;
        loop {
            match self.next_byte() {
                Some(b) if is_name_byte(b) => self.advance(1),
                Some(b'\\' | b'\0') => break,
                Some(b) if b >= 0x80 => {
                    self.consume_char();
                }
                _ => return Lexeme::Borrowed(&self.input[start..self.position]),
            }
        }

        let mut value = self.input[start..self.position].to_string();
        loop {
            match self.next_byte() {
                Some(b) if is_name_byte(b) => {
                    value.push(b as char);
                    self.advance(1);
                }
                Some(b'\\') => {
                    if self.has_newline_at(1) {
                        break;
                    }
                    self.advance(1);
                    value.push(self.consume_escaped_code_point());
                }
                Some(b'\0') => {
                    self.advance(1);
                    value.push('\u{FFFD}');
                }
                Some(b) if b >= 0x80 => value.push(self.consume_char()),
                _ => break,
            }
        }
        Lexeme::Owned(value)
    }

    /// 4.3.3. [Consume a numeric token](https://www.w3.org/TR/css-syntax-3/#consume-numeric-token)
    ///
    /// Returns either a `<number-token>`, `<percentage-token>`, or `<dimension-token>`.
    fn consume_numeric(&mut self) -> TokenType<'i> {
        let start = self.position;
        let has_sign = matches!(self.next_byte(), Some(b'+' | b'-'));
        if has_sign {
            self.advance(1);
        }
        while matches!(self.next_byte(), Some(b) if b.is_ascii_digit()) {
            self.advance(1);
        }

        let mut is_integer = true;
        if self.next_byte() == Some(b'.')
            && matches!(self.byte_at(1), Some(b) if b.is_ascii_digit())
        {
            is_integer = false;
            self.advance(2);
            while matches!(self.next_byte(), Some(b) if b.is_ascii_digit()) {
                self.advance(1);
            }
        }

        if matches!(self.next_byte(), Some(b'e' | b'E')) {
            let digits_at = match self.byte_at(1) {
                Some(b'+' | b'-') => 2,
                _ => 1,
            };
            if matches!(self.byte_at(digits_at), Some(b) if b.is_ascii_digit()) {
                is_integer = false;
                self.advance(digits_at + 1);
                while matches!(self.next_byte(), Some(b) if b.is_ascii_digit()) {
                    self.advance(1);
                }
            }
        }

        let repr = &self.input[start..self.position];
        let value: Number = repr.parse().unwrap_or(0.0);
        // `as` saturates at the i32 range, which is what the An+B and
        // integer-expecting consumers want
        let int_value = if is_integer { Some(value as i32) } else { None };
        let numeric = NumericValue { has_sign, value, int_value, repr };

        if self.next_byte() == Some(b'%') {
            self.advance(1);
            return TokenType::Percentage(NumericValue {
                value: value / 100.0,
                ..numeric
            });
        }
        if self.would_start_ident_sequence(0) {
            let unit = self.consume_name();
            return TokenType::Dimension { value: numeric, unit };
        }
        TokenType::Number(numeric)
    }

    /// 4.3.4. [Consume an ident-like token](https://www.w3.org/TR/css-syntax-3/#consume-ident-like-token)
    ///
    /// Returns `<ident-token>`, `<function-token>`, `<url-token>`, or `<bad-url-token>`.
    fn consume_ident_like(&mut self) -> TokenType<'i> {
        let value = self.consume_name();
        if self.next_byte() == Some(b'(') {
            self.advance(1);
            if value.eq_ignore_ascii_case("url") {
                // `url(` followed (after optional whitespace) by a quote is a
                // plain function token; the whitespace is left in the stream
                let mut offset = 0;
                loop {
                    match self.byte_at(offset) {
                        Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0C') => offset += 1,
                        Some(b'"' | b'\'') => return self.function_token(value),
                        _ => return self.consume_unquoted_url(),
                    }
                }
            }
            return self.function_token(value);
        }
        TokenType::Ident(value)
    }

    fn function_token(&mut self, name: Lexeme<'i>) -> TokenType<'i> {
        if !self.substitution_functions.is_empty()
            && self.substitution_functions.iter().any(|f| name.eq_ignore_ascii_case(f))
        {
            self.substitution_seen = true;
        }
        TokenType::Function(name)
    }

    /// 4.3.6. [Consume a url token](https://www.w3.org/TR/css-syntax-3/#consume-a-url-token)
    ///
    /// Returns either a `<url-token>` or a `<bad-url-token>`. The end of
    /// input inside the url queues an `EofInUrl` error token.
    fn consume_unquoted_url(&mut self) -> TokenType<'i> {
        loop {
            match self.next_byte() {
                Some(b' ' | b'\t') => self.advance(1),
                Some(b'\n' | b'\r' | b'\x0C') => self.consume_newline(),
                _ => break,
            }
        }
        let start = self.position;

        loop {
            match self.next_byte() {
                None => {
                    self.pending_error_token = Some(PendingErrorToken::EofInUrl);
                    return TokenType::Url(Lexeme::Borrowed(&self.input[start..self.position]));
                }
                Some(b')') => {
                    let value = &self.input[start..self.position];
                    self.advance(1);
                    return TokenType::Url(Lexeme::Borrowed(value));
                }
                Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0C') => {
                    let value = Lexeme::Borrowed(&self.input[start..self.position]);
                    return self.consume_url_end(value);
                }
                Some(b'"' | b'\'' | b'(') => {
                    let value = Lexeme::Borrowed(&self.input[start..self.position]);
                    return self.consume_bad_url_remnants(value);
                }
                Some(b) if is_non_printable_byte(b) => {
                    let value = Lexeme::Borrowed(&self.input[start..self.position]);
                    return self.consume_bad_url_remnants(value);
                }
                Some(b'\\' | b'\0') => break,
                Some(b) if b < 0x80 => self.advance(1),
                Some(_) => {
                    self.consume_char();
                }
            }
        }

        // Slow path for escapes and NUL replacement.
        let mut value = self.input[start..self.position].to_string();
        loop {
            match self.next_byte() {
                None => {
                    self.pending_error_token = Some(PendingErrorToken::EofInUrl);
                    return TokenType::Url(Lexeme::Owned(value));
                }
                Some(b')') => {
                    self.advance(1);
                    return TokenType::Url(Lexeme::Owned(value));
                }
                Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0C') => {
                    return self.consume_url_end(Lexeme::Owned(value));
                }
                Some(b'"' | b'\'' | b'(') => {
                    return self.consume_bad_url_remnants(Lexeme::Owned(value));
                }
                Some(b) if is_non_printable_byte(b) => {
                    return self.consume_bad_url_remnants(Lexeme::Owned(value));
                }
                Some(b'\\') => {
                    if self.has_newline_at(1) {
                        return self.consume_bad_url_remnants(Lexeme::Owned(value));
                    }
                    self.advance(1);
                    value.push(self.consume_escaped_code_point());
                }
                Some(b'\0') => {
                    self.advance(1);
                    value.push('\u{FFFD}');
                }
                Some(b) if b < 0x80 => {
                    value.push(b as char);
                    self.advance(1);
                }
                Some(_) => value.push(self.consume_char()),
            }
        }
    }

    /// Trailing whitespace inside a url: only `)` or the end of input may follow
    fn consume_url_end(&mut self, value: Lexeme<'i>) -> TokenType<'i> {
        loop {
            match self.next_byte() {
                Some(b' ' | b'\t') => self.advance(1),
                Some(b'\n' | b'\r' | b'\x0C') => self.consume_newline(),
                Some(b')') => {
                    self.advance(1);
                    return TokenType::Url(value);
                }
                None => {
                    self.pending_error_token = Some(PendingErrorToken::EofInUrl);
                    return TokenType::Url(value);
                }
                Some(_) => return self.consume_bad_url_remnants(value),
            }
        }
    }

    /// 4.3.14. [Consume the remnants of a bad url](https://www.w3.org/TR/css-syntax-3/#consume-remnants-of-bad-url)
    ///
    /// Consumes enough of the input to reach a recovery point where normal
    /// tokenizing can resume.
    fn consume_bad_url_remnants(&mut self, value: Lexeme<'i>) -> TokenType<'i> {
        loop {
            match self.next_byte() {
                Some(b')') => {
                    self.advance(1);
                    break;
                }
                None => break,
                Some(b'\\') => {
                    self.advance(1);
                    if !self.has_newline_at(0) && self.next_byte().is_some() {
                        self.consume_escaped_code_point();
                    }
                }
                Some(b'\n' | b'\r' | b'\x0C') => self.consume_newline(),
                Some(b) if b < 0x80 => self.advance(1),
                Some(_) => {
                    self.consume_char();
                }
            }
        }
        TokenType::BadUrl(value)
    }

    /// 4.3.x. [Consume a unicode-range token](https://www.w3.org/TR/css-syntax-3/#urange-syntax)
    ///
    /// Only called when the next bytes are `u+` (or `U+`) followed by a hex
    /// digit or `?`.
    fn consume_unicode_range(&mut self) -> TokenType<'i> {
        self.advance(2); // consume 'u+'

        let mut first: u32 = 0;
        let mut digits = 0;
        let mut questions = 0;
        while digits + questions < 6 {
            match self.next_byte() {
                Some(b) if b.is_ascii_hexdigit() && questions == 0 => {
                    first = first * 16 + (b as char).to_digit(16).unwrap_or(0);
                    digits += 1;
                    self.advance(1);
                }
                Some(b'?') => {
                    questions += 1;
                    self.advance(1);
                }
                _ => break,
            }
        }

        if questions > 0 {
            // `?` wildcards: the range spans 0-filled to F-filled
            let mut start = first;
            let mut end = first;
            for _ in 0..questions {
                start *= 16;
                end = end * 16 + 0xF;
            }
            return TokenType::UnicodeRange { start, end };
        }

        let mut end = first;
        if self.next_byte() == Some(b'-')
            && matches!(self.byte_at(1), Some(b) if b.is_ascii_hexdigit())
        {
            self.advance(1);
            end = 0;
            digits = 0;
            while digits < 6 {
                match self.next_byte() {
                    Some(b) if b.is_ascii_hexdigit() => {
                        end = end * 16 + (b as char).to_digit(16).unwrap_or(0);
                        digits += 1;
                        self.advance(1);
                    }
                    _ => break,
                }
            }
        }
        TokenType::UnicodeRange { start: first, end }
    }
}

/// [ident code point](https://www.w3.org/TR/css-syntax-3/#ident-code-point), ASCII subset
fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// [ident-start code point](https://www.w3.org/TR/css-syntax-3/#ident-start-code-point)
///
/// NUL counts because preprocessing maps it to U+FFFD, which is non-ASCII.
fn is_name_start_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80 || b == b'\0'
}

/// [non-printable code point](https://www.w3.org/TR/css-syntax-3/#non-printable-code-point)
fn is_non_printable_byte(b: u8) -> bool {
    matches!(b, 0x01..=0x08 | 0x0B | 0x0E..=0x1F | 0x7F)
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_token_eq {
        ($tokenizer:expr, $expected:pat) => {
            let token = $tokenizer.next_token().map(|t| t.token_type);
            assert!(
                matches!(token, Some($expected)),
                "expected {}, got {:?}",
                stringify!($expected),
                token
            );
        };
    }

    fn all_tokens(input: &str) -> Vec<TokenType> {
        let mut tokenizer = Tokenizer::new(input);
        let mut tokens = Vec::new();
        while let Some(token) = tokenizer.next_token() {
            tokens.push(token.token_type);
        }
        tokens
    }

    #[test]
    fn parse_numbers() {
        let cases = vec![
            ("12", 12.0, Some(12), false),
            ("+34", 34.0, Some(34), true),
            ("-56", -56.0, Some(-56), true),
            ("7.8", 7.8, None, false),
            ("-9.10", -9.10, None, true),
            ("0.0001", 0.0001, None, false),
            (".5", 0.5, None, false),
            ("1e+1", 1e+1, None, false),
            ("1e1", 1e1, None, false),
            ("1e-1", 1e-1, None, false),
        ];

        for (input, value, int_value, has_sign) in cases {
            let mut tokenizer = Tokenizer::new(input);
            match tokenizer.next_token().map(|t| t.token_type) {
                Some(TokenType::Number(n)) => {
                    assert_eq!(n.value, value, "value of {input}");
                    assert_eq!(n.int_value, int_value, "int_value of {input}");
                    assert_eq!(n.has_sign, has_sign, "has_sign of {input}");
                    assert_eq!(n.repr, input, "repr of {input}");
                }
                other => panic!("expected number for {input}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_numeric_tokens() {
        let mut tokenizer = Tokenizer::new("1.1rem");
        assert_token_eq!(
            tokenizer,
            TokenType::Dimension { unit: Lexeme::Borrowed("rem"), .. }
        );

        let mut tokenizer = Tokenizer::new("100%");
        match tokenizer.next_token().map(|t| t.token_type) {
            Some(TokenType::Percentage(n)) => {
                assert_eq!(n.value, 1.0);
                assert_eq!(n.int_value, Some(100));
                assert_eq!(n.repr, "100");
            }
            other => panic!("expected percentage, got {other:?}"),
        }

        // whitespace between number and would-be unit keeps them apart
        assert_eq!(all_tokens("18 px").len(), 3);
    }

    #[test]
    fn parse_ident_tokens() {
        let cases = vec![
            ("-ident", "-ident"),
            ("ide  nt", "ide"),
            ("_123-ident", "_123-ident"),
            ("--custom", "--custom"),
            ("rgbâ", "rgbâ"),
        ];

        for (input, expected) in cases {
            let mut tokenizer = Tokenizer::new(input);
            match tokenizer.next_token().map(|t| t.token_type) {
                Some(TokenType::Ident(value)) => assert_eq!(value, expected),
                other => panic!("expected ident for {input}, got {other:?}"),
            }
        }
    }

    #[test]
    fn idents_borrow_unless_escaped() {
        let mut tokenizer = Tokenizer::new("border-color");
        match tokenizer.next_token().map(|t| t.token_type) {
            Some(TokenType::Ident(value)) => assert!(value.is_borrowed()),
            other => panic!("unexpected {other:?}"),
        }

        let mut tokenizer = Tokenizer::new("\\62 order");
        match tokenizer.next_token().map(|t| t.token_type) {
            Some(TokenType::Ident(value)) => {
                assert!(!value.is_borrowed());
                assert_eq!(value, "border");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_escaped_code_points() {
        let cases = vec![
            ("\\2A x", "*x"),
            ("\\005F x", "_x"),
            ("\\0 a", "\u{FFFD}a"),
            ("\\110000 a", "\u{FFFD}a"),
        ];
        for (input, expected) in cases {
            let mut tokenizer = Tokenizer::new(input);
            match tokenizer.next_token().map(|t| t.token_type) {
                Some(TokenType::Ident(value)) => assert_eq!(value, expected, "for {input}"),
                other => panic!("expected ident for {input}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_string_tokens() {
        let cases = vec![
            ("\"double quotes\"", "double quotes", false),
            ("'single quotes'", "single quotes", false),
            ("\"\"", "", false),
            ("'line\nnewline'", "line", true),
            ("\"me \\26  you\"", "me & you", false),
            ("\"a\\\nb\"", "ab", false),
        ];

        for (input, expected, bad) in cases {
            let mut tokenizer = Tokenizer::new(input);
            match tokenizer.next_token().map(|t| t.token_type) {
                Some(TokenType::QuotedString(value)) if !bad => {
                    assert_eq!(value, expected, "for {input}");
                }
                Some(TokenType::BadString(value)) if bad => {
                    assert_eq!(value, expected, "for {input}");
                }
                other => panic!("unexpected token for {input}: {other:?}"),
            }
        }
    }

    #[test]
    fn bad_string_does_not_consume_the_newline() {
        let mut tokenizer = Tokenizer::new("'unterminated\nx");
        assert_token_eq!(tokenizer, TokenType::BadString(_));
        // next token starts at the newline
        let token = tokenizer.next_token();
        match token {
            Some(t) => {
                assert_eq!(t.location.line, 1);
                assert!(matches!(t.token_type, TokenType::Whitespace("\n")));
            }
            None => panic!("expected whitespace"),
        }
        assert_token_eq!(tokenizer, TokenType::Ident(_));
    }

    #[test]
    fn eof_in_string_is_queued() {
        let mut tokenizer = Tokenizer::new("\"eof");
        assert_token_eq!(tokenizer, TokenType::QuotedString(_));
        assert_token_eq!(tokenizer, TokenType::EofInString);
        assert!(tokenizer.next_token().is_none());
    }

    #[test]
    fn parse_urls() {
        let cases = vec![
            ("url(https://nimbra.dev/)", "https://nimbra.dev/", false),
            ("url(  nimbra.dev   )", "nimbra.dev", false),
            ("url()", "", false),
            ("url(a'b)", "a", true),
            ("url(a b)", "a", true),
            ("url(a\u{0}b)", "a\u{FFFD}b", false),
        ];

        for (input, expected, bad) in cases {
            let mut tokenizer = Tokenizer::new(input);
            match tokenizer.next_token().map(|t| t.token_type) {
                Some(TokenType::Url(value)) if !bad => assert_eq!(value, expected, "for {input}"),
                Some(TokenType::BadUrl(value)) if bad => assert_eq!(value, expected, "for {input}"),
                other => panic!("unexpected token for {input}: {other:?}"),
            }
        }
    }

    #[test]
    fn bad_url_recovers_at_the_closing_parenthesis() {
        let tokens = all_tokens("url(a'b) x");
        assert!(matches!(tokens[0], TokenType::BadUrl(_)));
        assert!(matches!(tokens[1], TokenType::Whitespace(_)));
        assert!(matches!(tokens[2], TokenType::Ident(_)));
    }

    #[test]
    fn eof_in_url_is_queued() {
        let mut tokenizer = Tokenizer::new("url(eof");
        assert_token_eq!(tokenizer, TokenType::Url(_));
        assert_token_eq!(tokenizer, TokenType::EofInUrl);
        assert!(tokenizer.next_token().is_none());
    }

    #[test]
    fn url_with_quotes_is_a_function_token() {
        // the inner whitespace stays in the stream
        let tokens = all_tokens("url( \"x\" )");
        assert!(matches!(tokens[0], TokenType::Function(ref name) if *name == "url"));
        assert!(matches!(tokens[1], TokenType::Whitespace(_)));
        assert!(matches!(tokens[2], TokenType::QuotedString(ref v) if *v == "x"));
        assert!(matches!(tokens[3], TokenType::Whitespace(_)));
        assert!(matches!(tokens[4], TokenType::RParen));
    }

    #[test]
    fn parse_function_tokens() {
        let cases = vec![
            ("rotateX(", "rotateX"),
            ("--rgba(", "--rgba"),
            ("-\\26 -rgba(", "-&-rgba"),
            ("_rgba(", "_rgba"),
        ];
        for (input, expected) in cases {
            let mut tokenizer = Tokenizer::new(input);
            match tokenizer.next_token().map(|t| t.token_type) {
                Some(TokenType::Function(name)) => assert_eq!(name, expected, "for {input}"),
                other => panic!("expected function for {input}, got {other:?}"),
            }
        }

        // `rgba (` is an ident followed by whitespace and a parenthesis
        let tokens = all_tokens("rgba (");
        assert!(matches!(tokens[0], TokenType::Ident(_)));
        assert!(matches!(tokens[2], TokenType::LParen));
    }

    #[test]
    fn parse_hash_tokens() {
        let tokens = all_tokens("#header #-x #--y #0abc #\u{e9}t\u{e9} #");
        assert!(matches!(tokens[0], TokenType::IDHash(ref v) if *v == "header"));
        assert!(matches!(tokens[2], TokenType::IDHash(ref v) if *v == "-x"));
        assert!(matches!(tokens[4], TokenType::IDHash(ref v) if *v == "--y"));
        // digits cannot start an ident, so this is an unrestricted hash
        assert!(matches!(tokens[6], TokenType::Hash(ref v) if *v == "0abc"));
        assert!(matches!(tokens[8], TokenType::IDHash(ref v) if *v == "été"));
        assert!(matches!(tokens[10], TokenType::Delim('#')));
    }

    #[test]
    fn parse_at_keywords() {
        let tokens = all_tokens("@media @--x @0media");
        assert!(matches!(tokens[0], TokenType::AtKeyword(ref v) if *v == "media"));
        assert!(matches!(tokens[2], TokenType::AtKeyword(ref v) if *v == "--x"));
        assert!(matches!(tokens[4], TokenType::Delim('@')));
        assert!(matches!(tokens[5], TokenType::Dimension { .. }));
    }

    #[test]
    fn parse_match_tokens() {
        let tokens = all_tokens("~= |= ^= $= *= || |");
        assert!(matches!(tokens[0], TokenType::IncludeMatch));
        assert!(matches!(tokens[2], TokenType::DashMatch));
        assert!(matches!(tokens[4], TokenType::PrefixMatch));
        assert!(matches!(tokens[6], TokenType::SuffixMatch));
        assert!(matches!(tokens[8], TokenType::SubstringMatch));
        assert!(matches!(tokens[10], TokenType::Column));
        assert!(matches!(tokens[12], TokenType::Delim('|')));
    }

    #[test]
    fn parse_cdo_and_cdc() {
        let tokens = all_tokens("<!-- --> <");
        assert!(matches!(tokens[0], TokenType::Cdo));
        assert!(matches!(tokens[2], TokenType::Cdc));
        assert!(matches!(tokens[4], TokenType::Delim('<')));
    }

    #[test]
    fn parse_unicode_ranges() {
        let cases = vec![
            ("u+26", 0x26, 0x26),
            ("U+0-7F", 0x0, 0x7F),
            ("u+4??", 0x400, 0x4FF),
            ("u+??????", 0x0, 0xFF_FFFF),
        ];
        for (input, start, end) in cases {
            let mut tokenizer = Tokenizer::new(input);
            match tokenizer.next_token().map(|t| t.token_type) {
                Some(TokenType::UnicodeRange { start: s, end: e }) => {
                    assert_eq!((s, e), (start, end), "for {input}");
                }
                other => panic!("expected unicode-range for {input}, got {other:?}"),
            }
        }

        // `u` not followed by `+` hex is a plain ident
        let tokens = all_tokens("url");
        assert!(matches!(tokens[0], TokenType::Ident(_)));
    }

    #[test]
    fn parse_comments_and_source_maps() {
        let mut tokenizer = Tokenizer::new(
            "/* plain */ a /*# sourceMappingURL=out.css.map */ /*@ sourceURL=in.css */",
        );
        assert_token_eq!(tokenizer, TokenType::Comment("/* plain */"));
        assert!(tokenizer.current_source_map_url().is_none());
        while tokenizer.next_token().is_some() {}
        assert_eq!(tokenizer.current_source_map_url(), Some("out.css.map"));
        assert_eq!(tokenizer.current_source_url(), Some("in.css"));
    }

    #[test]
    fn unterminated_comment_runs_to_eof() {
        let tokens = all_tokens("/* ");
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0], TokenType::Comment("/* ")));
    }

    #[test]
    fn produce_valid_stream_of_css_tokens() {
        let mut tokenizer = Tokenizer::new(
            "#header .nav { font-size: 1.1rem; } @media screen (max-width: 200px) {}",
        );

        assert_token_eq!(tokenizer, TokenType::IDHash(_));
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::Delim('.'));
        assert_token_eq!(tokenizer, TokenType::Ident(_));
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::LCurly);
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::Ident(_));
        assert_token_eq!(tokenizer, TokenType::Colon);
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::Dimension { .. });
        assert_token_eq!(tokenizer, TokenType::Semicolon);
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::RCurly);
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::AtKeyword(_));
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::Ident(_));
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::LParen);
        assert_token_eq!(tokenizer, TokenType::Ident(_));
        assert_token_eq!(tokenizer, TokenType::Colon);
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::Dimension { .. });
        assert_token_eq!(tokenizer, TokenType::RParen);
        assert_token_eq!(tokenizer, TokenType::Whitespace(_));
        assert_token_eq!(tokenizer, TokenType::LCurly);
        assert_token_eq!(tokenizer, TokenType::RCurly);
        assert!(tokenizer.next_token().is_none());
    }

    #[test]
    fn tokens_round_trip_to_the_source() {
        // escape-free inputs must reproduce byte for byte
        let inputs = vec![
            "#header .nav { font-size: 1.1rem; }\n",
            "@media screen and (max-width: 20em) { a { color: #ff0000 } }",
            "a[href^=\"https://\"]::before { content: \"x\" }",
            "background: url(image.png) no-repeat, linear-gradient(90deg, red 0%, blue 100%);",
            "/* note */ .a > .b + .c ~ .d || .e",
            "width: calc(100% - 2px) !important;",
        ];
        for input in inputs {
            let rendered: String =
                all_tokens(input).iter().map(ToString::to_string).collect();
            assert_eq!(rendered, input);
        }
    }

    #[test]
    fn state_save_and_restore() {
        let mut tokenizer = Tokenizer::new("a b c");
        let start = tokenizer.state();
        let first = tokenizer.next_token();
        let _ = tokenizer.next_token();
        tokenizer.reset(&start);
        assert_eq!(tokenizer.next_token(), first);

        let pos = tokenizer.position();
        let _ = tokenizer.next_token();
        let _ = tokenizer.next_token();
        assert_eq!(tokenizer.slice_from(pos), " b");
    }

    #[test]
    fn substitution_function_tracking() {
        let mut tokenizer = Tokenizer::new("calc(var(--x))");
        tokenizer.track_substitution_functions(&["var", "env"]);
        while tokenizer.next_token().is_some() {}
        assert!(tokenizer.seen_substitution_function());
        // read-and-reset
        assert!(!tokenizer.seen_substitution_function());

        let mut tokenizer = Tokenizer::new("calc(1px)");
        tokenizer.track_substitution_functions(&["var", "env"]);
        while tokenizer.next_token().is_some() {}
        assert!(!tokenizer.seen_substitution_function());
    }

    /// Counts UTF-16 columns the slow way as an independent check of the
    /// virtual line-start arithmetic.
    fn expected_location(input: &str, byte_offset: usize) -> (u32, u32) {
        let mut line = 1u32;
        let mut column = 1u32;
        let mut consumed = 0usize;
        let mut chars = input.chars().peekable();
        while consumed < byte_offset {
            let c = match chars.next() {
                Some(c) => c,
                None => break,
            };
            consumed += c.len_utf8();
            if c == '\n' || c == '\x0C' {
                line += 1;
                column = 1;
            } else if c == '\r' {
                if chars.peek() == Some(&'\n') {
                    continue;
                }
                line += 1;
                column = 1;
            } else {
                column += c.len_utf16() as u32;
            }
        }
        (line, column)
    }

    #[test]
    fn utf16_column_accounting() {
        // ASCII, two-, three- and four-byte characters, and mixed newlines
        let inputs = vec![
            "ascii only here",
            "héllo wörld",
            "日本語 ident",
            "a😀b 😀😀 c",
            "mixed é日😀\nsecond é line\r\nthird 😀",
            "\u{10FFFF}\u{10FFFF} x",
        ];
        for input in inputs {
            let mut tokenizer = Tokenizer::new(input);
            loop {
                let location = tokenizer.current_location();
                let (line, column) = expected_location(input, location.offset);
                assert_eq!(
                    (location.line, location.column),
                    (line, column),
                    "location mismatch in {input:?} at byte {}",
                    location.offset
                );
                if tokenizer.next_token().is_none() {
                    break;
                }
            }
        }
    }

    #[test]
    fn line_numbers_across_newlines() {
        let mut tokenizer = Tokenizer::new("a\nb\r\nc\x0cd");
        let mut idents = Vec::new();
        while let Some(token) = tokenizer.next_token() {
            if let TokenType::Ident(v) = token.token_type {
                idents.push((v.into_string(), token.location.line, token.location.column));
            }
        }
        assert_eq!(
            idents,
            vec![
                ("a".to_string(), 1, 1),
                ("b".to_string(), 2, 1),
                ("c".to_string(), 3, 1),
                ("d".to_string(), 4, 1),
            ]
        );
    }
}
