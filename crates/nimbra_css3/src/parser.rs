//! The parser driver: a forward cursor over the token stream with block
//! awareness, a one-slot lookahead cache, stop-before delimiter sets and
//! transactional state save/restore.
//!
//! A `Parser` is a lightweight view over a `ParserInput`; nested-block and
//! delimited sub-parsing reuse the same tokenizer and input, so entering and
//! leaving scopes is cheap.

use crate::errors::{BasicParseError, BasicParseErrorKind, ParseError};
use crate::tokenizer::{
    Number, NumericValue, SourcePosition, Token, TokenType, Tokenizer, TokenizerState,
};
use nimbra_shared::lexeme::Lexeme;
use nimbra_shared::location::Location;
use smallvec::{smallvec, SmallVec};

/// A set of stop-before delimiters.
///
/// A cursor created with a delimiter set reports end-of-input instead of
/// producing a token that starts at one of these bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delimiters {
    bits: u8,
}

impl Delimiters {
    /// The empty delimiter set
    pub const NONE: Delimiters = Delimiters { bits: 0 };
    /// The delimiter `{`
    pub const CURLY_BRACKET_BLOCK: Delimiters = Delimiters { bits: 1 << 1 };
    /// The delimiter `;`
    pub const SEMICOLON: Delimiters = Delimiters { bits: 1 << 2 };
    /// The delimiter `!`
    pub const BANG: Delimiters = Delimiters { bits: 1 << 3 };
    /// The delimiter `,`
    pub const COMMA: Delimiters = Delimiters { bits: 1 << 4 };
    /// The delimiter `}`
    pub const CLOSE_CURLY_BRACKET: Delimiters = Delimiters { bits: 1 << 5 };
    /// The delimiter `]`
    pub const CLOSE_SQUARE_BRACKET: Delimiters = Delimiters { bits: 1 << 6 };
    /// The delimiter `)`
    pub const CLOSE_PARENTHESIS: Delimiters = Delimiters { bits: 1 << 7 };

    fn from_byte(byte: Option<u8>) -> Delimiters {
        match byte {
            Some(b'{') => Delimiters::CURLY_BRACKET_BLOCK,
            Some(b';') => Delimiters::SEMICOLON,
            Some(b'!') => Delimiters::BANG,
            Some(b',') => Delimiters::COMMA,
            Some(b'}') => Delimiters::CLOSE_CURLY_BRACKET,
            Some(b']') => Delimiters::CLOSE_SQUARE_BRACKET,
            Some(b')') => Delimiters::CLOSE_PARENTHESIS,
            _ => Delimiters::NONE,
        }
    }

    #[must_use]
    pub fn contains(self, other: Delimiters) -> bool {
        self.bits & other.bits != 0
    }
}

impl std::ops::BitOr for Delimiters {
    type Output = Delimiters;

    fn bitor(self, other: Delimiters) -> Delimiters {
        Delimiters {
            bits: self.bits | other.bits,
        }
    }
}

/// The kind of block a just-returned token opens
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockType {
    Parenthesis,
    SquareBracket,
    CurlyBracket,
}

impl BlockType {
    fn opening(token: &TokenType) -> Option<BlockType> {
        match token {
            TokenType::Function(_) | TokenType::LParen => Some(BlockType::Parenthesis),
            TokenType::LBracket => Some(BlockType::SquareBracket),
            TokenType::LCurly => Some(BlockType::CurlyBracket),
            _ => None,
        }
    }

    fn closing(token: &TokenType) -> Option<BlockType> {
        match token {
            TokenType::RParen => Some(BlockType::Parenthesis),
            TokenType::RBracket => Some(BlockType::SquareBracket),
            TokenType::RCurly => Some(BlockType::CurlyBracket),
            _ => None,
        }
    }

    fn closing_delimiter(self) -> Delimiters {
        match self {
            BlockType::Parenthesis => Delimiters::CLOSE_PARENTHESIS,
            BlockType::SquareBracket => Delimiters::CLOSE_SQUARE_BRACKET,
            BlockType::CurlyBracket => Delimiters::CLOSE_CURLY_BRACKET,
        }
    }
}

/// One-slot lookahead cache. A token fetched again from the same start
/// position replays the cached token and fast-forwards the tokenizer to the
/// cached end state without re-scanning.
struct CachedToken<'i> {
    token: Token<'i>,
    start_position: SourcePosition,
    end_state: TokenizerState,
}

/// The input for a parser: the tokenizer plus the lookahead cache. Create one
/// per source text, then any number of (nested) `Parser` cursors over it.
pub struct ParserInput<'i> {
    tokenizer: Tokenizer<'i>,
    cached_token: Option<CachedToken<'i>>,
    source_file: Option<String>,
}

impl<'i> ParserInput<'i> {
    pub fn new(input: &'i str) -> Self {
        Self {
            tokenizer: Tokenizer::new(input),
            cached_token: None,
            source_file: None,
        }
    }

    /// Like `new`, also recording the name of the source file for reporting
    pub fn new_with_source_file(input: &'i str, source_file: &str) -> Self {
        Self {
            tokenizer: Tokenizer::new(input),
            cached_token: None,
            source_file: Some(source_file.to_string()),
        }
    }
}

/// Captured parser state, restorable in O(1). Restoring rolls the cursor back
/// byte-for-byte, including the pending-block bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParserState {
    pub(crate) tokenizer: TokenizerState,
    pub(crate) at_start_of: Option<BlockType>,
}

impl ParserState {
    /// The byte position this state was captured at
    #[must_use]
    pub fn position(&self) -> SourcePosition {
        self.tokenizer.position()
    }

    /// The source location this state was captured at
    #[must_use]
    pub fn source_location(&self) -> Location {
        self.tokenizer.source_location()
    }
}

/// Scope handle for a manually entered nested block; used by the iterative
/// selector and calc machines, which cannot nest through closures.
#[derive(Debug)]
pub(crate) struct NestedBlockScope {
    outer_stop_before: Delimiters,
    block_type: BlockType,
}

/// A cursor over the token stream with block awareness
pub struct Parser<'i, 't> {
    input: &'t mut ParserInput<'i>,
    /// `Some(t)` when the previous token opened a block that has not been
    /// entered yet; the next fetch drains it unless the caller enters it
    at_start_of: Option<BlockType>,
    /// Delimiters this cursor stops before
    stop_before: Delimiters,
}

impl<'i, 't> Parser<'i, 't> {
    pub fn new(input: &'t mut ParserInput<'i>) -> Self {
        Self {
            input,
            at_start_of: None,
            stop_before: Delimiters::NONE,
        }
    }

    /// The name of the source file, when one was given at construction
    #[must_use]
    pub fn source_file(&self) -> Option<&str> {
        self.input.source_file.as_deref()
    }

    /// The `sourceMappingURL` seen in the input so far, if any
    #[must_use]
    pub fn current_source_map_url(&self) -> Option<&'i str> {
        self.input.tokenizer.current_source_map_url()
    }

    /// The `sourceURL` seen in the input so far, if any
    #[must_use]
    pub fn current_source_url(&self) -> Option<&'i str> {
        self.input.tokenizer.current_source_url()
    }

    /// Arms the tokenizer with substitution function names (e.g. `var`, `env`)
    pub fn track_substitution_functions(&mut self, names: &[&str]) {
        self.input.tokenizer.track_substitution_functions(names);
    }

    /// Reads and resets the substitution-function flag
    pub fn seen_substitution_function(&mut self) -> bool {
        self.input.tokenizer.seen_substitution_function()
    }

    /// The location the next token would be reported at
    #[must_use]
    pub fn current_source_location(&self) -> Location {
        self.input.tokenizer.current_location()
    }

    /// The current byte position, usable with [`Parser::slice`]
    #[must_use]
    pub fn position(&self) -> SourcePosition {
        self.input.tokenizer.position()
    }

    /// A borrowed slice of the source between two captured positions
    #[must_use]
    pub fn slice(&self, start: SourcePosition, end: SourcePosition) -> &'i str {
        self.input.tokenizer.slice(start, end)
    }

    /// A borrowed slice from a captured position to the current one
    #[must_use]
    pub fn slice_from(&self, start: SourcePosition) -> &'i str {
        self.input.tokenizer.slice_from(start)
    }

    /// Captures the full parser state for later restoration
    #[must_use]
    pub fn state(&self) -> ParserState {
        ParserState {
            tokenizer: self.input.tokenizer.state(),
            at_start_of: self.at_start_of,
        }
    }

    /// Restores a previously captured state
    pub fn reset(&mut self, state: &ParserState) {
        self.input.tokenizer.reset(&state.tokenizer);
        self.at_start_of = state.at_start_of;
    }

    /// An end-of-input error at the current location
    #[must_use]
    pub fn end_of_input_error(&self) -> BasicParseError<'i> {
        BasicParseError {
            kind: BasicParseErrorKind::EndOfInput,
            location: self.current_source_location(),
        }
    }

    /// A custom error at the current location
    pub fn new_custom_error<E, E2>(&self, error: E) -> ParseError<'i, E2>
    where
        E2: From<E>,
    {
        ParseError {
            kind: crate::errors::ParseErrorKind::Custom(error.into()),
            location: self.current_source_location(),
        }
    }

    /// Returns true when no token remains (whitespace and comments ignored)
    pub fn is_exhausted(&mut self) -> bool {
        self.expect_exhausted().is_ok()
    }

    /// Errs with the unexpected token when one remains
    pub fn expect_exhausted(&mut self) -> Result<(), BasicParseError<'i>> {
        let state = self.state();
        let result = match self.next() {
            Err(_) => Ok(()),
            Ok(token) => Err(BasicParseError::unexpected_token(token)),
        };
        self.reset(&state);
        result
    }

    /// Consumes and discards whitespace and comments
    pub fn skip_whitespace(&mut self) {
        loop {
            let state = self.state();
            match self.next_including_whitespace_and_comments() {
                Ok(token) if token.is_whitespace() || token.is_comment() => {}
                _ => {
                    self.reset(&state);
                    return;
                }
            }
        }
    }

    /// The next token, skipping whitespace and comments
    pub fn next(&mut self) -> Result<Token<'i>, BasicParseError<'i>> {
        loop {
            let token = self.next_including_whitespace_and_comments()?;
            if !token.is_whitespace() && !token.is_comment() {
                return Ok(token);
            }
        }
    }

    /// The next token, skipping comments only
    pub fn next_including_whitespace(&mut self) -> Result<Token<'i>, BasicParseError<'i>> {
        loop {
            let token = self.next_including_whitespace_and_comments()?;
            if !token.is_comment() {
                return Ok(token);
            }
        }
    }

    /// The next token, including whitespace and comments
    pub fn next_including_whitespace_and_comments(
        &mut self,
    ) -> Result<Token<'i>, BasicParseError<'i>> {
        // A block opener the caller never entered is drained here, so the
        // cursor resumes right after the matching closer.
        if let Some(block_type) = self.at_start_of.take() {
            consume_until_end_of_block(block_type, &mut self.input.tokenizer);
        }

        let byte = self.input.tokenizer.next_byte();
        if self.stop_before.contains(Delimiters::from_byte(byte)) {
            return Err(self.end_of_input_error());
        }

        let token_start_position = self.input.tokenizer.position();
        let mut replayed = None;
        if let Some(cached) = &self.input.cached_token {
            if cached.start_position == token_start_position {
                replayed = Some((cached.token.clone(), cached.end_state));
            }
        }
        let token = match replayed {
            Some((token, end_state)) => {
                self.input.tokenizer.reset(&end_state);
                token
            }
            None => {
                let token = match self.input.tokenizer.next_token() {
                    Some(token) => token,
                    None => return Err(self.end_of_input_error()),
                };
                self.input.cached_token = Some(CachedToken {
                    token: token.clone(),
                    start_position: token_start_position,
                    end_state: self.input.tokenizer.state(),
                });
                token
            }
        };

        if let Some(block_type) = BlockType::opening(&token.token_type) {
            self.at_start_of = Some(block_type);
        }
        Ok(token)
    }

    /// Runs `thing` and restores the state byte-for-byte when it fails. This
    /// is the only backtracking primitive.
    pub fn try_parse<F, T, E>(&mut self, thing: F) -> Result<T, E>
    where
        F: FnOnce(&mut Parser<'i, 't>) -> Result<T, E>,
    {
        let start = self.state();
        let result = thing(self);
        if result.is_err() {
            self.reset(&start);
        }
        result
    }

    /// Runs `parse` and then asserts the input is exhausted
    pub fn parse_entirely<F, T, E>(&mut self, parse: F) -> Result<T, ParseError<'i, E>>
    where
        F: FnOnce(&mut Parser<'i, 't>) -> Result<T, ParseError<'i, E>>,
    {
        let result = parse(self)?;
        self.expect_exhausted()?;
        Ok(result)
    }

    /// Parses a comma-separated list with `parse_one`, stopping each entry
    /// before the comma at the current nesting depth
    pub fn parse_comma_separated<F, T, E>(
        &mut self,
        mut parse_one: F,
    ) -> Result<Vec<T>, ParseError<'i, E>>
    where
        F: FnMut(&mut Parser<'i, '_>) -> Result<T, ParseError<'i, E>>,
    {
        let mut values = Vec::with_capacity(1);
        loop {
            self.skip_whitespace();
            values.push(self.parse_until_before(Delimiters::COMMA, &mut parse_one)?);
            match self.next() {
                Err(_) => return Ok(values),
                Ok(token) if token.token_type == TokenType::Comma => {}
                // parse_until_before drained everything up to a comma or the
                // end, so nothing else can be here
                Ok(_) => return Ok(values),
            }
        }
    }

    /// Takes the pending block opener; the caller must balance this with
    /// [`Parser::close_nested_block`]. Calling it without a pending opener is
    /// a programmer error.
    pub(crate) fn open_nested_block(&mut self) -> NestedBlockScope {
        let block_type = match self.at_start_of.take() {
            Some(block_type) => block_type,
            None => unreachable!("open_nested_block called without a just-opened block"),
        };
        let scope = NestedBlockScope {
            outer_stop_before: self.stop_before,
            block_type,
        };
        self.stop_before = block_type.closing_delimiter();
        scope
    }

    /// Drains the rest of the block (balancing inner blocks) up to and
    /// including the matching closer, then restores the outer stop set
    pub(crate) fn close_nested_block(&mut self, scope: NestedBlockScope) {
        if let Some(block_type) = self.at_start_of.take() {
            consume_until_end_of_block(block_type, &mut self.input.tokenizer);
        }
        consume_until_end_of_block(scope.block_type, &mut self.input.tokenizer);
        self.stop_before = scope.outer_stop_before;
    }

    /// Parses the interior of a just-opened block (the previous token must
    /// have been a function or an opening bracket). `parse` runs against a
    /// cursor that stops before the matching closer; afterwards the cursor
    /// resumes right after the closer.
    pub fn parse_nested_block<F, T, E>(&mut self, parse: F) -> Result<T, ParseError<'i, E>>
    where
        F: FnOnce(&mut Parser<'i, 't>) -> Result<T, ParseError<'i, E>>,
    {
        let scope = self.open_nested_block();
        let result = self.parse_entirely(parse);
        self.close_nested_block(scope);
        result
    }

    /// Runs `parse` against a cursor that stops before the given delimiters
    /// (in addition to the current ones), then skips to the delimiter
    pub fn parse_until_before<F, T, E>(
        &mut self,
        delimiters: Delimiters,
        parse: F,
    ) -> Result<T, ParseError<'i, E>>
    where
        F: FnOnce(&mut Parser<'i, '_>) -> Result<T, ParseError<'i, E>>,
    {
        let combined = self.stop_before | delimiters;
        let result = {
            let mut delimited = Parser {
                input: &mut *self.input,
                at_start_of: self.at_start_of.take(),
                stop_before: combined,
            };
            let result = delimited.parse_entirely(parse);
            if let Some(block_type) = delimited.at_start_of.take() {
                consume_until_end_of_block(block_type, &mut delimited.input.tokenizer);
            }
            result
        };

        // Skip whatever the sub-parser left behind, balancing nested blocks,
        // so the cursor sits right before the delimiter (or at the end).
        loop {
            if combined.contains(Delimiters::from_byte(self.input.tokenizer.next_byte())) {
                break;
            }
            match self.input.tokenizer.next_token() {
                Some(token) => {
                    if let Some(block_type) = BlockType::opening(&token.token_type) {
                        consume_until_end_of_block(block_type, &mut self.input.tokenizer);
                    }
                }
                None => break,
            }
        }
        result
    }

    /// Like [`Parser::parse_until_before`], but also consumes the delimiter
    /// (unless it is one of the cursor's own stop delimiters)
    pub fn parse_until_after<F, T, E>(
        &mut self,
        delimiters: Delimiters,
        parse: F,
    ) -> Result<T, ParseError<'i, E>>
    where
        F: FnOnce(&mut Parser<'i, '_>) -> Result<T, ParseError<'i, E>>,
    {
        let result = self.parse_until_before(delimiters, parse);
        let byte = self.input.tokenizer.next_byte();
        if byte.is_some() && !self.stop_before.contains(Delimiters::from_byte(byte)) {
            if let Some(token) = self.input.tokenizer.next_token() {
                if let Some(block_type) = BlockType::opening(&token.token_type) {
                    consume_until_end_of_block(block_type, &mut self.input.tokenizer);
                }
            }
        }
        result
    }

    /// Errs unless the remaining input (nested blocks included) is free of
    /// parse-error tokens
    pub fn expect_no_error_token(&mut self) -> Result<(), BasicParseError<'i>> {
        let mut scopes: SmallVec<[NestedBlockScope; 8]> = SmallVec::new();
        loop {
            match self.next_including_whitespace_and_comments() {
                Ok(token) => {
                    if token.is_parse_error() {
                        let error = BasicParseError::unexpected_token(token);
                        while let Some(scope) = scopes.pop() {
                            self.close_nested_block(scope);
                        }
                        return Err(error);
                    }
                    if self.at_start_of.is_some() {
                        scopes.push(self.open_nested_block());
                    }
                }
                Err(_) => match scopes.pop() {
                    Some(scope) => self.close_nested_block(scope),
                    None => return Ok(()),
                },
            }
        }
    }

    fn unexpected<T>(token: Token<'i>) -> Result<T, BasicParseError<'i>> {
        Err(BasicParseError::unexpected_token(token))
    }

    /// Expects an `<ident-token>` and returns its value
    pub fn expect_ident(&mut self) -> Result<Lexeme<'i>, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Ident(value) => Ok(value),
            _ => Self::unexpected(token),
        }
    }

    /// Expects an `<ident-token>` with the given value, ASCII case-insensitive
    pub fn expect_ident_matching(&mut self, expected: &str) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        match &token.token_type {
            TokenType::Ident(value) if value.eq_ignore_ascii_case(expected) => Ok(()),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<string-token>` and returns its unescaped value
    pub fn expect_string(&mut self) -> Result<Lexeme<'i>, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::QuotedString(value) => Ok(value),
            _ => Self::unexpected(token),
        }
    }

    /// Expects an ident or a string and returns the value
    pub fn expect_ident_or_string(&mut self) -> Result<Lexeme<'i>, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Ident(value) | TokenType::QuotedString(value) => Ok(value),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<url-token>`, or a `url(...)` function containing a string
    pub fn expect_url(&mut self) -> Result<Lexeme<'i>, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Url(value) => Ok(value),
            TokenType::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                let scope = self.open_nested_block();
                let result = match self.expect_string() {
                    Ok(value) => self.expect_exhausted().map(|()| value),
                    Err(e) => Err(e),
                };
                self.close_nested_block(scope);
                result
            }
            _ => Self::unexpected(token),
        }
    }

    /// Expects a url or a string and returns the value
    pub fn expect_url_or_string(&mut self) -> Result<Lexeme<'i>, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Url(value) | TokenType::QuotedString(value) => Ok(value),
            TokenType::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                let scope = self.open_nested_block();
                let result = match self.expect_string() {
                    Ok(value) => self.expect_exhausted().map(|()| value),
                    Err(e) => Err(e),
                };
                self.close_nested_block(scope);
                result
            }
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<number-token>` and returns its value
    pub fn expect_number(&mut self) -> Result<Number, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Number(value) => Ok(value.value),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<number-token>` with an integer value
    pub fn expect_integer(&mut self) -> Result<i32, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Number(NumericValue {
                int_value: Some(int_value),
                ..
            }) => Ok(int_value),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<percentage-token>` and returns its unit value (1.0 = 100%)
    pub fn expect_percentage(&mut self) -> Result<Number, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Percentage(value) => Ok(value.value),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<delim-token>` with the given value
    pub fn expect_delim(&mut self, delim: char) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        if token.is_delim(delim) {
            Ok(())
        } else {
            Self::unexpected(token)
        }
    }

    /// Expects a `<comma-token>`
    pub fn expect_comma(&mut self) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Comma => Ok(()),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<colon-token>`
    pub fn expect_colon(&mut self) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Colon => Ok(()),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<semicolon-token>`
    pub fn expect_semicolon(&mut self) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Semicolon => Ok(()),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<function-token>` and returns its name
    pub fn expect_function(&mut self) -> Result<Lexeme<'i>, BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::Function(name) => Ok(name),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `<function-token>` with the given name, ASCII case-insensitive
    pub fn expect_function_matching(&mut self, expected: &str) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        match &token.token_type {
            TokenType::Function(name) if name.eq_ignore_ascii_case(expected) => Ok(()),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `(` opening a parenthesis block
    pub fn expect_parenthesis_block(&mut self) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::LParen => Ok(()),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `[` opening a square bracket block
    pub fn expect_square_bracket_block(&mut self) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::LBracket => Ok(()),
            _ => Self::unexpected(token),
        }
    }

    /// Expects a `{` opening a curly bracket block
    pub fn expect_curly_bracket_block(&mut self) -> Result<(), BasicParseError<'i>> {
        let token = self.next()?;
        match token.token_type {
            TokenType::LCurly => Ok(()),
            _ => Self::unexpected(token),
        }
    }
}

/// Consumes tokens up to and including the closer matching `block_type`,
/// balancing any blocks opened in between
fn consume_until_end_of_block(block_type: BlockType, tokenizer: &mut Tokenizer) {
    let mut stack: SmallVec<[BlockType; 16]> = smallvec![block_type];
    while let Some(token) = tokenizer.next_token() {
        if let Some(closing) = BlockType::closing(&token.token_type) {
            if stack.last() == Some(&closing) {
                stack.pop();
                if stack.is_empty() {
                    return;
                }
            }
        }
        if let Some(opening) = BlockType::opening(&token.token_type) {
            stack.push(opening);
        }
    }
}
