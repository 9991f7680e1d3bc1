//! Stack-based recognizer for the Selectors Level 4 grammar.
//!
//! Functional pseudo-classes nest arbitrarily (`:is(:not(:where(.x)))`), so
//! instead of recursing this parser keeps an explicit stack of frames, one per
//! selector list under construction. A frame owns the partial components of
//! the current selector, the selectors collected so far, the contextual
//! validity flags and the nested-block scope to close when the frame pops.

use crate::errors::{BasicParseError, ParseError};
use crate::parser::{NestedBlockScope, Parser};
use crate::selector::anplusb::parse_anplusb;
use crate::selector::{
    AnPlusB, AttributeSelector, CaseFlag, Combinator, Component, MatcherType, NamespacePrefix,
    PseudoClass, PseudoElement, Selector, SelectorList,
};
use crate::tokenizer::{Token, TokenType};
use cow_utils::CowUtils;
use nimbra_shared::lexeme::Lexeme;
use thiserror::Error;

/// Errors specific to the selector grammar
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SelectorParseErrorKind<'i> {
    #[error("expected a selector")]
    EmptySelector,
    #[error("expected a compound selector around the combinator")]
    DanglingCombinator,
    #[error("a type selector must come first in a compound")]
    UnexpectedTypeSelector,
    #[error("no simple selector may follow a pseudo-element")]
    InvalidStateAfterPseudoElement,
    #[error("this pseudo-class may not follow a pseudo-element")]
    InvalidPseudoClassAfterPseudoElement,
    #[error("only a limited set of pseudo-elements may follow ::slotted()")]
    InvalidPseudoElementAfterSlotted,
    #[error(":has() cannot be nested inside :has()")]
    NestedHas,
    #[error("pseudo-elements are not allowed inside :has()")]
    PseudoElementInsideHas,
    #[error("::slotted() expects a single compound selector")]
    InvalidSlottedArgument,
    #[error(":host() expects a single compound selector")]
    InvalidHostArgument,
    #[error("unknown attribute selector flag: {0}")]
    UnknownAttributeFlag(Lexeme<'i>),
}

pub type SelectorParseError<'i> = ParseError<'i, SelectorParseErrorKind<'i>>;

impl<'i> SelectorList<'i> {
    /// Parses a comma-separated selector list, surfacing the first error
    pub fn parse<'t>(parser: &mut Parser<'i, 't>) -> Result<Self, SelectorParseError<'i>> {
        parse_selector_list(parser, false, false)
    }

    /// Parses a forgiving selector list: invalid selectors are dropped
    /// silently instead of failing the whole list
    pub fn parse_forgiving<'t>(parser: &mut Parser<'i, 't>) -> Result<Self, SelectorParseError<'i>> {
        parse_selector_list(parser, true, false)
    }

    /// Parses a relative selector list (entries may start with a combinator),
    /// as inside `:has()`
    pub fn parse_relative<'t>(parser: &mut Parser<'i, 't>) -> Result<Self, SelectorParseError<'i>> {
        parse_selector_list(parser, false, true)
    }
}

impl<'i> Selector<'i> {
    /// Parses a single (complex) selector
    pub fn parse<'t>(parser: &mut Parser<'i, 't>) -> Result<Self, SelectorParseError<'i>> {
        let location = parser.current_source_location();
        let mut list = parse_selector_list(parser, false, false)?;
        if list.selectors.len() == 1 {
            match list.selectors.pop() {
                Some(selector) => Ok(selector),
                None => unreachable!(),
            }
        } else {
            Err(ParseError {
                kind: crate::errors::ParseErrorKind::Custom(SelectorParseErrorKind::EmptySelector),
                location,
            })
        }
    }
}

/// What a finished frame's selector list turns into
enum FrameKind<'i> {
    TopLevel,
    Not,
    Is,
    Any { name: Lexeme<'i> },
    Where,
    Has,
    Host,
    HostContext,
    Current,
    NthOf { nth: AnPlusB, last: bool },
    Slotted,
}

struct Frame<'i> {
    kind: FrameKind<'i>,
    scope: Option<NestedBlockScope>,
    selectors: Vec<Selector<'i>>,
    components: Vec<Component<'i>>,
    forgiving: bool,
    allow_relative: bool,
    inside_has: bool,
    in_compound: bool,
    seen_whitespace: bool,
    after_pseudo_element: bool,
    after_webkit_scrollbar: bool,
    after_view_transition: bool,
    after_slotted: bool,
    after_part: bool,
}

impl<'i> Frame<'i> {
    fn new(
        kind: FrameKind<'i>,
        scope: Option<NestedBlockScope>,
        forgiving: bool,
        allow_relative: bool,
        inside_has: bool,
    ) -> Self {
        Frame {
            kind,
            scope,
            selectors: Vec::new(),
            components: Vec::new(),
            forgiving,
            allow_relative,
            inside_has,
            in_compound: false,
            seen_whitespace: false,
            after_pseudo_element: false,
            after_webkit_scrollbar: false,
            after_view_transition: false,
            after_slotted: false,
            after_part: false,
        }
    }

    /// Resets the per-selector state (after a comma or during recovery)
    fn reset_selector_state(&mut self) {
        self.components.clear();
        self.in_compound = false;
        self.seen_whitespace = false;
        self.after_pseudo_element = false;
        self.after_webkit_scrollbar = false;
        self.after_view_transition = false;
        self.after_slotted = false;
        self.after_part = false;
    }
}

fn top<'a, 'i>(stack: &'a mut Vec<Frame<'i>>) -> &'a mut Frame<'i> {
    match stack.last_mut() {
        Some(frame) => frame,
        None => unreachable!("the selector frame stack cannot be empty"),
    }
}

fn unexpected<'i, E>(token: Token<'i>) -> ParseError<'i, E> {
    BasicParseError::unexpected_token(token).into()
}

/// Scrollbar state pseudo-classes, valid after the WebKit scrollbar
/// pseudo-elements
const SCROLLBAR_STATE_PSEUDO_CLASSES: &[&str] = &[
    "enabled",
    "disabled",
    "hover",
    "active",
    "horizontal",
    "vertical",
    "decrement",
    "increment",
    "start",
    "end",
    "double-button",
    "single-button",
    "no-button",
    "corner-present",
    "window-inactive",
];

/// Pseudo-elements that may still follow `::slotted()`
const SLOTTED_TAIL_PSEUDO_ELEMENTS: &[&str] =
    &["before", "after", "marker", "placeholder", "file-selector-button"];

/// The iterative selector-list parser shared by all entry points
pub(crate) fn parse_selector_list<'i, 't>(
    parser: &mut Parser<'i, 't>,
    forgiving: bool,
    relative: bool,
) -> Result<SelectorList<'i>, SelectorParseError<'i>> {
    log::trace!("parse_selector_list");

    let mut stack: Vec<Frame<'i>> = vec![Frame::new(
        FrameKind::TopLevel,
        None,
        forgiving,
        relative,
        false,
    )];

    loop {
        match step(parser, &mut stack) {
            Ok(Some(list)) => return Ok(list),
            Ok(None) => {}
            Err(error) => recover(parser, &mut stack, error)?,
        }
    }
}

/// Handles one token (or the end of the current frame's region)
fn step<'i>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<Frame<'i>>,
) -> Result<Option<SelectorList<'i>>, SelectorParseError<'i>> {
    let token = match parser.next_including_whitespace() {
        Ok(token) => token,
        Err(_) => return finish_frame(parser, stack),
    };

    match token.token_type {
        TokenType::Whitespace(_) => {
            top(stack).seen_whitespace = true;
            Ok(None)
        }
        TokenType::Comma => {
            let frame = top(stack);
            if frame.components.is_empty() {
                if frame.forgiving {
                    // an empty entry is silently dropped in forgiving lists
                    frame.reset_selector_state();
                    Ok(None)
                } else {
                    Err(custom_error(parser, SelectorParseErrorKind::EmptySelector))
                }
            } else {
                finish_selector(parser, frame)?;
                Ok(None)
            }
        }
        TokenType::Delim('>') => {
            let combinator = parse_child_or_deep_descendant(parser)?;
            push_combinator(parser, top(stack), combinator)?;
            Ok(None)
        }
        TokenType::Delim('+') => {
            push_combinator(parser, top(stack), Combinator::NextSibling)?;
            Ok(None)
        }
        TokenType::Delim('~') => {
            push_combinator(parser, top(stack), Combinator::LaterSibling)?;
            Ok(None)
        }
        TokenType::Delim('/') => {
            // the legacy `/deep/` combinator
            let token = parser.next_including_whitespace()?;
            let is_deep =
                matches!(&token.token_type, TokenType::Ident(name) if name.eq_ignore_ascii_case("deep"));
            if !is_deep {
                return Err(unexpected(token));
            }
            let token = parser.next_including_whitespace()?;
            if !token.is_delim('/') {
                return Err(unexpected(token));
            }
            push_combinator(parser, top(stack), Combinator::Deep)?;
            Ok(None)
        }
        TokenType::Ident(name) => {
            handle_type_selector(parser, top(stack), Some(name))?;
            Ok(None)
        }
        TokenType::Delim('*') => {
            handle_type_selector(parser, top(stack), None)?;
            Ok(None)
        }
        TokenType::Delim('|') => {
            // `|type`: an explicit empty namespace
            begin_compound_start(parser, top(stack))?;
            let token = parser.next_including_whitespace()?;
            let frame = top(stack);
            frame.components.push(Component::Namespace(NamespacePrefix::None));
            match token.token_type {
                TokenType::Ident(local) => frame.components.push(Component::LocalName(local)),
                TokenType::Delim('*') => frame.components.push(Component::Universal),
                _ => return Err(unexpected(token)),
            }
            frame.in_compound = true;
            Ok(None)
        }
        TokenType::IDHash(id) => {
            begin_simple_selector(parser, top(stack))?;
            let frame = top(stack);
            frame.components.push(Component::Id(id));
            frame.in_compound = true;
            Ok(None)
        }
        TokenType::Delim('.') => {
            begin_simple_selector(parser, top(stack))?;
            let token = parser.next_including_whitespace()?;
            match token.token_type {
                TokenType::Ident(name) => {
                    let frame = top(stack);
                    frame.components.push(Component::Class(name));
                    frame.in_compound = true;
                    Ok(None)
                }
                _ => Err(unexpected(token)),
            }
        }
        TokenType::LBracket => {
            begin_simple_selector(parser, top(stack))?;
            let attribute = parse_attribute_selector(parser)?;
            let frame = top(stack);
            frame.components.push(Component::Attribute(Box::new(attribute)));
            frame.in_compound = true;
            Ok(None)
        }
        TokenType::Colon => {
            flush_whitespace(parser, top(stack))?;
            handle_pseudo(parser, stack)?;
            Ok(None)
        }
        TokenType::Delim('&') => {
            begin_simple_selector(parser, top(stack))?;
            let frame = top(stack);
            frame.components.push(Component::Nesting);
            frame.in_compound = true;
            Ok(None)
        }
        _ => Err(unexpected(token)),
    }
}

/// `>` is child; `>>>` is the legacy deep-descendant
fn parse_child_or_deep_descendant<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<Combinator, SelectorParseError<'i>> {
    let state = parser.state();
    match parser.next_including_whitespace() {
        Ok(token) if token.is_delim('>') => {
            let token = parser.next_including_whitespace()?;
            if token.is_delim('>') {
                Ok(Combinator::DeepDescendant)
            } else {
                Err(unexpected(token))
            }
        }
        _ => {
            parser.reset(&state);
            Ok(Combinator::Child)
        }
    }
}

fn custom_error<'i>(
    parser: &Parser<'i, '_>,
    kind: SelectorParseErrorKind<'i>,
) -> SelectorParseError<'i> {
    ParseError {
        kind: crate::errors::ParseErrorKind::Custom(kind),
        location: parser.current_source_location(),
    }
}

/// Turns pending whitespace into a descendant combinator when a compound
/// precedes it
fn flush_whitespace<'i>(
    parser: &Parser<'i, '_>,
    frame: &mut Frame<'i>,
) -> Result<(), SelectorParseError<'i>> {
    if frame.seen_whitespace {
        frame.seen_whitespace = false;
        if frame.in_compound {
            if frame.after_pseudo_element {
                return Err(custom_error(
                    parser,
                    SelectorParseErrorKind::InvalidStateAfterPseudoElement,
                ));
            }
            frame.components.push(Component::Combinator(Combinator::Descendant));
            frame.in_compound = false;
        }
    }
    Ok(())
}

fn push_combinator<'i>(
    parser: &Parser<'i, '_>,
    frame: &mut Frame<'i>,
    combinator: Combinator,
) -> Result<(), SelectorParseError<'i>> {
    if frame.after_pseudo_element {
        return Err(custom_error(
            parser,
            SelectorParseErrorKind::InvalidStateAfterPseudoElement,
        ));
    }
    frame.seen_whitespace = false;
    if frame.components.is_empty() {
        if !frame.allow_relative {
            return Err(custom_error(parser, SelectorParseErrorKind::DanglingCombinator));
        }
    } else if matches!(frame.components.last(), Some(Component::Combinator(_))) {
        return Err(custom_error(parser, SelectorParseErrorKind::DanglingCombinator));
    }
    frame.components.push(Component::Combinator(combinator));
    frame.in_compound = false;
    Ok(())
}

/// Common entry for any simple selector: resolves pending whitespace and
/// rejects simple selectors trailing a pseudo-element
fn begin_simple_selector<'i>(
    parser: &Parser<'i, '_>,
    frame: &mut Frame<'i>,
) -> Result<(), SelectorParseError<'i>> {
    flush_whitespace(parser, frame)?;
    if frame.after_pseudo_element {
        return Err(custom_error(
            parser,
            SelectorParseErrorKind::InvalidStateAfterPseudoElement,
        ));
    }
    Ok(())
}

/// Like `begin_simple_selector`, additionally rejecting a type selector in
/// the middle of a compound
fn begin_compound_start<'i>(
    parser: &Parser<'i, '_>,
    frame: &mut Frame<'i>,
) -> Result<(), SelectorParseError<'i>> {
    begin_simple_selector(parser, frame)?;
    if frame.in_compound {
        return Err(custom_error(parser, SelectorParseErrorKind::UnexpectedTypeSelector));
    }
    Ok(())
}

/// A type selector, `*`, or either of those behind a namespace qualifier.
/// `base` is the already-consumed ident, or `None` for `*`.
fn handle_type_selector<'i>(
    parser: &mut Parser<'i, '_>,
    frame: &mut Frame<'i>,
    base: Option<Lexeme<'i>>,
) -> Result<(), SelectorParseError<'i>> {
    begin_compound_start(parser, frame)?;

    // a namespace bar must directly follow: `ns|type`, `*|type`
    let qualified: Result<Option<Lexeme>, BasicParseError> = parser.try_parse(|p| {
        let token = p.next_including_whitespace()?;
        if !token.is_delim('|') {
            return Err(BasicParseError::unexpected_token(token));
        }
        let token = p.next_including_whitespace()?;
        match token.token_type {
            TokenType::Ident(local) => Ok(Some(local)),
            TokenType::Delim('*') => Ok(None),
            _ => Err(BasicParseError::unexpected_token(token)),
        }
    });

    match qualified {
        Ok(local) => {
            let prefix = match base {
                Some(ns) => NamespacePrefix::Named(ns),
                None => NamespacePrefix::Any,
            };
            frame.components.push(Component::Namespace(prefix));
            match local {
                Some(local) => frame.components.push(Component::LocalName(local)),
                None => frame.components.push(Component::Universal),
            }
        }
        Err(_) => match base {
            Some(name) => frame.components.push(Component::LocalName(name)),
            None => frame.components.push(Component::Universal),
        },
    }
    frame.in_compound = true;
    Ok(())
}

/// `[ns|attr op value flags]`; the opening `[` has just been consumed
fn parse_attribute_selector<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<AttributeSelector<'i>, SelectorParseError<'i>> {
    log::trace!("parse_attribute_selector");

    parser.parse_nested_block(|p| {
        let token = p.next()?;
        let (namespace, name) = match token.token_type {
            TokenType::Ident(name) => {
                let qualified: Result<Lexeme, BasicParseError> = p.try_parse(|p2| {
                    let token = p2.next_including_whitespace()?;
                    if !token.is_delim('|') {
                        return Err(BasicParseError::unexpected_token(token));
                    }
                    p2.expect_ident()
                });
                match qualified {
                    Ok(local) => (Some(NamespacePrefix::Named(name)), local),
                    Err(_) => (None, name),
                }
            }
            TokenType::Delim('*') => {
                let token = p.next_including_whitespace()?;
                if !token.is_delim('|') {
                    return Err(unexpected(token));
                }
                let local = p.expect_ident()?;
                (Some(NamespacePrefix::Any), local)
            }
            TokenType::Delim('|') => {
                let local = p.expect_ident()?;
                (Some(NamespacePrefix::None), local)
            }
            _ => return Err(unexpected(token)),
        };

        // presence selector: nothing else inside the brackets
        let token = match p.next() {
            Err(_) => {
                return Ok(AttributeSelector {
                    namespace,
                    name,
                    matcher: MatcherType::None,
                    value: Lexeme::Borrowed(""),
                    case_flag: CaseFlag::Default,
                })
            }
            Ok(token) => token,
        };
        let matcher = match token.token_type {
            TokenType::Delim('=') => MatcherType::Equals,
            TokenType::IncludeMatch => MatcherType::Includes,
            TokenType::DashMatch => MatcherType::DashMatch,
            TokenType::PrefixMatch => MatcherType::PrefixMatch,
            TokenType::SuffixMatch => MatcherType::SuffixMatch,
            TokenType::SubstringMatch => MatcherType::SubstringMatch,
            _ => return Err(unexpected(token)),
        };

        let value = p.expect_ident_or_string()?;

        let case_flag = match p.try_parse(|p2| p2.expect_ident()) {
            Ok(flag) if flag.eq_ignore_ascii_case("i") => CaseFlag::Insensitive,
            Ok(flag) if flag.eq_ignore_ascii_case("s") => CaseFlag::Sensitive,
            Ok(flag) => {
                return Err(custom_error(p, SelectorParseErrorKind::UnknownAttributeFlag(flag)))
            }
            Err(_) => CaseFlag::Default,
        };

        Ok(AttributeSelector {
            namespace,
            name,
            matcher,
            value,
            case_flag,
        })
    })
}

/// Everything starting with a `:`
fn handle_pseudo<'i>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<Frame<'i>>,
) -> Result<(), SelectorParseError<'i>> {
    let token = parser.next_including_whitespace()?;
    match token.token_type {
        TokenType::Colon => handle_pseudo_element(parser, stack),
        TokenType::Ident(name) => handle_pseudo_class_ident(parser, stack, name),
        TokenType::Function(name) => handle_pseudo_class_function(parser, stack, name),
        _ => Err(unexpected(token)),
    }
}

/// Non-functional `:name`. CSS 2 pseudo-elements spelled with a single colon
/// are normalized to pseudo-elements.
fn handle_pseudo_class_ident<'i>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<Frame<'i>>,
    name: Lexeme<'i>,
) -> Result<(), SelectorParseError<'i>> {
    enum Action {
        LegacyPseudoElement,
        PseudoClass,
        Rejected,
    }

    let frame = top(stack);
    let action = {
        let lower = name.cow_to_ascii_lowercase();
        match lower.as_ref() {
            "before" | "after" | "first-line" | "first-letter" => Action::LegacyPseudoElement,
            _ if frame.after_pseudo_element => {
                let allowed = (frame.after_webkit_scrollbar
                    && SCROLLBAR_STATE_PSEUDO_CLASSES.contains(&lower.as_ref()))
                    || (frame.after_view_transition
                        && (lower.starts_with("only-") || lower.starts_with("nth-")));
                if allowed {
                    Action::PseudoClass
                } else {
                    Action::Rejected
                }
            }
            _ => Action::PseudoClass,
        }
    };

    match action {
        Action::LegacyPseudoElement => push_pseudo_element(parser, frame, PseudoElement::Named(name)),
        Action::PseudoClass => {
            frame.components.push(Component::PseudoClass(PseudoClass::Ident(name)));
            frame.in_compound = true;
            Ok(())
        }
        Action::Rejected => Err(custom_error(
            parser,
            SelectorParseErrorKind::InvalidPseudoClassAfterPseudoElement,
        )),
    }
}

/// Functional `:name(...)`; the function token has just been consumed, so a
/// parenthesis block is pending
fn handle_pseudo_class_function<'i>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<Frame<'i>>,
    name: Lexeme<'i>,
) -> Result<(), SelectorParseError<'i>> {
    enum Functional<'i> {
        List {
            kind_for: fn(Lexeme<'i>) -> FrameKind<'i>,
            forgiving: bool,
            relative: bool,
            is_has: bool,
        },
        Nth { last: bool, of_allowed: bool },
        NthOfType { last: bool },
        NthCol { last: bool },
        Lang,
        Dir,
        Custom,
    }

    let (after_pseudo_element, after_view_transition, inside_has) = {
        let frame = top(stack);
        (
            frame.after_pseudo_element,
            frame.after_view_transition,
            frame.inside_has,
        )
    };

    let functional = {
        let lower = name.cow_to_ascii_lowercase();

        if after_pseudo_element && !(after_view_transition && lower.starts_with("nth-")) {
            return Err(custom_error(
                parser,
                SelectorParseErrorKind::InvalidPseudoClassAfterPseudoElement,
            ));
        }

        match lower.as_ref() {
            "not" => Functional::List {
                kind_for: |_| FrameKind::Not,
                forgiving: false,
                relative: false,
                is_has: false,
            },
            "is" | "matches" => Functional::List {
                kind_for: |_| FrameKind::Is,
                forgiving: true,
                relative: false,
                is_has: false,
            },
            "-webkit-any" | "-moz-any" => Functional::List {
                kind_for: |name| FrameKind::Any { name },
                forgiving: true,
                relative: false,
                is_has: false,
            },
            "where" => Functional::List {
                kind_for: |_| FrameKind::Where,
                forgiving: true,
                relative: false,
                is_has: false,
            },
            "has" => Functional::List {
                kind_for: |_| FrameKind::Has,
                forgiving: false,
                relative: true,
                is_has: true,
            },
            "host" => Functional::List {
                kind_for: |_| FrameKind::Host,
                forgiving: false,
                relative: false,
                is_has: false,
            },
            "host-context" => Functional::List {
                kind_for: |_| FrameKind::HostContext,
                forgiving: false,
                relative: false,
                is_has: false,
            },
            "current" => Functional::List {
                kind_for: |_| FrameKind::Current,
                forgiving: false,
                relative: false,
                is_has: false,
            },
            "nth-child" => Functional::Nth { last: false, of_allowed: true },
            "nth-last-child" => Functional::Nth { last: true, of_allowed: true },
            "nth-of-type" => Functional::NthOfType { last: false },
            "nth-last-of-type" => Functional::NthOfType { last: true },
            "nth-col" => Functional::NthCol { last: false },
            "nth-last-col" => Functional::NthCol { last: true },
            "lang" => Functional::Lang,
            "dir" => Functional::Dir,
            _ => Functional::Custom,
        }
    };

    match functional {
        Functional::List { kind_for, forgiving, relative, is_has } => {
            if is_has && inside_has {
                return Err(custom_error(parser, SelectorParseErrorKind::NestedHas));
            }
            let scope = parser.open_nested_block();
            stack.push(Frame::new(
                kind_for(name),
                Some(scope),
                forgiving,
                relative,
                inside_has || is_has,
            ));
            Ok(())
        }
        Functional::Nth { last, of_allowed } => {
            let scope = parser.open_nested_block();
            let nth = match parse_anplusb(parser) {
                Ok(nth) => nth,
                Err(error) => {
                    parser.close_nested_block(scope);
                    return Err(error);
                }
            };
            let has_of =
                of_allowed && parser.try_parse(|p| p.expect_ident_matching("of")).is_ok();
            if has_of {
                stack.push(Frame::new(
                    FrameKind::NthOf { nth, last },
                    Some(scope),
                    false,
                    false,
                    inside_has,
                ));
                return Ok(());
            }
            if let Err(error) = parser.expect_exhausted() {
                parser.close_nested_block(scope);
                return Err(error.into());
            }
            parser.close_nested_block(scope);
            let frame = top(stack);
            let pseudo = if last {
                PseudoClass::NthLastChild { nth, of: None }
            } else {
                PseudoClass::NthChild { nth, of: None }
            };
            frame.components.push(Component::PseudoClass(pseudo));
            frame.in_compound = true;
            Ok(())
        }
        Functional::NthOfType { last } => {
            let nth = parse_plain_anplusb_argument(parser)?;
            let frame = top(stack);
            let pseudo = if last {
                PseudoClass::NthLastOfType(nth)
            } else {
                PseudoClass::NthOfType(nth)
            };
            frame.components.push(Component::PseudoClass(pseudo));
            frame.in_compound = true;
            Ok(())
        }
        Functional::NthCol { last } => {
            let nth = parse_plain_anplusb_argument(parser)?;
            let frame = top(stack);
            let pseudo = if last {
                PseudoClass::NthLastCol(nth)
            } else {
                PseudoClass::NthCol(nth)
            };
            frame.components.push(Component::PseudoClass(pseudo));
            frame.in_compound = true;
            Ok(())
        }
        Functional::Lang => {
            let languages = parser.parse_nested_block(|p| {
                p.parse_comma_separated(|p2| p2.expect_ident_or_string().map_err(Into::into))
            })?;
            let frame = top(stack);
            frame.components.push(Component::PseudoClass(PseudoClass::Lang(languages)));
            frame.in_compound = true;
            Ok(())
        }
        Functional::Dir => {
            let direction =
                parser.parse_nested_block(|p| p.expect_ident().map_err(ParseError::from))?;
            let frame = top(stack);
            frame.components.push(Component::PseudoClass(PseudoClass::Dir(direction)));
            frame.in_compound = true;
            Ok(())
        }
        Functional::Custom => {
            let arguments = parse_raw_arguments(parser)?;
            let frame = top(stack);
            frame
                .components
                .push(Component::PseudoClass(PseudoClass::CustomFunction { name, arguments }));
            frame.in_compound = true;
            Ok(())
        }
    }
}

/// An An+B argument with nothing else in the block
fn parse_plain_anplusb_argument<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<AnPlusB, SelectorParseError<'i>> {
    let scope = parser.open_nested_block();
    let result = match parse_anplusb(parser) {
        Ok(nth) => parser.expect_exhausted().map(|()| nth).map_err(Into::into),
        Err(error) => Err(error),
    };
    parser.close_nested_block(scope);
    result
}

/// The raw argument text of an unknown functional form, blocks balanced
fn parse_raw_arguments<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<Lexeme<'i>, SelectorParseError<'i>> {
    parser.parse_nested_block(|p| {
        let start = p.position();
        while p.next_including_whitespace_and_comments().is_ok() {}
        Ok(Lexeme::Borrowed(p.slice_from(start)))
    })
}

/// Everything after `::`
fn handle_pseudo_element<'i>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<Frame<'i>>,
) -> Result<(), SelectorParseError<'i>> {
    let token = parser.next_including_whitespace()?;
    match token.token_type {
        TokenType::Ident(name) => push_pseudo_element(parser, top(stack), PseudoElement::Named(name)),
        TokenType::Function(name) => {
            enum Kind {
                Slotted,
                Part,
                Other,
            }
            let kind = {
                let lower = name.cow_to_ascii_lowercase();
                match lower.as_ref() {
                    "slotted" => Kind::Slotted,
                    "part" => Kind::Part,
                    _ => Kind::Other,
                }
            };
            match kind {
                Kind::Slotted => {
                    let inside_has = top(stack).inside_has;
                    if inside_has {
                        return Err(custom_error(
                            parser,
                            SelectorParseErrorKind::PseudoElementInsideHas,
                        ));
                    }
                    let scope = parser.open_nested_block();
                    stack.push(Frame::new(
                        FrameKind::Slotted,
                        Some(scope),
                        false,
                        false,
                        false,
                    ));
                    Ok(())
                }
                Kind::Part => {
                    let parts = parser.parse_nested_block(|p| {
                        let mut parts = vec![p.expect_ident()?];
                        while let Ok(part) = p.try_parse(|p2| p2.expect_ident()) {
                            parts.push(part);
                        }
                        Ok(parts)
                    })?;
                    push_pseudo_element(parser, top(stack), PseudoElement::Part(parts))
                }
                Kind::Other => {
                    let arguments = parse_raw_arguments(parser)?;
                    push_pseudo_element(
                        parser,
                        top(stack),
                        PseudoElement::Functional { name, arguments },
                    )
                }
            }
        }
        _ => Err(unexpected(token)),
    }
}

/// Appends a pseudo-element, enforcing the contextual rules that govern what
/// may surround one
fn push_pseudo_element<'i>(
    parser: &Parser<'i, '_>,
    frame: &mut Frame<'i>,
    pseudo: PseudoElement<'i>,
) -> Result<(), SelectorParseError<'i>> {
    if frame.inside_has {
        return Err(custom_error(parser, SelectorParseErrorKind::PseudoElementInsideHas));
    }
    if frame.after_slotted {
        let allowed = matches!(
            &pseudo,
            PseudoElement::Named(name)
                if SLOTTED_TAIL_PSEUDO_ELEMENTS.iter().any(|s| name.eq_ignore_ascii_case(s))
        );
        if !allowed {
            return Err(custom_error(
                parser,
                SelectorParseErrorKind::InvalidPseudoElementAfterSlotted,
            ));
        }
    }
    frame.after_pseudo_element = true;
    frame.after_webkit_scrollbar = pseudo.is_webkit_scrollbar();
    frame.after_view_transition = pseudo.is_view_transition();
    if matches!(pseudo, PseudoElement::Slotted(_)) {
        frame.after_slotted = true;
    }
    if matches!(pseudo, PseudoElement::Part(_)) {
        frame.after_part = true;
    }
    frame.components.push(Component::PseudoElement(pseudo));
    frame.in_compound = true;
    Ok(())
}

/// Completes the selector under construction in this frame
fn finish_selector<'i>(
    parser: &Parser<'i, '_>,
    frame: &mut Frame<'i>,
) -> Result<(), SelectorParseError<'i>> {
    let components = std::mem::take(&mut frame.components);
    if matches!(components.last(), Some(Component::Combinator(_))) {
        return Err(custom_error(parser, SelectorParseErrorKind::DanglingCombinator));
    }
    frame.selectors.push(Selector::from_components(components));
    frame.reset_selector_state();
    Ok(())
}

/// The current frame's region ended: close it and attach its selector list
/// to the parent (or return it for the top level)
fn finish_frame<'i>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<Frame<'i>>,
) -> Result<Option<SelectorList<'i>>, SelectorParseError<'i>> {
    let mut frame = match stack.pop() {
        Some(frame) => frame,
        None => unreachable!("the selector frame stack cannot be empty"),
    };

    // components empty here means either an empty list, or a trailing comma;
    // both are fine in forgiving contexts and errors everywhere else
    let pending = if frame.components.is_empty() {
        if frame.forgiving {
            Ok(())
        } else {
            Err(custom_error(parser, SelectorParseErrorKind::EmptySelector))
        }
    } else {
        finish_selector(parser, &mut frame)
    };

    if let Some(scope) = frame.scope.take() {
        parser.close_nested_block(scope);
    }
    pending?;

    let list = SelectorList::new(std::mem::take(&mut frame.selectors));
    attach_finished_list(parser, stack, frame.kind, list)
}

fn attach_finished_list<'i>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<Frame<'i>>,
    kind: FrameKind<'i>,
    list: SelectorList<'i>,
) -> Result<Option<SelectorList<'i>>, SelectorParseError<'i>> {
    let component = match kind {
        FrameKind::TopLevel => return Ok(Some(list)),
        FrameKind::Not => Component::PseudoClass(PseudoClass::Not(Box::new(list))),
        FrameKind::Is => Component::PseudoClass(PseudoClass::Is(Box::new(list))),
        FrameKind::Any { name } => Component::PseudoClass(PseudoClass::Any {
            name,
            selectors: Box::new(list),
        }),
        FrameKind::Where => Component::PseudoClass(PseudoClass::Where(Box::new(list))),
        FrameKind::Has => Component::PseudoClass(PseudoClass::Has(Box::new(list))),
        FrameKind::Host => {
            validate_single_compound(parser, &list, SelectorParseErrorKind::InvalidHostArgument)?;
            Component::PseudoClass(PseudoClass::Host(Box::new(list)))
        }
        FrameKind::HostContext => {
            validate_single_compound(parser, &list, SelectorParseErrorKind::InvalidHostArgument)?;
            Component::PseudoClass(PseudoClass::HostContext(Box::new(list)))
        }
        FrameKind::Current => Component::PseudoClass(PseudoClass::Current(Box::new(list))),
        FrameKind::NthOf { nth, last } => {
            let of = Some(Box::new(list));
            Component::PseudoClass(if last {
                PseudoClass::NthLastChild { nth, of }
            } else {
                PseudoClass::NthChild { nth, of }
            })
        }
        FrameKind::Slotted => {
            validate_single_compound(parser, &list, SelectorParseErrorKind::InvalidSlottedArgument)?;
            let mut list = list;
            let selector = match list.selectors.pop() {
                Some(selector) => selector,
                None => unreachable!(),
            };
            if selector.has_pseudo_element() {
                return Err(custom_error(parser, SelectorParseErrorKind::InvalidSlottedArgument));
            }
            let parent = top(stack);
            return push_pseudo_element(parser, parent, PseudoElement::Slotted(Box::new(selector)))
                .map(|()| None);
        }
    };

    let parent = top(stack);
    parent.components.push(component);
    parent.in_compound = true;
    Ok(None)
}

fn validate_single_compound<'i>(
    parser: &Parser<'i, '_>,
    list: &SelectorList<'i>,
    kind: SelectorParseErrorKind<'i>,
) -> Result<(), SelectorParseError<'i>> {
    let valid = list.selectors.len() == 1
        && list.selectors[0].combinators().next().is_none();
    if valid {
        Ok(())
    } else {
        Err(custom_error(parser, kind))
    }
}

/// Error recovery: pop non-forgiving frames (closing their scopes), then skip
/// to the next comma at the nearest forgiving frame's depth. With no
/// forgiving frame on the stack, the error surfaces.
fn recover<'i>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<Frame<'i>>,
    error: SelectorParseError<'i>,
) -> Result<(), SelectorParseError<'i>> {
    loop {
        let forgiving = match stack.last() {
            Some(frame) => frame.forgiving,
            None => return Err(error),
        };
        if forgiving {
            let frame = top(stack);
            frame.reset_selector_state();
            loop {
                match parser.next() {
                    Ok(token) if matches!(token.token_type, TokenType::Comma) => return Ok(()),
                    Ok(_) => {}
                    // frame end: the main loop will observe it and pop
                    Err(_) => return Ok(()),
                }
            }
        }
        let mut frame = match stack.pop() {
            Some(frame) => frame,
            None => return Err(error),
        };
        if let Some(scope) = frame.scope.take() {
            parser.close_nested_block(scope);
        }
        if stack.is_empty() {
            return Err(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserInput;
    use crate::selector::Specificity;

    fn parse(input: &str) -> Result<SelectorList, String> {
        let mut parser_input = ParserInput::new(input);
        let mut parser = Parser::new(&mut parser_input);
        parser
            .parse_entirely(SelectorList::parse)
            .map_err(|e| e.to_string())
    }

    fn parse_forgiving(input: &str) -> SelectorList {
        let mut parser_input = ParserInput::new(input);
        let mut parser = Parser::new(&mut parser_input);
        match parser.parse_entirely(SelectorList::parse_forgiving) {
            Ok(list) => list,
            Err(e) => panic!("forgiving parse failed on {input:?}: {e}"),
        }
    }

    fn single(input: &str) -> Selector {
        let mut list = match parse(input) {
            Ok(list) => list,
            Err(e) => panic!("parse failed on {input:?}: {e}"),
        };
        assert_eq!(list.selectors.len(), 1, "expected one selector in {input:?}");
        list.selectors.remove(0)
    }

    #[test]
    fn compound_chain_with_combinators() {
        let selector = single(".a > .b + .c");
        assert_eq!(selector.components().len(), 5);
        assert_eq!(selector.specificity(), Specificity::new(0, 3, 0));

        let compounds: Vec<_> = selector.compounds().collect();
        assert_eq!(compounds.len(), 3);
        let combinators: Vec<_> = selector.combinators().collect();
        assert_eq!(combinators, vec![Combinator::Child, Combinator::NextSibling]);
    }

    #[test]
    fn descendant_combinator_from_whitespace() {
        let selector = single("div .a");
        assert_eq!(
            selector.combinators().collect::<Vec<_>>(),
            vec![Combinator::Descendant]
        );
        // trailing whitespace is not a combinator
        let selector = single("div .a  ");
        assert_eq!(selector.combinators().count(), 1);
    }

    #[test]
    fn legacy_deep_combinators() {
        let selector = single(".a >>> .b");
        assert_eq!(
            selector.combinators().collect::<Vec<_>>(),
            vec![Combinator::DeepDescendant]
        );
        let selector = single(".a /deep/ .b");
        assert_eq!(selector.combinators().collect::<Vec<_>>(), vec![Combinator::Deep]);
        assert!(parse(".a >> .b").is_err());
    }

    #[test]
    fn type_selectors_and_namespaces() {
        let selector = single("svg|circle");
        assert!(matches!(
            selector.components()[0],
            Component::Namespace(NamespacePrefix::Named(ref ns)) if *ns == "svg"
        ));
        assert!(matches!(
            selector.components()[1],
            Component::LocalName(ref name) if *name == "circle"
        ));

        let selector = single("*|*");
        assert!(matches!(
            selector.components()[0],
            Component::Namespace(NamespacePrefix::Any)
        ));
        assert!(matches!(selector.components()[1], Component::Universal));

        let selector = single("|div");
        assert!(matches!(
            selector.components()[0],
            Component::Namespace(NamespacePrefix::None)
        ));

        // a type selector cannot follow another simple selector
        assert!(parse(".a*").is_err());
        assert!(parse("*a").is_err());
    }

    #[test]
    fn attribute_selectors() {
        let selector = single("a[href^=\"https://\" i]");
        match &selector.components()[1] {
            Component::Attribute(attribute) => {
                assert_eq!(attribute.name, "href");
                assert_eq!(attribute.matcher, MatcherType::PrefixMatch);
                assert_eq!(attribute.value, "https://");
                assert_eq!(attribute.case_flag, CaseFlag::Insensitive);
            }
            other => panic!("expected attribute, got {other:?}"),
        }

        let selector = single("[disabled]");
        match &selector.components()[0] {
            Component::Attribute(attribute) => {
                assert_eq!(attribute.matcher, MatcherType::None);
            }
            other => panic!("expected attribute, got {other:?}"),
        }

        let selector = single("[svg|width=\"5\"]");
        match &selector.components()[0] {
            Component::Attribute(attribute) => {
                assert!(matches!(
                    attribute.namespace,
                    Some(NamespacePrefix::Named(ref ns)) if *ns == "svg"
                ));
            }
            other => panic!("expected attribute, got {other:?}"),
        }

        assert!(parse("[a=b z]").is_err());
        assert!(parse("[]").is_err());
    }

    #[test]
    fn is_specificity_takes_the_maximum() {
        let selector = single(":is(.a, #b) .c");
        assert_eq!(selector.specificity(), Specificity::new(1, 1, 0));
    }

    #[test]
    fn where_and_has_contribute_zero() {
        assert_eq!(single(":where(#a.b)").specificity(), Specificity::new(0, 0, 0));
        assert_eq!(single(":has(#a)").specificity(), Specificity::new(0, 0, 0));
        assert_eq!(single(":not(#a, .b)").specificity(), Specificity::new(1, 0, 0));
    }

    #[test]
    fn nested_functional_pseudo_classes() {
        let selector = single(":is(:not(:where(.x)), .y)");
        match &selector.components()[0] {
            Component::PseudoClass(PseudoClass::Is(list)) => {
                assert_eq!(list.selectors.len(), 2);
                match &list.selectors[0].components()[0] {
                    Component::PseudoClass(PseudoClass::Not(inner)) => {
                        assert!(matches!(
                            inner.selectors[0].components()[0],
                            Component::PseudoClass(PseudoClass::Where(_))
                        ));
                    }
                    other => panic!("expected :not, got {other:?}"),
                }
            }
            other => panic!("expected :is, got {other:?}"),
        }
    }

    #[test]
    fn deeply_nested_pseudo_classes_do_not_recurse() {
        // a thousand levels of :is() nesting exercises the explicit stack
        let mut input = String::new();
        for _ in 0..1000 {
            input.push_str(":is(");
        }
        input.push_str(".a");
        for _ in 0..1000 {
            input.push(')');
        }
        let selector = single(&input);
        assert_eq!(selector.specificity(), Specificity::new(0, 1, 0));
    }

    #[test]
    fn forgiving_lists_drop_invalid_entries() {
        let list = parse_forgiving("a, !!, b");
        assert_eq!(list.selectors.len(), 2);
        assert_eq!(list.selectors[0].to_string(), "a");
        assert_eq!(list.selectors[1].to_string(), "b");

        // :is() is forgiving on its own
        let selector = single(":is(.a, !!, .b)");
        match &selector.components()[0] {
            Component::PseudoClass(PseudoClass::Is(list)) => {
                assert_eq!(list.selectors.len(), 2);
            }
            other => panic!("expected :is, got {other:?}"),
        }

        // :not() is not forgiving, but an enclosing :is() recovers
        let selector = single(":is(:not(!!), .b)");
        match &selector.components()[0] {
            Component::PseudoClass(PseudoClass::Is(list)) => {
                assert_eq!(list.selectors.len(), 1);
                assert_eq!(list.selectors[0].to_string(), ".b");
            }
            other => panic!("expected :is, got {other:?}"),
        }
    }

    #[test]
    fn non_forgiving_lists_surface_the_first_error() {
        assert!(parse("a, !!, b").is_err());
        assert!(parse(":not(!!)").is_err());
        assert!(parse("a,").is_err());
        assert!(parse(",a").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn nth_child_with_of_selector_list() {
        let selector = single(":nth-child(2n+1 of .a, .b)");
        match &selector.components()[0] {
            Component::PseudoClass(PseudoClass::NthChild { nth, of }) => {
                assert_eq!(*nth, AnPlusB::new(2, 1));
                match of {
                    Some(list) => assert_eq!(list.selectors.len(), 2),
                    None => panic!("expected an `of` list"),
                }
            }
            other => panic!("expected :nth-child, got {other:?}"),
        }

        // specificity: one class bucket plus the max of the `of` list
        let selector = single(":nth-child(even of #a)");
        assert_eq!(selector.specificity(), Specificity::new(1, 1, 0));

        let selector = single(":nth-of-type(2n)");
        assert!(matches!(
            selector.components()[0],
            Component::PseudoClass(PseudoClass::NthOfType(AnPlusB { a: 2, b: 0 }))
        ));
    }

    #[test]
    fn has_takes_relative_selectors() {
        let selector = single(":has(> .a)");
        match &selector.components()[0] {
            Component::PseudoClass(PseudoClass::Has(list)) => {
                assert!(matches!(
                    list.selectors[0].components()[0],
                    Component::Combinator(Combinator::Child)
                ));
            }
            other => panic!("expected :has, got {other:?}"),
        }

        assert!(parse(":has(:has(.a))").is_err());
        assert!(parse(":has(::before)").is_err());
        // a leading combinator is not valid outside :has()
        assert!(parse("> .a").is_err());
    }

    #[test]
    fn pseudo_elements_and_their_tails() {
        let selector = single("div::before");
        assert!(selector.has_pseudo_element());

        // CSS 2 single-colon forms normalize to pseudo-elements
        let selector = single("div:after");
        assert!(selector.has_pseudo_element());
        assert_eq!(selector.to_string(), "div::after");

        // nothing but the allowed pseudo-classes may follow a pseudo-element
        assert!(parse("::before.x").is_err());
        assert!(parse("::before #x").is_err());
        assert!(parse("::before > div").is_err());
        assert!(parse("::before:hover").is_err());

        // scrollbar states after the WebKit scrollbar family
        let selector = single("::-webkit-scrollbar-thumb:hover");
        assert!(selector.has_pseudo_element());
        assert!(parse("::-webkit-scrollbar-thumb:focus").is_err());

        // :only-* / :nth-* after view transitions
        let selector = single("::view-transition-group(card):only-child");
        assert!(selector.has_pseudo_element());
        let selector = single("::view-transition-group(card):nth-child(2)");
        assert!(selector.has_pseudo_element());
    }

    #[test]
    fn slotted_rules() {
        let selector = single("::slotted(.a)");
        assert!(selector.has_slotted());
        assert_eq!(selector.specificity(), Specificity::new(0, 1, 1));

        let selector = single("::slotted(.a)::before");
        assert!(selector.has_slotted());

        assert!(parse("::slotted(.a > .b)").is_err());
        assert!(parse("::slotted(.a, .b)").is_err());
        assert!(parse("::slotted(.a)::part(x)").is_err());
    }

    #[test]
    fn part_and_custom_pseudo_elements() {
        let selector = single("::part(label icon)");
        assert!(selector.has_part());
        match &selector.components()[0] {
            Component::PseudoElement(PseudoElement::Part(parts)) => {
                assert_eq!(parts.len(), 2);
            }
            other => panic!("expected ::part, got {other:?}"),
        }

        let selector = single("::highlight(search)");
        assert!(matches!(
            &selector.components()[0],
            Component::PseudoElement(PseudoElement::Functional { name, arguments })
                if *name == "highlight" && *arguments == "search"
        ));
    }

    #[test]
    fn unknown_functional_pseudo_classes_round_trip() {
        let selector = single(":-custom-thing(.a > [b], 3)");
        match &selector.components()[0] {
            Component::PseudoClass(PseudoClass::CustomFunction { name, arguments }) => {
                assert_eq!(*name, "-custom-thing");
                assert_eq!(*arguments, ".a > [b], 3");
            }
            other => panic!("expected a custom function, got {other:?}"),
        }
    }

    #[test]
    fn host_expects_a_single_compound() {
        let selector = single(":host(.a.b)");
        assert!(matches!(
            selector.components()[0],
            Component::PseudoClass(PseudoClass::Host(_))
        ));
        // the argument is a matching condition, not extra specificity
        assert_eq!(selector.specificity(), Specificity::new(0, 1, 0));
        assert!(parse(":host(.a .b)").is_err());
        assert!(parse(":host(.a, .b)").is_err());
    }

    #[test]
    fn nesting_selector() {
        let selector = single("&.active");
        assert!(matches!(selector.components()[0], Component::Nesting));
        assert_eq!(selector.specificity(), Specificity::new(0, 1, 0));
    }

    #[test]
    fn selector_lists_and_display() {
        let list = match parse("a.b, #c > :hover") {
            Ok(list) => list,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(list.len(), 2);
        assert_eq!(list.to_string(), "a.b, #c > :hover");
    }

    #[test]
    fn lang_and_dir() {
        let selector = single(":lang(en, \"fr-CA\")");
        match &selector.components()[0] {
            Component::PseudoClass(PseudoClass::Lang(languages)) => {
                assert_eq!(languages.len(), 2);
                assert_eq!(languages[0], "en");
                assert_eq!(languages[1], "fr-CA");
            }
            other => panic!("expected :lang, got {other:?}"),
        }

        let selector = single(":dir(rtl)");
        assert!(matches!(
            &selector.components()[0],
            Component::PseudoClass(PseudoClass::Dir(d)) if *d == "rtl"
        ));
    }

    #[test]
    fn specificity_ordering_across_a_list() {
        let list = match parse("#a, .b.c, div") {
            Ok(list) => list,
            Err(e) => panic!("{e}"),
        };
        let specificities: Vec<_> =
            list.selectors.iter().map(|s| s.specificity()).collect();
        assert!(specificities[0] > specificities[1]);
        assert!(specificities[1] > specificities[2]);
    }
}
