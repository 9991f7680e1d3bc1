//! Selector AST for the [CSS Selectors Level 4](https://www.w3.org/TR/selectors-4/)
//! grammar, with packed specificity.
//!
//! A selector is an ordered sequence of components; compounds are the maximal
//! runs between combinators. Nested selector lists (`:is()`, `:not()`,
//! `:nth-child(.. of S)`, `::slotted()`) own their arguments.

use crate::serialize::{serialize_identifier, serialize_string};
use itertools::Itertools;
use nimbra_shared::lexeme::Lexeme;
use std::fmt;

pub mod anplusb;
pub mod parser;

/// The relationship operator between two compound selectors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace
    Descendant,
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    LaterSibling,
    /// `>>>`, kept for legacy scoped-style piercing
    DeepDescendant,
    /// `/deep/`, kept for legacy scoped-style piercing
    Deep,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::Descendant => write!(f, " "),
            Combinator::Child => write!(f, ">"),
            Combinator::NextSibling => write!(f, "+"),
            Combinator::LaterSibling => write!(f, "~"),
            Combinator::DeepDescendant => write!(f, ">>>"),
            Combinator::Deep => write!(f, "/deep/"),
        }
    }
}

/// A namespace qualifier preceding a type or attribute name
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NamespacePrefix<'i> {
    /// `*|`
    Any,
    /// `|` with nothing before it
    None,
    /// `ns|`
    Named(Lexeme<'i>),
}

impl fmt::Display for NamespacePrefix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespacePrefix::Any => write!(f, "*|"),
            NamespacePrefix::None => write!(f, "|"),
            NamespacePrefix::Named(ns) => {
                serialize_identifier(ns, f)?;
                write!(f, "|")
            }
        }
    }
}

/// Which type of matcher an attribute selector uses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatcherType {
    /// No matcher: `[attr]`
    #[default]
    None,
    /// `=`
    Equals,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    PrefixMatch,
    /// `$=`
    SuffixMatch,
    /// `*=`
    SubstringMatch,
}

impl fmt::Display for MatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatcherType::None => write!(f, ""),
            MatcherType::Equals => write!(f, "="),
            MatcherType::Includes => write!(f, "~="),
            MatcherType::DashMatch => write!(f, "|="),
            MatcherType::PrefixMatch => write!(f, "^="),
            MatcherType::SuffixMatch => write!(f, "$="),
            MatcherType::SubstringMatch => write!(f, "*="),
        }
    }
}

/// Case-sensitivity flag of an attribute selector (`i` / `s`)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaseFlag {
    #[default]
    Default,
    /// `i`
    Insensitive,
    /// `s`
    Sensitive,
}

/// `[ns|attr op "value" i]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeSelector<'i> {
    pub namespace: Option<NamespacePrefix<'i>>,
    pub name: Lexeme<'i>,
    pub matcher: MatcherType,
    /// Empty for presence selectors (`[attr]`)
    pub value: Lexeme<'i>,
    pub case_flag: CaseFlag,
}

impl fmt::Display for AttributeSelector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}")?;
        }
        serialize_identifier(&self.name, f)?;
        if self.matcher != MatcherType::None {
            write!(f, "{}", self.matcher)?;
            serialize_string(&self.value, f)?;
        }
        match self.case_flag {
            CaseFlag::Default => {}
            CaseFlag::Insensitive => write!(f, " i")?,
            CaseFlag::Sensitive => write!(f, " s")?,
        }
        write!(f, "]")
    }
}

/// The `An+B` coefficient pair used by the `:nth-*` pseudo-classes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnPlusB {
    pub a: i32,
    pub b: i32,
}

impl AnPlusB {
    #[must_use]
    pub fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }
}

impl fmt::Display for AnPlusB {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 0 {
            return write!(f, "{}", self.b);
        }
        match self.a {
            1 => write!(f, "n")?,
            -1 => write!(f, "-n")?,
            a => write!(f, "{a}n")?,
        }
        if self.b != 0 {
            if self.b > 0 {
                write!(f, "+")?;
            }
            write!(f, "{}", self.b)?;
        }
        Ok(())
    }
}

/// A pseudo-class, functional or not. Unknown functional forms round-trip
/// with their raw argument text.
#[derive(Clone, Debug, PartialEq)]
pub enum PseudoClass<'i> {
    Not(Box<SelectorList<'i>>),
    Is(Box<SelectorList<'i>>),
    Where(Box<SelectorList<'i>>),
    /// `:-webkit-any()` / `:-moz-any()`, carrying the name it was written with
    Any {
        name: Lexeme<'i>,
        selectors: Box<SelectorList<'i>>,
    },
    Has(Box<SelectorList<'i>>),
    Host(Box<SelectorList<'i>>),
    HostContext(Box<SelectorList<'i>>),
    Current(Box<SelectorList<'i>>),
    NthChild {
        nth: AnPlusB,
        of: Option<Box<SelectorList<'i>>>,
    },
    NthLastChild {
        nth: AnPlusB,
        of: Option<Box<SelectorList<'i>>>,
    },
    NthOfType(AnPlusB),
    NthLastOfType(AnPlusB),
    NthCol(AnPlusB),
    NthLastCol(AnPlusB),
    Lang(Vec<Lexeme<'i>>),
    Dir(Lexeme<'i>),
    /// A non-functional pseudo-class such as `:hover`
    Ident(Lexeme<'i>),
    /// An unknown functional pseudo-class, with the raw argument slice
    CustomFunction {
        name: Lexeme<'i>,
        arguments: Lexeme<'i>,
    },
}

impl fmt::Display for PseudoClass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PseudoClass::Not(list) => write!(f, ":not({list})"),
            PseudoClass::Is(list) => write!(f, ":is({list})"),
            PseudoClass::Where(list) => write!(f, ":where({list})"),
            PseudoClass::Any { name, selectors } => {
                write!(f, ":")?;
                serialize_identifier(name, f)?;
                write!(f, "({selectors})")
            }
            PseudoClass::Has(list) => write!(f, ":has({list})"),
            PseudoClass::Host(list) => write!(f, ":host({list})"),
            PseudoClass::HostContext(list) => write!(f, ":host-context({list})"),
            PseudoClass::Current(list) => write!(f, ":current({list})"),
            PseudoClass::NthChild { nth, of } => {
                write!(f, ":nth-child({nth}")?;
                if let Some(of) = of {
                    write!(f, " of {of}")?;
                }
                write!(f, ")")
            }
            PseudoClass::NthLastChild { nth, of } => {
                write!(f, ":nth-last-child({nth}")?;
                if let Some(of) = of {
                    write!(f, " of {of}")?;
                }
                write!(f, ")")
            }
            PseudoClass::NthOfType(nth) => write!(f, ":nth-of-type({nth})"),
            PseudoClass::NthLastOfType(nth) => write!(f, ":nth-last-of-type({nth})"),
            PseudoClass::NthCol(nth) => write!(f, ":nth-col({nth})"),
            PseudoClass::NthLastCol(nth) => write!(f, ":nth-last-col({nth})"),
            PseudoClass::Lang(languages) => {
                write!(f, ":lang(")?;
                for (i, language) in languages.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    serialize_identifier(language, f)?;
                }
                write!(f, ")")
            }
            PseudoClass::Dir(direction) => {
                write!(f, ":dir(")?;
                serialize_identifier(direction, f)?;
                write!(f, ")")
            }
            PseudoClass::Ident(name) => {
                write!(f, ":")?;
                serialize_identifier(name, f)
            }
            PseudoClass::CustomFunction { name, arguments } => {
                write!(f, ":")?;
                serialize_identifier(name, f)?;
                write!(f, "({arguments})")
            }
        }
    }
}

/// WebKit scrollbar pseudo-element names, after which the scrollbar state
/// pseudo-classes remain valid
const WEBKIT_SCROLLBAR_PSEUDO_ELEMENTS: &[&str] = &[
    "-webkit-scrollbar",
    "-webkit-scrollbar-button",
    "-webkit-scrollbar-thumb",
    "-webkit-scrollbar-track",
    "-webkit-scrollbar-track-piece",
    "-webkit-scrollbar-corner",
    "-webkit-resizer",
];

/// A pseudo-element, functional or not
#[derive(Clone, Debug, PartialEq)]
pub enum PseudoElement<'i> {
    /// `::slotted(<compound>)`
    Slotted(Box<Selector<'i>>),
    /// `::part(ident+)`
    Part(Vec<Lexeme<'i>>),
    /// A non-functional pseudo-element such as `::before`
    Named(Lexeme<'i>),
    /// A functional pseudo-element kept as its raw argument slice, such as
    /// `::view-transition-group(name)` or `::highlight(x)`
    Functional {
        name: Lexeme<'i>,
        arguments: Lexeme<'i>,
    },
}

impl<'i> PseudoElement<'i> {
    /// True for the WebKit scrollbar family, which allows trailing scrollbar
    /// state pseudo-classes
    #[must_use]
    pub fn is_webkit_scrollbar(&self) -> bool {
        match self {
            PseudoElement::Named(name) => WEBKIT_SCROLLBAR_PSEUDO_ELEMENTS
                .iter()
                .any(|s| name.eq_ignore_ascii_case(s)),
            _ => false,
        }
    }

    /// True for the view-transition family, which allows trailing
    /// `:only-*` / `:nth-*` pseudo-classes
    #[must_use]
    pub fn is_view_transition(&self) -> bool {
        let name: &str = match self {
            PseudoElement::Named(name) => name,
            PseudoElement::Functional { name, .. } => name,
            _ => return false,
        };
        name.get(..16)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("view-transition-"))
    }
}

impl fmt::Display for PseudoElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PseudoElement::Slotted(selector) => write!(f, "::slotted({selector})"),
            PseudoElement::Part(parts) => {
                write!(f, "::part(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    serialize_identifier(part, f)?;
                }
                write!(f, ")")
            }
            PseudoElement::Named(name) => {
                write!(f, "::")?;
                serialize_identifier(name, f)
            }
            PseudoElement::Functional { name, arguments } => {
                write!(f, "::")?;
                serialize_identifier(name, f)?;
                write!(f, "({arguments})")
            }
        }
    }
}

/// One component of a selector
#[derive(Clone, Debug, PartialEq)]
pub enum Component<'i> {
    Combinator(Combinator),
    /// A namespace qualifier; always directly followed by a type selector or
    /// `Universal`
    Namespace(NamespacePrefix<'i>),
    /// `*`
    Universal,
    /// A type (element name) selector
    LocalName(Lexeme<'i>),
    /// `#id`
    Id(Lexeme<'i>),
    /// `.class`
    Class(Lexeme<'i>),
    Attribute(Box<AttributeSelector<'i>>),
    PseudoClass(PseudoClass<'i>),
    PseudoElement(PseudoElement<'i>),
    /// The nesting selector `&`
    Nesting,
}

impl fmt::Display for Component<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Combinator(combinator) => match combinator {
                Combinator::Descendant => write!(f, " "),
                combinator => write!(f, " {combinator} "),
            },
            Component::Namespace(prefix) => write!(f, "{prefix}"),
            Component::Universal => write!(f, "*"),
            Component::LocalName(name) => serialize_identifier(name, f),
            Component::Id(name) => {
                write!(f, "#")?;
                serialize_identifier(name, f)
            }
            Component::Class(name) => {
                write!(f, ".")?;
                serialize_identifier(name, f)
            }
            Component::Attribute(attribute) => write!(f, "{attribute}"),
            Component::PseudoClass(pseudo) => write!(f, "{pseudo}"),
            Component::PseudoElement(pseudo) => write!(f, "{pseudo}"),
            Component::Nesting => write!(f, "&"),
        }
    }
}

const MAX_10BIT: u32 = (1 << 10) - 1;

/// A packed `(ids, classes, elements)` specificity triple. Each bucket
/// saturates at 10 bits; comparison is on the packed value, so triples order
/// lexicographically.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity(u32);

impl Specificity {
    #[must_use]
    pub fn new(ids: u32, classes: u32, elements: u32) -> Self {
        Specificity(
            (ids.min(MAX_10BIT) << 20)
                | (classes.min(MAX_10BIT) << 10)
                | elements.min(MAX_10BIT),
        )
    }

    #[must_use]
    pub fn ids(self) -> u32 {
        (self.0 >> 20) & MAX_10BIT
    }

    #[must_use]
    pub fn classes(self) -> u32 {
        (self.0 >> 10) & MAX_10BIT
    }

    #[must_use]
    pub fn elements(self) -> u32 {
        self.0 & MAX_10BIT
    }

    /// The raw packed value
    #[must_use]
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Specificity({}, {}, {})",
            self.ids(),
            self.classes(),
            self.elements()
        )
    }
}

/// Bucket counters used while specificity is being summed up; packing only
/// happens at the end so intermediate sums cannot saturate early.
#[derive(Clone, Copy, Default)]
struct SpecificityCounts {
    ids: u32,
    classes: u32,
    elements: u32,
}

impl SpecificityCounts {
    fn add(&mut self, specificity: Specificity) {
        self.ids += specificity.ids();
        self.classes += specificity.classes();
        self.elements += specificity.elements();
    }

    fn pack(self) -> Specificity {
        Specificity::new(self.ids, self.classes, self.elements)
    }
}

/// The maximum specificity across a list, zero when the list is empty
fn max_specificity(list: &SelectorList) -> Specificity {
    list.selectors
        .iter()
        .map(Selector::specificity)
        .max()
        .unwrap_or_default()
}

fn specificity_of_components(components: &[Component]) -> Specificity {
    let mut counts = SpecificityCounts::default();
    for component in components {
        match component {
            Component::Combinator(_)
            | Component::Namespace(_)
            | Component::Universal
            // `&` resolves against the enclosing rule, which the core cannot
            // see; it contributes nothing here
            | Component::Nesting => {}
            Component::LocalName(_) => counts.elements += 1,
            Component::Id(_) => counts.ids += 1,
            Component::Class(_) | Component::Attribute(_) => counts.classes += 1,
            Component::PseudoElement(pseudo) => {
                counts.elements += 1;
                if let PseudoElement::Slotted(selector) = pseudo {
                    counts.add(selector.specificity());
                }
            }
            Component::PseudoClass(pseudo) => match pseudo {
                PseudoClass::Where(_) | PseudoClass::Has(_) => {}
                PseudoClass::Is(list) | PseudoClass::Not(list) => counts.add(max_specificity(list)),
                PseudoClass::Any { selectors, .. } => counts.add(max_specificity(selectors)),
                PseudoClass::NthChild { of, .. } | PseudoClass::NthLastChild { of, .. } => {
                    counts.classes += 1;
                    if let Some(of) = of {
                        counts.add(max_specificity(of));
                    }
                }
                // every other pseudo-class counts as one class; the arguments
                // of :host(), :host-context() and :current() are matching
                // conditions and do not add their own specificity
                _ => counts.classes += 1,
            },
        }
    }
    counts.pack()
}

/// A parsed selector: its components plus derived data computed once at
/// construction
#[derive(Clone, Debug, PartialEq)]
pub struct Selector<'i> {
    components: Vec<Component<'i>>,
    specificity: Specificity,
    has_pseudo_element: bool,
    has_slotted: bool,
    has_part: bool,
}

impl<'i> Selector<'i> {
    /// Builds a selector from its components, computing specificity and the
    /// pseudo-element flags
    #[must_use]
    pub fn from_components(components: Vec<Component<'i>>) -> Self {
        let specificity = specificity_of_components(&components);
        let mut has_pseudo_element = false;
        let mut has_slotted = false;
        let mut has_part = false;
        for component in &components {
            if let Component::PseudoElement(pseudo) = component {
                has_pseudo_element = true;
                match pseudo {
                    PseudoElement::Slotted(_) => has_slotted = true,
                    PseudoElement::Part(_) => has_part = true,
                    _ => {}
                }
            }
        }
        Self {
            components,
            specificity,
            has_pseudo_element,
            has_slotted,
            has_part,
        }
    }

    #[must_use]
    pub fn components(&self) -> &[Component<'i>] {
        &self.components
    }

    #[must_use]
    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    #[must_use]
    pub fn has_pseudo_element(&self) -> bool {
        self.has_pseudo_element
    }

    #[must_use]
    pub fn has_slotted(&self) -> bool {
        self.has_slotted
    }

    #[must_use]
    pub fn has_part(&self) -> bool {
        self.has_part
    }

    /// The compound selectors, in order: the maximal runs of simple selectors
    /// between combinators
    pub fn compounds(&self) -> impl Iterator<Item = &[Component<'i>]> + '_ {
        self.components
            .split(|c| matches!(c, Component::Combinator(_)))
    }

    /// The combinators between the compounds, in order
    pub fn combinators(&self) -> impl Iterator<Item = Combinator> + '_ {
        self.components.iter().filter_map(|c| match c {
            Component::Combinator(combinator) => Some(*combinator),
            _ => None,
        })
    }
}

impl fmt::Display for Selector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

/// A comma-separated list of selectors
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SelectorList<'i> {
    pub selectors: Vec<Selector<'i>>,
}

impl<'i> SelectorList<'i> {
    #[must_use]
    pub fn new(selectors: Vec<Selector<'i>>) -> Self {
        Self { selectors }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

impl fmt::Display for SelectorList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selectors.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specificity_packs_and_orders() {
        let a = Specificity::new(1, 0, 0);
        let b = Specificity::new(0, 30, 7);
        assert!(a > b);
        assert_eq!(b.classes(), 30);
        assert_eq!(b.elements(), 7);
        assert_eq!(Specificity::new(0, 2000, 0).classes(), MAX_10BIT);
    }

    #[test]
    fn specificity_of_simple_components() {
        let selector = Selector::from_components(vec![
            Component::Id(Lexeme::Borrowed("a")),
            Component::Class(Lexeme::Borrowed("b")),
            Component::LocalName(Lexeme::Borrowed("div")),
            Component::Universal,
        ]);
        assert_eq!(selector.specificity(), Specificity::new(1, 1, 1));
    }

    #[test]
    fn anplusb_display() {
        assert_eq!(AnPlusB::new(2, 1).to_string(), "2n+1");
        assert_eq!(AnPlusB::new(0, 4).to_string(), "4");
        assert_eq!(AnPlusB::new(-1, 6).to_string(), "-n+6");
        assert_eq!(AnPlusB::new(3, -2).to_string(), "3n-2");
        assert_eq!(AnPlusB::new(1, 0).to_string(), "n");
    }

    #[test]
    fn display_round_trips_structure() {
        let selector = Selector::from_components(vec![
            Component::Class(Lexeme::Borrowed("a")),
            Component::Combinator(Combinator::Child),
            Component::Id(Lexeme::Borrowed("b")),
            Component::Combinator(Combinator::Descendant),
            Component::PseudoClass(PseudoClass::Ident(Lexeme::Borrowed("hover"))),
        ]);
        assert_eq!(selector.to_string(), ".a > #b :hover");
    }

    #[test]
    fn webkit_scrollbar_and_view_transition_detection() {
        let scrollbar = PseudoElement::Named(Lexeme::Borrowed("-webkit-scrollbar-thumb"));
        assert!(scrollbar.is_webkit_scrollbar());
        let view_transition = PseudoElement::Functional {
            name: Lexeme::Borrowed("view-transition-group"),
            arguments: Lexeme::Borrowed("card"),
        };
        assert!(view_transition.is_view_transition());
        let before = PseudoElement::Named(Lexeme::Borrowed("before"));
        assert!(!before.is_webkit_scrollbar());
        assert!(!before.is_view_transition());
    }
}
