//! Recognizers for the basic value types: lengths, angles, times,
//! resolutions, numbers and percentages, ratios, and the image / gradient
//! glue. Each recognizer also accepts a math function where the grammar
//! admits one.

use crate::calc::{is_math_function, CalcDimension, CalcExpr};
use crate::colors::Color;
use crate::errors::ParseError;
use crate::parser::Parser;
use crate::tokenizer::{Token, TokenType};
use nimbra_shared::lexeme::Lexeme;
use std::fmt;
use thiserror::Error;

/// Errors produced by the value, calc and color recognizers
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValueParseErrorKind<'i> {
    #[error("unexpected token in math expression: {0}")]
    UnexpectedCalcToken(Token<'i>),
    #[error("invalid math expression")]
    InvalidCalcExpression,
    #[error("unexpected token in color: {0}")]
    UnexpectedColorToken(Token<'i>),
    #[error("mixing legacy and modern color component syntax")]
    MixedColorSyntax,
    #[error("`none` is not allowed in legacy color syntax")]
    NoneInLegacyColor,
    #[error("unexpected token in value: {0}")]
    UnexpectedValueToken(Token<'i>),
    #[error("invalid ratio")]
    InvalidRatio,
    #[error("invalid gradient")]
    InvalidGradient,
}

pub type ValueParseError<'i> = ParseError<'i, ValueParseErrorKind<'i>>;

pub(crate) fn unexpected_value<'i>(token: Token<'i>) -> ValueParseError<'i> {
    let location = token.location;
    ValueParseError {
        kind: crate::errors::ParseErrorKind::Custom(ValueParseErrorKind::UnexpectedValueToken(
            token,
        )),
        location,
    }
}

/// `<length>` units
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LengthUnit {
    Px,
    In,
    Cm,
    Mm,
    Q,
    Pt,
    Pc,
    Em,
    Rem,
    Ex,
    Ch,
    Vw,
    Vh,
    Vmin,
    Vmax,
}

impl LengthUnit {
    fn from_name(name: &str) -> Option<LengthUnit> {
        const UNITS: &[(&str, LengthUnit)] = &[
            ("px", LengthUnit::Px),
            ("in", LengthUnit::In),
            ("cm", LengthUnit::Cm),
            ("mm", LengthUnit::Mm),
            ("q", LengthUnit::Q),
            ("pt", LengthUnit::Pt),
            ("pc", LengthUnit::Pc),
            ("em", LengthUnit::Em),
            ("rem", LengthUnit::Rem),
            ("ex", LengthUnit::Ex),
            ("ch", LengthUnit::Ch),
            ("vw", LengthUnit::Vw),
            ("vh", LengthUnit::Vh),
            ("vmin", LengthUnit::Vmin),
            ("vmax", LengthUnit::Vmax),
        ];
        UNITS
            .iter()
            .find(|(n, _)| name.eq_ignore_ascii_case(n))
            .map(|(_, unit)| *unit)
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self {
            LengthUnit::Px => "px",
            LengthUnit::In => "in",
            LengthUnit::Cm => "cm",
            LengthUnit::Mm => "mm",
            LengthUnit::Q => "q",
            LengthUnit::Pt => "pt",
            LengthUnit::Pc => "pc",
            LengthUnit::Em => "em",
            LengthUnit::Rem => "rem",
            LengthUnit::Ex => "ex",
            LengthUnit::Ch => "ch",
            LengthUnit::Vw => "vw",
            LengthUnit::Vh => "vh",
            LengthUnit::Vmin => "vmin",
            LengthUnit::Vmax => "vmax",
        };
        f.write_str(unit)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    #[must_use]
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::new(0.0, LengthUnit::Px)
    }

    /// Parses a `<length>`: a dimension with a length unit, a unitless zero,
    /// or a math function over lengths
    pub fn parse<'i, 't>(
        parser: &mut Parser<'i, 't>,
    ) -> Result<DimensionValue<Length>, ValueParseError<'i>> {
        log::trace!("parse_length");
        parse_dimension_value(parser, |v| (v == 0.0).then(Length::zero))
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

impl<'i> CalcDimension<'i> for Length {
    fn from_token(token: &TokenType<'i>) -> Option<Self> {
        match token {
            TokenType::Dimension { value, unit } => {
                LengthUnit::from_name(unit).map(|unit| Length::new(value.value, unit))
            }
            _ => None,
        }
    }
}

/// `<angle>` units
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AngleUnit {
    Deg,
    Grad,
    Rad,
    Turn,
}

impl AngleUnit {
    pub(crate) fn from_name(name: &str) -> Option<AngleUnit> {
        if name.eq_ignore_ascii_case("deg") {
            Some(AngleUnit::Deg)
        } else if name.eq_ignore_ascii_case("grad") {
            Some(AngleUnit::Grad)
        } else if name.eq_ignore_ascii_case("rad") {
            Some(AngleUnit::Rad)
        } else if name.eq_ignore_ascii_case("turn") {
            Some(AngleUnit::Turn)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Angle {
    pub value: f64,
    pub unit: AngleUnit,
}

impl Angle {
    #[must_use]
    pub fn new(value: f64, unit: AngleUnit) -> Self {
        Self { value, unit }
    }

    /// The angle in degrees
    #[must_use]
    pub fn to_degrees(self) -> f64 {
        match self.unit {
            AngleUnit::Deg => self.value,
            AngleUnit::Grad => self.value * 360.0 / 400.0,
            AngleUnit::Rad => self.value.to_degrees(),
            AngleUnit::Turn => self.value * 360.0,
        }
    }

    /// Parses an `<angle>` or a math function over angles
    pub fn parse<'i, 't>(
        parser: &mut Parser<'i, 't>,
    ) -> Result<DimensionValue<Angle>, ValueParseError<'i>> {
        log::trace!("parse_angle");
        parse_dimension_value(parser, |_| None)
    }
}

impl<'i> CalcDimension<'i> for Angle {
    fn from_token(token: &TokenType<'i>) -> Option<Self> {
        match token {
            TokenType::Dimension { value, unit } => {
                AngleUnit::from_name(unit).map(|unit| Angle::new(value.value, unit))
            }
            _ => None,
        }
    }
}

/// `<time>` units
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeUnit {
    S,
    Ms,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Time {
    pub value: f64,
    pub unit: TimeUnit,
}

impl Time {
    /// Parses a `<time>` or a math function over times
    pub fn parse<'i, 't>(
        parser: &mut Parser<'i, 't>,
    ) -> Result<DimensionValue<Time>, ValueParseError<'i>> {
        log::trace!("parse_time");
        parse_dimension_value(parser, |_| None)
    }
}

impl<'i> CalcDimension<'i> for Time {
    fn from_token(token: &TokenType<'i>) -> Option<Self> {
        match token {
            TokenType::Dimension { value, unit } => {
                if unit.eq_ignore_ascii_case("s") {
                    Some(Time { value: value.value, unit: TimeUnit::S })
                } else if unit.eq_ignore_ascii_case("ms") {
                    Some(Time { value: value.value, unit: TimeUnit::Ms })
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// `<resolution>` units
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionUnit {
    Dpi,
    Dpcm,
    Dppx,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resolution {
    pub value: f64,
    pub unit: ResolutionUnit,
}

impl Resolution {
    /// Parses a `<resolution>` (`x` is an alias for `dppx`)
    pub fn parse<'i, 't>(
        parser: &mut Parser<'i, 't>,
    ) -> Result<DimensionValue<Resolution>, ValueParseError<'i>> {
        log::trace!("parse_resolution");
        parse_dimension_value(parser, |_| None)
    }
}

impl<'i> CalcDimension<'i> for Resolution {
    fn from_token(token: &TokenType<'i>) -> Option<Self> {
        match token {
            TokenType::Dimension { value, unit } => {
                let unit = if unit.eq_ignore_ascii_case("dpi") {
                    ResolutionUnit::Dpi
                } else if unit.eq_ignore_ascii_case("dpcm") {
                    ResolutionUnit::Dpcm
                } else if unit.eq_ignore_ascii_case("dppx") || unit.eq_ignore_ascii_case("x") {
                    ResolutionUnit::Dppx
                } else {
                    return None;
                };
                Some(Resolution { value: value.value, unit })
            }
            _ => None,
        }
    }
}

/// Any dimension usable as a generic math-expression leaf
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CssDimension {
    Length(Length),
    Angle(Angle),
    Time(Time),
    Resolution(Resolution),
    /// A percentage as its unit value (1.0 = 100%)
    Percentage(f64),
}

impl<'i> CalcDimension<'i> for CssDimension {
    fn from_token(token: &TokenType<'i>) -> Option<Self> {
        match token {
            TokenType::Percentage(value) => Some(CssDimension::Percentage(value.value)),
            TokenType::Dimension { .. } => Length::from_token(token)
                .map(CssDimension::Length)
                .or_else(|| Angle::from_token(token).map(CssDimension::Angle))
                .or_else(|| Time::from_token(token).map(CssDimension::Time))
                .or_else(|| Resolution::from_token(token).map(CssDimension::Resolution)),
            _ => None,
        }
    }
}

/// A literal dimension, or the math expression it came from when the
/// expression could not fold to a single literal
#[derive(Clone, Debug, PartialEq)]
pub enum DimensionValue<V> {
    Literal(V),
    Calc(Box<CalcExpr<V>>),
}

/// The shared literal-or-calc recognizer. `from_unitless` decides whether a
/// bare number is acceptable (unitless zero lengths are).
fn parse_dimension_value<'i, 't, V, F>(
    parser: &mut Parser<'i, 't>,
    from_unitless: F,
) -> Result<DimensionValue<V>, ValueParseError<'i>>
where
    V: CalcDimension<'i>,
    F: FnOnce(f64) -> Option<V>,
{
    let token = parser.next()?;
    match token.token_type {
        ref token_type @ (TokenType::Dimension { .. } | TokenType::Percentage(_)) => {
            match V::from_token(token_type) {
                Some(value) => Ok(DimensionValue::Literal(value)),
                None => Err(unexpected_value(token)),
            }
        }
        TokenType::Number(ref value) => match from_unitless(value.value) {
            Some(value) => Ok(DimensionValue::Literal(value)),
            None => Err(unexpected_value(token)),
        },
        TokenType::Function(ref name) if is_math_function(name) => {
            let name = name.as_str().to_ascii_lowercase();
            let expr = CalcExpr::parse_math_function(parser, &name)?;
            Ok(match expr {
                CalcExpr::Value(value) => DimensionValue::Literal(value),
                expr => DimensionValue::Calc(Box::new(expr)),
            })
        }
        _ => Err(unexpected_value(token)),
    }
}

/// `<number>` or `<percentage>`
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumberOrPercentage {
    Number(f64),
    /// The unit value (1.0 = 100%)
    Percentage(f64),
}

impl NumberOrPercentage {
    pub fn parse<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Self, ValueParseError<'i>> {
        let token = parser.next()?;
        match token.token_type {
            TokenType::Number(value) => Ok(NumberOrPercentage::Number(value.value)),
            TokenType::Percentage(value) => Ok(NumberOrPercentage::Percentage(value.value)),
            _ => Err(unexpected_value(token)),
        }
    }
}

/// `<ratio>`: `<number> [ / <number> ]?`, both non-negative
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ratio {
    pub numerator: f64,
    pub denominator: f64,
}

impl Ratio {
    pub fn parse<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Self, ValueParseError<'i>> {
        log::trace!("parse_ratio");
        let location = parser.current_source_location();
        let numerator = parser.expect_number()?;
        let denominator = match parser.try_parse(|p| -> Result<f64, ValueParseError<'i>> {
            p.expect_delim('/')?;
            Ok(p.expect_number()?)
        }) {
            Ok(denominator) => denominator,
            Err(_) => 1.0,
        };
        if numerator < 0.0 || denominator < 0.0 {
            return Err(ValueParseError {
                kind: crate::errors::ParseErrorKind::Custom(ValueParseErrorKind::InvalidRatio),
                location,
            });
        }
        Ok(Ratio { numerator, denominator })
    }
}

/// A `<length-percentage>` as used by gradient color-stop positions
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LengthPercentage {
    Length(Length),
    /// The unit value (1.0 = 100%)
    Percentage(f64),
}

impl LengthPercentage {
    fn parse<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Self, ValueParseError<'i>> {
        let token = parser.next()?;
        match token.token_type {
            ref token_type @ TokenType::Dimension { .. } => match Length::from_token(token_type) {
                Some(length) => Ok(LengthPercentage::Length(length)),
                None => Err(unexpected_value(token)),
            },
            TokenType::Percentage(value) => Ok(LengthPercentage::Percentage(value.value)),
            TokenType::Number(ref value) if value.value == 0.0 => {
                Ok(LengthPercentage::Length(Length::zero()))
            }
            _ => Err(unexpected_value(token)),
        }
    }
}

/// One gradient color stop: a color and an optional position
#[derive(Clone, Debug, PartialEq)]
pub struct ColorStop<'i> {
    pub color: Color<'i>,
    pub position: Option<LengthPercentage>,
}

impl<'i> ColorStop<'i> {
    fn parse<'t>(parser: &mut Parser<'i, 't>) -> Result<Self, ValueParseError<'i>> {
        let color = Color::parse(parser)?;
        let position = parser.try_parse(LengthPercentage::parse).ok();
        Ok(ColorStop { color, position })
    }
}

/// The direction prelude of a linear gradient
#[derive(Clone, Debug, PartialEq)]
pub enum GradientDirection<'i> {
    Angle(Angle),
    /// `to left`, `to top right`, ...
    To(Vec<Lexeme<'i>>),
}

impl<'i> GradientDirection<'i> {
    fn parse<'t>(parser: &mut Parser<'i, 't>) -> Result<Self, ValueParseError<'i>> {
        let token = parser.next()?;
        match token.token_type {
            ref token_type @ TokenType::Dimension { .. } => match Angle::from_token(token_type) {
                Some(angle) => Ok(GradientDirection::Angle(angle)),
                None => Err(unexpected_value(token)),
            },
            TokenType::Ident(ref name) if name.eq_ignore_ascii_case("to") => {
                let mut sides = vec![parser.expect_ident()?];
                if let Ok(side) = parser.try_parse(|p| p.expect_ident()) {
                    sides.push(side);
                }
                Ok(GradientDirection::To(sides))
            }
            _ => Err(unexpected_value(token)),
        }
    }
}

/// A minimal gradient value: direction / shape prelude plus color stops
#[derive(Clone, Debug, PartialEq)]
pub enum Gradient<'i> {
    Linear {
        direction: Option<GradientDirection<'i>>,
        stops: Vec<ColorStop<'i>>,
        repeating: bool,
    },
    Radial {
        /// The raw shape / size / position prelude, when present
        prelude: Option<Lexeme<'i>>,
        stops: Vec<ColorStop<'i>>,
        repeating: bool,
    },
}

impl<'i> Gradient<'i> {
    /// Parses the interior of a just-consumed gradient function token
    pub fn parse_function<'t>(
        parser: &mut Parser<'i, 't>,
        name: &str,
    ) -> Result<Self, ValueParseError<'i>> {
        log::trace!("parse_gradient");

        let (linear, repeating) = if name.eq_ignore_ascii_case("linear-gradient") {
            (true, false)
        } else if name.eq_ignore_ascii_case("repeating-linear-gradient") {
            (true, true)
        } else if name.eq_ignore_ascii_case("radial-gradient") {
            (false, false)
        } else if name.eq_ignore_ascii_case("repeating-radial-gradient") {
            (false, true)
        } else {
            return Err(ValueParseError {
                kind: crate::errors::ParseErrorKind::Custom(ValueParseErrorKind::InvalidGradient),
                location: parser.current_source_location(),
            });
        };

        enum Entry<'i> {
            Stop(ColorStop<'i>),
            Direction(GradientDirection<'i>),
            Prelude(Lexeme<'i>),
        }

        let location = parser.current_source_location();
        let entries = parser.parse_nested_block(|p| {
            p.parse_comma_separated(|p2| {
                let stop = p2.try_parse(|p3| -> Result<ColorStop<'i>, ValueParseError<'i>> {
                    let stop = ColorStop::parse(p3)?;
                    p3.expect_exhausted()?;
                    Ok(stop)
                });
                if let Ok(stop) = stop {
                    return Ok(Entry::Stop(stop));
                }
                if linear {
                    let direction = GradientDirection::parse(p2)?;
                    p2.expect_exhausted()?;
                    Ok(Entry::Direction(direction))
                } else {
                    let start = p2.position();
                    while p2.next().is_ok() {}
                    Ok(Entry::Prelude(Lexeme::Borrowed(p2.slice_from(start))))
                }
            })
        })?;

        let invalid = || ValueParseError {
            kind: crate::errors::ParseErrorKind::Custom(ValueParseErrorKind::InvalidGradient),
            location,
        };

        let mut direction = None;
        let mut prelude = None;
        let mut stops = Vec::new();
        for (index, entry) in entries.into_iter().enumerate() {
            match entry {
                Entry::Stop(stop) => stops.push(stop),
                Entry::Direction(d) if index == 0 => direction = Some(d),
                Entry::Prelude(p) if index == 0 => prelude = Some(p),
                _ => return Err(invalid()),
            }
        }
        if stops.len() < 2 {
            return Err(invalid());
        }

        Ok(if linear {
            Gradient::Linear { direction, stops, repeating }
        } else {
            Gradient::Radial { prelude, stops, repeating }
        })
    }
}

/// `<image>`: a url or a gradient
#[derive(Clone, Debug, PartialEq)]
pub enum Image<'i> {
    Url(Lexeme<'i>),
    Gradient(Box<Gradient<'i>>),
}

impl<'i> Image<'i> {
    pub fn parse<'t>(parser: &mut Parser<'i, 't>) -> Result<Self, ValueParseError<'i>> {
        log::trace!("parse_image");
        let token = parser.next()?;
        match token.token_type {
            TokenType::Url(url) => Ok(Image::Url(url)),
            TokenType::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                let url = parser.parse_nested_block(|p| {
                    let url = p.expect_string()?;
                    Ok(url)
                })?;
                Ok(Image::Url(url))
            }
            TokenType::Function(ref name) => {
                let name = name.as_str().to_ascii_lowercase();
                let gradient = Gradient::parse_function(parser, &name)?;
                Ok(Image::Gradient(Box::new(gradient)))
            }
            _ => Err(unexpected_value(token)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserInput;

    macro_rules! parse_value {
        ($input:expr, $parse:expr) => {{
            let mut parser_input = ParserInput::new($input);
            let mut parser = Parser::new(&mut parser_input);
            #[allow(clippy::redundant_closure_call)]
            let result = ($parse)(&mut parser);
            result
        }};
    }

    #[test]
    fn lengths() {
        let length = parse_value!("1.5em", Length::parse);
        assert_eq!(
            length.ok(),
            Some(DimensionValue::Literal(Length::new(1.5, LengthUnit::Em)))
        );

        let zero = parse_value!("0", Length::parse);
        assert_eq!(zero.ok(), Some(DimensionValue::Literal(Length::zero())));

        assert!(parse_value!("5", Length::parse).is_err());
        assert!(parse_value!("5deg", Length::parse).is_err());
    }

    #[test]
    fn lengths_through_calc() {
        let length = parse_value!("calc(2px * 3)", Length::parse);
        match length {
            Ok(DimensionValue::Calc(expr)) => {
                assert!(matches!(*expr, CalcExpr::Product(_, f) if f == 3.0));
            }
            other => panic!("expected calc, got {other:?}"),
        }
    }

    #[test]
    fn angles() {
        let angle = parse_value!("0.25turn", Angle::parse);
        match angle {
            Ok(DimensionValue::Literal(angle)) => assert_eq!(angle.to_degrees(), 90.0),
            other => panic!("expected an angle, got {other:?}"),
        }
        let angle = Angle::new(200.0, AngleUnit::Grad);
        assert_eq!(angle.to_degrees(), 180.0);
    }

    #[test]
    fn times_and_resolutions() {
        let time = parse_value!("200ms", Time::parse);
        assert!(matches!(
            time.ok(),
            Some(DimensionValue::Literal(Time { unit: TimeUnit::Ms, .. }))
        ));

        let resolution = parse_value!("2x", Resolution::parse);
        assert!(matches!(
            resolution.ok(),
            Some(DimensionValue::Literal(Resolution {
                unit: ResolutionUnit::Dppx,
                ..
            }))
        ));
    }

    #[test]
    fn ratios() {
        let ratio = parse_value!("16 / 9", Ratio::parse);
        assert_eq!(ratio.ok(), Some(Ratio { numerator: 16.0, denominator: 9.0 }));

        let ratio = parse_value!("2", Ratio::parse);
        assert_eq!(ratio.ok(), Some(Ratio { numerator: 2.0, denominator: 1.0 }));

        assert!(parse_value!("-1 / 2", Ratio::parse).is_err());
    }

    #[test]
    fn number_or_percentage() {
        let value = parse_value!("35%", NumberOrPercentage::parse);
        assert_eq!(value.ok(), Some(NumberOrPercentage::Percentage(0.35)));
    }

    #[test]
    fn images() {
        let image = parse_value!("url(cat.png)", Image::parse);
        assert!(matches!(image.ok(), Some(Image::Url(ref url)) if *url == "cat.png"));

        let image = parse_value!("linear-gradient(90deg, red 0%, blue 100%)", Image::parse);
        match image {
            Ok(Image::Gradient(gradient)) => match *gradient {
                Gradient::Linear { direction, stops, repeating } => {
                    assert!(matches!(direction, Some(GradientDirection::Angle(_))));
                    assert_eq!(stops.len(), 2);
                    assert_eq!(stops[0].position, Some(LengthPercentage::Percentage(0.0)));
                    assert!(!repeating);
                }
                other => panic!("expected a linear gradient, got {other:?}"),
            },
            other => panic!("expected a gradient, got {other:?}"),
        }
    }

    #[test]
    fn gradient_directions_and_errors() {
        let image = parse_value!("linear-gradient(to top right, red, blue)", Image::parse);
        match image {
            Ok(Image::Gradient(gradient)) => match *gradient {
                Gradient::Linear { direction: Some(GradientDirection::To(sides)), .. } => {
                    assert_eq!(sides.len(), 2);
                }
                other => panic!("expected a directed gradient, got {other:?}"),
            },
            other => panic!("expected a gradient, got {other:?}"),
        }

        let image = parse_value!("radial-gradient(circle at center, red, blue)", Image::parse);
        match image {
            Ok(Image::Gradient(gradient)) => match *gradient {
                Gradient::Radial { prelude: Some(_), stops, .. } => assert_eq!(stops.len(), 2),
                other => panic!("expected a radial gradient, got {other:?}"),
            },
            other => panic!("expected a gradient, got {other:?}"),
        }

        // a single stop is not a gradient
        assert!(parse_value!("linear-gradient(red)", Image::parse).is_err());
    }
}
