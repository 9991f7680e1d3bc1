//! Parser for [CSS Color Level 4](https://www.w3.org/TR/css-color-4/) values:
//! hex colors, named colors, and the legacy and modern function syntaxes for
//! `rgb()` / `hsl()` / `hwb()` / `lab()` / `lch()` / `oklab()` / `oklch()` /
//! `color()` / `device-cmyk()`.
//!
//! Modern components keep the `none` keyword distinct from `0`, so every
//! non-legacy component is an `Option`.

use crate::calc::{is_math_function, CalcExpr};
use crate::parser::Parser;
use crate::tokenizer::{Token, TokenType};
use crate::values::{AngleUnit, CssDimension, ValueParseError, ValueParseErrorKind};
use lazy_static::lazy_static;
use nimbra_shared::lexeme::Lexeme;
use std::fmt;

/// An entry of the named-color table
pub struct NamedColor {
    pub name: &'static str,
    pub rgb: (u8, u8, u8),
}

/// A `rgb()` / hex color. Channels are `None` only when the modern syntax
/// used the `none` keyword.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub red: Option<u8>,
    pub green: Option<u8>,
    pub blue: Option<u8>,
    /// In `[0, 1]`
    pub alpha: Option<f64>,
}

impl Rgba {
    #[must_use]
    pub fn new(red: u8, green: u8, blue: u8, alpha: f64) -> Self {
        Rgba {
            red: Some(red),
            green: Some(green),
            blue: Some(blue),
            alpha: Some(alpha.clamp(0.0, 1.0)),
        }
    }
}

/// `hsl()`. Saturation and lightness are unit values (1.0 = 100%).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    /// Degrees, normalized into `[0, 360)`
    pub hue: Option<f64>,
    pub saturation: Option<f64>,
    pub lightness: Option<f64>,
    pub alpha: Option<f64>,
}

/// `hwb()`. Whiteness and blackness are unit values (1.0 = 100%).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hwb {
    pub hue: Option<f64>,
    pub whiteness: Option<f64>,
    pub blackness: Option<f64>,
    pub alpha: Option<f64>,
}

/// `lab()`: `100% = 100` for L, `100% = 125` for a and b
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lab {
    pub lightness: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub alpha: Option<f64>,
}

/// `lch()`: `100% = 100` for L, `100% = 150` for chroma
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lch {
    pub lightness: Option<f64>,
    pub chroma: Option<f64>,
    pub hue: Option<f64>,
    pub alpha: Option<f64>,
}

/// `oklab()`: `100% = 1.0` for L, `100% = 0.4` for a and b
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Oklab {
    pub lightness: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub alpha: Option<f64>,
}

/// `oklch()`: `100% = 1.0` for L, `100% = 0.4` for chroma
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Oklch {
    pub lightness: Option<f64>,
    pub chroma: Option<f64>,
    pub hue: Option<f64>,
    pub alpha: Option<f64>,
}

/// The predefined color spaces accepted by `color()`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredefinedColorSpace {
    Srgb,
    SrgbLinear,
    DisplayP3,
    A98Rgb,
    ProphotoRgb,
    Rec2020,
    XyzD50,
    XyzD65,
}

impl PredefinedColorSpace {
    fn from_name(name: &str) -> Option<Self> {
        const SPACES: &[(&str, PredefinedColorSpace)] = &[
            ("srgb", PredefinedColorSpace::Srgb),
            ("srgb-linear", PredefinedColorSpace::SrgbLinear),
            ("display-p3", PredefinedColorSpace::DisplayP3),
            ("a98-rgb", PredefinedColorSpace::A98Rgb),
            ("prophoto-rgb", PredefinedColorSpace::ProphotoRgb),
            ("rec2020", PredefinedColorSpace::Rec2020),
            ("xyz-d50", PredefinedColorSpace::XyzD50),
            ("xyz-d65", PredefinedColorSpace::XyzD65),
            ("xyz", PredefinedColorSpace::XyzD65),
        ];
        SPACES
            .iter()
            .find(|(n, _)| name.eq_ignore_ascii_case(n))
            .map(|(_, space)| *space)
    }
}

impl fmt::Display for PredefinedColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredefinedColorSpace::Srgb => "srgb",
            PredefinedColorSpace::SrgbLinear => "srgb-linear",
            PredefinedColorSpace::DisplayP3 => "display-p3",
            PredefinedColorSpace::A98Rgb => "a98-rgb",
            PredefinedColorSpace::ProphotoRgb => "prophoto-rgb",
            PredefinedColorSpace::Rec2020 => "rec2020",
            PredefinedColorSpace::XyzD50 => "xyz-d50",
            PredefinedColorSpace::XyzD65 => "xyz-d65",
        };
        f.write_str(name)
    }
}

/// `color()` with a predefined color space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorFunction {
    pub color_space: PredefinedColorSpace,
    pub c1: Option<f64>,
    pub c2: Option<f64>,
    pub c3: Option<f64>,
    pub alpha: Option<f64>,
}

/// `device-cmyk()`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceCmyk {
    pub cyan: Option<f64>,
    pub magenta: Option<f64>,
    pub yellow: Option<f64>,
    pub black: Option<f64>,
    pub alpha: Option<f64>,
}

/// `color()` with a `--custom` color space
#[derive(Clone, Debug, PartialEq)]
pub struct CustomColorSpace<'i> {
    pub name: Lexeme<'i>,
    pub components: Vec<Option<f64>>,
    pub alpha: Option<f64>,
}

/// A parsed CSS color value
#[derive(Clone, Debug, PartialEq)]
pub enum Color<'i> {
    CurrentColor,
    Rgba(Rgba),
    Hsl(Hsl),
    Hwb(Hwb),
    Lab(Lab),
    Lch(Lch),
    Oklab(Oklab),
    Oklch(Oklch),
    ColorFunction(ColorFunction),
    DeviceCmyk(DeviceCmyk),
    CustomColorSpace(CustomColorSpace<'i>),
}

fn unexpected_color<'i>(token: Token<'i>) -> ValueParseError<'i> {
    let location = token.location;
    ValueParseError {
        kind: crate::errors::ParseErrorKind::Custom(ValueParseErrorKind::UnexpectedColorToken(
            token,
        )),
        location,
    }
}

fn color_error<'i>(parser: &Parser<'i, '_>, kind: ValueParseErrorKind<'i>) -> ValueParseError<'i> {
    ValueParseError {
        kind: crate::errors::ParseErrorKind::Custom(kind),
        location: parser.current_source_location(),
    }
}

impl<'i> Color<'i> {
    /// Parses a `<color>` value
    pub fn parse<'t>(parser: &mut Parser<'i, 't>) -> Result<Color<'i>, ValueParseError<'i>> {
        log::trace!("parse_color");

        let token = parser.next()?;
        match token.token_type {
            TokenType::Hash(ref value) | TokenType::IDHash(ref value) => {
                match parse_hash_color(value) {
                    Some(rgba) => Ok(Color::Rgba(rgba)),
                    None => Err(unexpected_color(token.clone())),
                }
            }
            TokenType::Ident(ref name) => {
                if name.eq_ignore_ascii_case("currentcolor") {
                    Ok(Color::CurrentColor)
                } else if name.eq_ignore_ascii_case("transparent") {
                    Ok(Color::Rgba(Rgba::new(0, 0, 0, 0.0)))
                } else {
                    match named_color(name) {
                        Some(rgba) => Ok(Color::Rgba(rgba)),
                        None => Err(unexpected_color(token.clone())),
                    }
                }
            }
            TokenType::Function(ref name) => {
                let lower = name.as_str().to_ascii_lowercase();
                parse_color_function(parser, &lower, &token)
            }
            _ => Err(unexpected_color(token)),
        }
    }

    /// Converts to RGBA where the core knows the conversion (rgb, hsl, hwb);
    /// `none` components convert as zero
    #[must_use]
    pub fn to_rgba(&self) -> Option<Rgba> {
        match self {
            Color::Rgba(rgba) => Some(*rgba),
            Color::Hsl(hsl) => {
                let (r, g, b) = hsl_to_rgb(
                    hsl.hue.unwrap_or(0.0),
                    hsl.saturation.unwrap_or(0.0).clamp(0.0, 1.0),
                    hsl.lightness.unwrap_or(0.0).clamp(0.0, 1.0),
                );
                Some(Rgba::new(
                    unit_to_u8(r),
                    unit_to_u8(g),
                    unit_to_u8(b),
                    hsl.alpha.unwrap_or(1.0),
                ))
            }
            Color::Hwb(hwb) => {
                let (r, g, b) = hwb_to_rgb(
                    hwb.hue.unwrap_or(0.0),
                    hwb.whiteness.unwrap_or(0.0).clamp(0.0, 1.0),
                    hwb.blackness.unwrap_or(0.0).clamp(0.0, 1.0),
                );
                Some(Rgba::new(
                    unit_to_u8(r),
                    unit_to_u8(g),
                    unit_to_u8(b),
                    hwb.alpha.unwrap_or(1.0),
                ))
            }
            _ => None,
        }
    }
}

/// A color component before its per-function scaling is applied
enum ColorComponent {
    Number(f64),
    /// The unit value (1.0 = 100%)
    Percentage(f64),
    None,
}

fn parse_component<'i, 't>(
    parser: &mut Parser<'i, 't>,
) -> Result<ColorComponent, ValueParseError<'i>> {
    let token = parser.next()?;
    match token.token_type {
        TokenType::Number(value) => Ok(ColorComponent::Number(value.value)),
        TokenType::Percentage(value) => Ok(ColorComponent::Percentage(value.value)),
        TokenType::Ident(ref name) if name.eq_ignore_ascii_case("none") => Ok(ColorComponent::None),
        TokenType::Function(ref name) if is_math_function(name) => {
            let lower = name.as_str().to_ascii_lowercase();
            let expr = CalcExpr::<CssDimension>::parse_math_function(parser, &lower)?;
            match expr {
                CalcExpr::Number(value) => Ok(ColorComponent::Number(value)),
                CalcExpr::Value(CssDimension::Percentage(value)) => {
                    Ok(ColorComponent::Percentage(value))
                }
                _ => Err(ValueParseError {
                    kind: crate::errors::ParseErrorKind::Custom(
                        ValueParseErrorKind::InvalidCalcExpression,
                    ),
                    location: token.location,
                }),
            }
        }
        _ => Err(unexpected_color(token)),
    }
}

/// `<hue>`: an angle, a plain number of degrees, or `none`; normalized into
/// `[0, 360)`
fn parse_hue<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Option<f64>, ValueParseError<'i>> {
    let token = parser.next()?;
    match token.token_type {
        TokenType::Number(value) => Ok(Some(normalize_hue(value.value))),
        TokenType::Dimension { value, ref unit } => match AngleUnit::from_name(unit) {
            Some(unit) => Ok(Some(normalize_hue(
                crate::values::Angle::new(value.value, unit).to_degrees(),
            ))),
            None => Err(unexpected_color(token.clone())),
        },
        TokenType::Ident(ref name) if name.eq_ignore_ascii_case("none") => Ok(None),
        TokenType::Function(ref name) if is_math_function(name) => {
            let lower = name.as_str().to_ascii_lowercase();
            let expr = CalcExpr::<CssDimension>::parse_math_function(parser, &lower)?;
            match expr {
                CalcExpr::Number(value) => Ok(Some(normalize_hue(value))),
                CalcExpr::Value(CssDimension::Angle(angle)) => {
                    Ok(Some(normalize_hue(angle.to_degrees())))
                }
                _ => Err(ValueParseError {
                    kind: crate::errors::ParseErrorKind::Custom(
                        ValueParseErrorKind::InvalidCalcExpression,
                    ),
                    location: token.location,
                }),
            }
        }
        _ => Err(unexpected_color(token)),
    }
}

fn normalize_hue(degrees: f64) -> f64 {
    degrees.rem_euclid(360.0)
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn unit_to_u8(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Legacy (comma) components must all be the same flavor and never `none`
fn parse_legacy_number<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<f64, ValueParseError<'i>> {
    match parse_component(parser)? {
        ColorComponent::Number(value) => Ok(value),
        ColorComponent::Percentage(_) => {
            Err(color_error(parser, ValueParseErrorKind::MixedColorSyntax))
        }
        ColorComponent::None => Err(color_error(parser, ValueParseErrorKind::NoneInLegacyColor)),
    }
}

fn parse_legacy_percentage<'i, 't>(
    parser: &mut Parser<'i, 't>,
) -> Result<f64, ValueParseError<'i>> {
    match parse_component(parser)? {
        ColorComponent::Percentage(value) => Ok(value),
        ColorComponent::Number(_) => {
            Err(color_error(parser, ValueParseErrorKind::MixedColorSyntax))
        }
        ColorComponent::None => Err(color_error(parser, ValueParseErrorKind::NoneInLegacyColor)),
    }
}

/// `, <alpha>` when present; legacy alpha accepts a number or a percentage
fn parse_legacy_alpha<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<f64, ValueParseError<'i>> {
    if parser.try_parse(|p| p.expect_comma()).is_ok() {
        match parse_component(parser)? {
            ColorComponent::Number(value) => Ok(clamp_unit(value)),
            ColorComponent::Percentage(value) => Ok(clamp_unit(value)),
            ColorComponent::None => Err(color_error(parser, ValueParseErrorKind::NoneInLegacyColor)),
        }
    } else {
        Ok(1.0)
    }
}

/// `/ <alpha>` when present; `none` stays distinct from opaque
fn parse_modern_alpha<'i, 't>(
    parser: &mut Parser<'i, 't>,
) -> Result<Option<f64>, ValueParseError<'i>> {
    if parser.try_parse(|p| p.expect_delim('/')).is_ok() {
        match parse_component(parser)? {
            ColorComponent::Number(value) => Ok(Some(clamp_unit(value))),
            ColorComponent::Percentage(value) => Ok(Some(clamp_unit(value))),
            ColorComponent::None => Ok(None),
        }
    } else {
        Ok(Some(1.0))
    }
}

fn rgb_channel(component: ColorComponent) -> Option<u8> {
    match component {
        ColorComponent::Number(value) => Some(value.round().clamp(0.0, 255.0) as u8),
        ColorComponent::Percentage(value) => Some((value * 255.0).round().clamp(0.0, 255.0) as u8),
        ColorComponent::None => None,
    }
}

fn parse_color_function<'i, 't>(
    parser: &mut Parser<'i, 't>,
    name: &str,
    function_token: &Token<'i>,
) -> Result<Color<'i>, ValueParseError<'i>> {
    match name {
        "rgb" | "rgba" => parser.parse_nested_block(parse_rgb),
        "hsl" | "hsla" => parser.parse_nested_block(parse_hsl),
        "hwb" => parser.parse_nested_block(parse_hwb),
        "lab" => parser.parse_nested_block(|p| parse_lab_like(p, 100.0, 125.0).map(
            |(lightness, a, b, alpha)| Color::Lab(Lab { lightness, a, b, alpha }),
        )),
        "oklab" => parser.parse_nested_block(|p| parse_lab_like(p, 1.0, 0.4).map(
            |(lightness, a, b, alpha)| Color::Oklab(Oklab { lightness, a, b, alpha }),
        )),
        "lch" => parser.parse_nested_block(|p| parse_lch_like(p, 100.0, 150.0).map(
            |(lightness, chroma, hue, alpha)| Color::Lch(Lch { lightness, chroma, hue, alpha }),
        )),
        "oklch" => parser.parse_nested_block(|p| parse_lch_like(p, 1.0, 0.4).map(
            |(lightness, chroma, hue, alpha)| Color::Oklch(Oklch { lightness, chroma, hue, alpha }),
        )),
        "color" => parser.parse_nested_block(parse_color_space),
        "device-cmyk" => parser.parse_nested_block(parse_device_cmyk),
        _ => Err(unexpected_color(function_token.clone())),
    }
}

fn parse_rgb<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Color<'i>, ValueParseError<'i>> {
    let first = parse_component(parser)?;

    // after the first non-`none` component, a comma selects the legacy syntax
    let legacy = !matches!(first, ColorComponent::None)
        && parser.try_parse(|p| p.expect_comma()).is_ok();

    if legacy {
        let (red, green, blue) = match first {
            ColorComponent::Number(red) => {
                let green = parse_legacy_number(parser)?;
                parser.expect_comma()?;
                let blue = parse_legacy_number(parser)?;
                (
                    rgb_channel(ColorComponent::Number(red)),
                    rgb_channel(ColorComponent::Number(green)),
                    rgb_channel(ColorComponent::Number(blue)),
                )
            }
            ColorComponent::Percentage(red) => {
                let green = parse_legacy_percentage(parser)?;
                parser.expect_comma()?;
                let blue = parse_legacy_percentage(parser)?;
                (
                    rgb_channel(ColorComponent::Percentage(red)),
                    rgb_channel(ColorComponent::Percentage(green)),
                    rgb_channel(ColorComponent::Percentage(blue)),
                )
            }
            ColorComponent::None => unreachable!(),
        };
        let alpha = parse_legacy_alpha(parser)?;
        return Ok(Color::Rgba(Rgba {
            red,
            green,
            blue,
            alpha: Some(alpha),
        }));
    }

    let second = parse_component(parser)?;
    let third = parse_component(parser)?;
    let alpha = parse_modern_alpha(parser)?;
    Ok(Color::Rgba(Rgba {
        red: rgb_channel(first),
        green: rgb_channel(second),
        blue: rgb_channel(third),
        alpha,
    }))
}

/// Saturation-like components: a percentage, or in modern syntax a number
/// treated as a percentage
fn unit_component(component: ColorComponent) -> Option<f64> {
    match component {
        ColorComponent::Number(value) => Some(value / 100.0),
        ColorComponent::Percentage(value) => Some(value),
        ColorComponent::None => None,
    }
}

fn parse_hsl<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Color<'i>, ValueParseError<'i>> {
    let hue = parse_hue(parser)?;

    let legacy = hue.is_some() && parser.try_parse(|p| p.expect_comma()).is_ok();
    if legacy {
        let saturation = parse_legacy_percentage(parser)?;
        parser.expect_comma()?;
        let lightness = parse_legacy_percentage(parser)?;
        let alpha = parse_legacy_alpha(parser)?;
        return Ok(Color::Hsl(Hsl {
            hue,
            saturation: Some(saturation),
            lightness: Some(lightness),
            alpha: Some(alpha),
        }));
    }

    let saturation = unit_component(parse_component(parser)?);
    let lightness = unit_component(parse_component(parser)?);
    let alpha = parse_modern_alpha(parser)?;
    Ok(Color::Hsl(Hsl {
        hue,
        saturation,
        lightness,
        alpha,
    }))
}

fn parse_hwb<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Color<'i>, ValueParseError<'i>> {
    let hue = parse_hue(parser)?;
    let whiteness = unit_component(parse_component(parser)?);
    let blackness = unit_component(parse_component(parser)?);
    let alpha = parse_modern_alpha(parser)?;
    Ok(Color::Hwb(Hwb {
        hue,
        whiteness,
        blackness,
        alpha,
    }))
}

/// Applies the per-function percentage scale; numbers pass through
fn scaled_component(component: ColorComponent, scale: f64) -> Option<f64> {
    match component {
        ColorComponent::Number(value) => Some(value),
        ColorComponent::Percentage(value) => Some(value * scale),
        ColorComponent::None => None,
    }
}

type LabComponents = (Option<f64>, Option<f64>, Option<f64>, Option<f64>);

fn parse_lab_like<'i, 't>(
    parser: &mut Parser<'i, 't>,
    l_scale: f64,
    ab_scale: f64,
) -> Result<LabComponents, ValueParseError<'i>> {
    let lightness = scaled_component(parse_component(parser)?, l_scale);
    let a = scaled_component(parse_component(parser)?, ab_scale);
    let b = scaled_component(parse_component(parser)?, ab_scale);
    let alpha = parse_modern_alpha(parser)?;
    Ok((lightness, a, b, alpha))
}

fn parse_lch_like<'i, 't>(
    parser: &mut Parser<'i, 't>,
    l_scale: f64,
    chroma_scale: f64,
) -> Result<LabComponents, ValueParseError<'i>> {
    let lightness = scaled_component(parse_component(parser)?, l_scale);
    let chroma = scaled_component(parse_component(parser)?, chroma_scale);
    let hue = parse_hue(parser)?;
    let alpha = parse_modern_alpha(parser)?;
    Ok((lightness, chroma, hue, alpha))
}

/// `color()`: a color-space ident, 3 components for predefined spaces, 4 for
/// `--custom` spaces, then an optional alpha
fn parse_color_space<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Color<'i>, ValueParseError<'i>> {
    let token = parser.next()?;
    let name = match token.token_type {
        TokenType::Ident(ref name) => name.clone(),
        _ => return Err(unexpected_color(token)),
    };

    if name.starts_with("--") {
        let mut components = Vec::with_capacity(4);
        for _ in 0..4 {
            components.push(scaled_component(parse_component(parser)?, 1.0));
        }
        let alpha = parse_modern_alpha(parser)?;
        return Ok(Color::CustomColorSpace(CustomColorSpace {
            name,
            components,
            alpha,
        }));
    }

    let color_space = match PredefinedColorSpace::from_name(&name) {
        Some(space) => space,
        None => return Err(unexpected_color(token)),
    };
    let c1 = scaled_component(parse_component(parser)?, 1.0);
    let c2 = scaled_component(parse_component(parser)?, 1.0);
    let c3 = scaled_component(parse_component(parser)?, 1.0);
    let alpha = parse_modern_alpha(parser)?;
    Ok(Color::ColorFunction(ColorFunction {
        color_space,
        c1,
        c2,
        c3,
        alpha,
    }))
}

/// `device-cmyk()`: legacy (comma) syntax takes numbers only; modern syntax
/// takes numbers, percentages or `none`
fn parse_device_cmyk<'i, 't>(
    parser: &mut Parser<'i, 't>,
) -> Result<Color<'i>, ValueParseError<'i>> {
    let first = parse_component(parser)?;

    let legacy = !matches!(first, ColorComponent::None)
        && parser.try_parse(|p| p.expect_comma()).is_ok();

    if legacy {
        let cyan = match first {
            ColorComponent::Number(value) => Some(value),
            ColorComponent::Percentage(_) => {
                return Err(color_error(parser, ValueParseErrorKind::MixedColorSyntax))
            }
            ColorComponent::None => unreachable!(),
        };
        let magenta = Some(parse_legacy_number(parser)?);
        parser.expect_comma()?;
        let yellow = Some(parse_legacy_number(parser)?);
        parser.expect_comma()?;
        let black = Some(parse_legacy_number(parser)?);
        let alpha = parse_legacy_alpha(parser)?;
        return Ok(Color::DeviceCmyk(DeviceCmyk {
            cyan,
            magenta,
            yellow,
            black,
            alpha: Some(alpha),
        }));
    }

    let cyan = scaled_component(first, 1.0);
    let magenta = scaled_component(parse_component(parser)?, 1.0);
    let yellow = scaled_component(parse_component(parser)?, 1.0);
    let black = scaled_component(parse_component(parser)?, 1.0);
    let alpha = parse_modern_alpha(parser)?;
    Ok(Color::DeviceCmyk(DeviceCmyk {
        cyan,
        magenta,
        yellow,
        black,
        alpha,
    }))
}

/// `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`. Short digits expand via `×17`.
fn parse_hash_color(hex: &str) -> Option<Rgba> {
    fn digit(byte: u8) -> Option<u32> {
        (byte as char).to_digit(16)
    }
    fn pair(bytes: &[u8], index: usize) -> Option<u8> {
        Some((digit(bytes[index])? * 16 + digit(bytes[index + 1])?) as u8)
    }

    let bytes = hex.as_bytes();
    match bytes.len() {
        3 | 4 => {
            let red = (digit(bytes[0])? * 17) as u8;
            let green = (digit(bytes[1])? * 17) as u8;
            let blue = (digit(bytes[2])? * 17) as u8;
            let alpha = if bytes.len() == 4 {
                (digit(bytes[3])? * 17) as f64 / 255.0
            } else {
                1.0
            };
            Some(Rgba::new(red, green, blue, alpha))
        }
        6 | 8 => {
            let red = pair(bytes, 0)?;
            let green = pair(bytes, 2)?;
            let blue = pair(bytes, 4)?;
            let alpha = if bytes.len() == 8 {
                f64::from(pair(bytes, 6)?) / 255.0
            } else {
                1.0
            };
            Some(Rgba::new(red, green, blue, alpha))
        }
        _ => None,
    }
}

/// ASCII case-insensitive lookup in the named-color table
fn named_color(name: &str) -> Option<Rgba> {
    CSS_COLORNAMES
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(name))
        .map(|entry| Rgba::new(entry.rgb.0, entry.rgb.1, entry.rgb.2, 1.0))
}

/// [hsl to rgb](https://www.w3.org/TR/css-color-4/#hsl-to-rgb); saturation
/// and lightness are unit values, the result channels are unit values
fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (f64, f64, f64) {
    let f = |n: f64| {
        let k = (n + hue / 30.0).rem_euclid(12.0);
        let a = saturation * lightness.min(1.0 - lightness);
        lightness - a * (k - 3.0).min(9.0 - k).min(1.0).max(-1.0)
    };
    (f(0.0), f(8.0), f(4.0))
}

/// [hwb to rgb](https://www.w3.org/TR/css-color-4/#hwb-to-rgb)
fn hwb_to_rgb(hue: f64, whiteness: f64, blackness: f64) -> (f64, f64, f64) {
    if whiteness + blackness >= 1.0 {
        let gray = whiteness / (whiteness + blackness);
        return (gray, gray, gray);
    }
    let (r, g, b) = hsl_to_rgb(hue, 1.0, 0.5);
    let scale = |channel: f64| channel * (1.0 - whiteness - blackness) + whiteness;
    (scale(r), scale(g), scale(b))
}

fn write_component(f: &mut fmt::Formatter<'_>, component: Option<f64>) -> fmt::Result {
    match component {
        Some(value) => write!(f, "{value}"),
        None => f.write_str("none"),
    }
}

fn write_u8_component(f: &mut fmt::Formatter<'_>, component: Option<u8>) -> fmt::Result {
    match component {
        Some(value) => write!(f, "{value}"),
        None => f.write_str("none"),
    }
}

fn write_modern_alpha(f: &mut fmt::Formatter<'_>, alpha: Option<f64>) -> fmt::Result {
    match alpha {
        Some(value) if value == 1.0 => Ok(()),
        Some(value) => write!(f, " / {value}"),
        None => f.write_str(" / none"),
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let has_none =
            self.red.is_none() || self.green.is_none() || self.blue.is_none() || self.alpha.is_none();
        if has_none {
            // only the modern syntax can express `none`
            f.write_str("rgb(")?;
            write_u8_component(f, self.red)?;
            f.write_str(" ")?;
            write_u8_component(f, self.green)?;
            f.write_str(" ")?;
            write_u8_component(f, self.blue)?;
            write_modern_alpha(f, self.alpha)?;
            return f.write_str(")");
        }
        let (red, green, blue) = (
            self.red.unwrap_or(0),
            self.green.unwrap_or(0),
            self.blue.unwrap_or(0),
        );
        match self.alpha {
            Some(alpha) if alpha != 1.0 => write!(f, "rgba({red}, {green}, {blue}, {alpha})"),
            _ => write!(f, "rgb({red}, {green}, {blue})"),
        }
    }
}

impl fmt::Display for Color<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::CurrentColor => f.write_str("currentcolor"),
            Color::Rgba(rgba) => write!(f, "{rgba}"),
            Color::Hsl(hsl) => {
                f.write_str("hsl(")?;
                write_component(f, hsl.hue)?;
                f.write_str(" ")?;
                write_component(f, hsl.saturation.map(|v| v * 100.0))?;
                if hsl.saturation.is_some() {
                    f.write_str("%")?;
                }
                f.write_str(" ")?;
                write_component(f, hsl.lightness.map(|v| v * 100.0))?;
                if hsl.lightness.is_some() {
                    f.write_str("%")?;
                }
                write_modern_alpha(f, hsl.alpha)?;
                f.write_str(")")
            }
            Color::Hwb(hwb) => {
                f.write_str("hwb(")?;
                write_component(f, hwb.hue)?;
                f.write_str(" ")?;
                write_component(f, hwb.whiteness.map(|v| v * 100.0))?;
                if hwb.whiteness.is_some() {
                    f.write_str("%")?;
                }
                f.write_str(" ")?;
                write_component(f, hwb.blackness.map(|v| v * 100.0))?;
                if hwb.blackness.is_some() {
                    f.write_str("%")?;
                }
                write_modern_alpha(f, hwb.alpha)?;
                f.write_str(")")
            }
            Color::Lab(lab) => {
                f.write_str("lab(")?;
                write_component(f, lab.lightness)?;
                f.write_str(" ")?;
                write_component(f, lab.a)?;
                f.write_str(" ")?;
                write_component(f, lab.b)?;
                write_modern_alpha(f, lab.alpha)?;
                f.write_str(")")
            }
            Color::Lch(lch) => {
                f.write_str("lch(")?;
                write_component(f, lch.lightness)?;
                f.write_str(" ")?;
                write_component(f, lch.chroma)?;
                f.write_str(" ")?;
                write_component(f, lch.hue)?;
                write_modern_alpha(f, lch.alpha)?;
                f.write_str(")")
            }
            Color::Oklab(oklab) => {
                f.write_str("oklab(")?;
                write_component(f, oklab.lightness)?;
                f.write_str(" ")?;
                write_component(f, oklab.a)?;
                f.write_str(" ")?;
                write_component(f, oklab.b)?;
                write_modern_alpha(f, oklab.alpha)?;
                f.write_str(")")
            }
            Color::Oklch(oklch) => {
                f.write_str("oklch(")?;
                write_component(f, oklch.lightness)?;
                f.write_str(" ")?;
                write_component(f, oklch.chroma)?;
                f.write_str(" ")?;
                write_component(f, oklch.hue)?;
                write_modern_alpha(f, oklch.alpha)?;
                f.write_str(")")
            }
            Color::ColorFunction(color) => {
                write!(f, "color({}", color.color_space)?;
                for component in [color.c1, color.c2, color.c3] {
                    f.write_str(" ")?;
                    write_component(f, component)?;
                }
                write_modern_alpha(f, color.alpha)?;
                f.write_str(")")
            }
            Color::DeviceCmyk(cmyk) => {
                f.write_str("device-cmyk(")?;
                for (index, component) in
                    [cmyk.cyan, cmyk.magenta, cmyk.yellow, cmyk.black].into_iter().enumerate()
                {
                    if index > 0 {
                        f.write_str(" ")?;
                    }
                    write_component(f, component)?;
                }
                write_modern_alpha(f, cmyk.alpha)?;
                f.write_str(")")
            }
            Color::CustomColorSpace(custom) => {
                write!(f, "color({}", custom.name)?;
                for component in &custom.components {
                    f.write_str(" ")?;
                    write_component(f, *component)?;
                }
                write_modern_alpha(f, custom.alpha)?;
                f.write_str(")")
            }
        }
    }
}

lazy_static! {
    /// The CSS Level 4 named colors
    pub static ref CSS_COLORNAMES: &'static [NamedColor] = &[
        NamedColor {
            name: "aliceblue",
            rgb: (240, 248, 255),
        },
        NamedColor {
            name: "antiquewhite",
            rgb: (250, 235, 215),
        },
        NamedColor {
            name: "aqua",
            rgb: (0, 255, 255),
        },
        NamedColor {
            name: "aquamarine",
            rgb: (127, 255, 212),
        },
        NamedColor {
            name: "azure",
            rgb: (240, 255, 255),
        },
        NamedColor {
            name: "beige",
            rgb: (245, 245, 220),
        },
        NamedColor {
            name: "bisque",
            rgb: (255, 228, 196),
        },
        NamedColor {
            name: "black",
            rgb: (0, 0, 0),
        },
        NamedColor {
            name: "blanchedalmond",
            rgb: (255, 235, 205),
        },
        NamedColor {
            name: "blue",
            rgb: (0, 0, 255),
        },
        NamedColor {
            name: "blueviolet",
            rgb: (138, 43, 226),
        },
        NamedColor {
            name: "brown",
            rgb: (165, 42, 42),
        },
        NamedColor {
            name: "burlywood",
            rgb: (222, 184, 135),
        },
        NamedColor {
            name: "cadetblue",
            rgb: (95, 158, 160),
        },
        NamedColor {
            name: "chartreuse",
            rgb: (127, 255, 0),
        },
        NamedColor {
            name: "chocolate",
            rgb: (210, 105, 30),
        },
        NamedColor {
            name: "coral",
            rgb: (255, 127, 80),
        },
        NamedColor {
            name: "cornflowerblue",
            rgb: (100, 149, 237),
        },
        NamedColor {
            name: "cornsilk",
            rgb: (255, 248, 220),
        },
        NamedColor {
            name: "crimson",
            rgb: (220, 20, 60),
        },
        NamedColor {
            name: "cyan",
            rgb: (0, 255, 255),
        },
        NamedColor {
            name: "darkblue",
            rgb: (0, 0, 139),
        },
        NamedColor {
            name: "darkcyan",
            rgb: (0, 139, 139),
        },
        NamedColor {
            name: "darkgoldenrod",
            rgb: (184, 134, 11),
        },
        NamedColor {
            name: "darkgray",
            rgb: (169, 169, 169),
        },
        NamedColor {
            name: "darkgreen",
            rgb: (0, 100, 0),
        },
        NamedColor {
            name: "darkgrey",
            rgb: (169, 169, 169),
        },
        NamedColor {
            name: "darkkhaki",
            rgb: (189, 183, 107),
        },
        NamedColor {
            name: "darkmagenta",
            rgb: (139, 0, 139),
        },
        NamedColor {
            name: "darkolivegreen",
            rgb: (85, 107, 47),
        },
        NamedColor {
            name: "darkorange",
            rgb: (255, 140, 0),
        },
        NamedColor {
            name: "darkorchid",
            rgb: (153, 50, 204),
        },
        NamedColor {
            name: "darkred",
            rgb: (139, 0, 0),
        },
        NamedColor {
            name: "darksalmon",
            rgb: (233, 150, 122),
        },
        NamedColor {
            name: "darkseagreen",
            rgb: (143, 188, 143),
        },
        NamedColor {
            name: "darkslateblue",
            rgb: (72, 61, 139),
        },
        NamedColor {
            name: "darkslategray",
            rgb: (47, 79, 79),
        },
        NamedColor {
            name: "darkslategrey",
            rgb: (47, 79, 79),
        },
        NamedColor {
            name: "darkturquoise",
            rgb: (0, 206, 209),
        },
        NamedColor {
            name: "darkviolet",
            rgb: (148, 0, 211),
        },
        NamedColor {
            name: "deeppink",
            rgb: (255, 20, 147),
        },
        NamedColor {
            name: "deepskyblue",
            rgb: (0, 191, 255),
        },
        NamedColor {
            name: "dimgray",
            rgb: (105, 105, 105),
        },
        NamedColor {
            name: "dimgrey",
            rgb: (105, 105, 105),
        },
        NamedColor {
            name: "dodgerblue",
            rgb: (30, 144, 255),
        },
        NamedColor {
            name: "firebrick",
            rgb: (178, 34, 34),
        },
        NamedColor {
            name: "floralwhite",
            rgb: (255, 250, 240),
        },
        NamedColor {
            name: "forestgreen",
            rgb: (34, 139, 34),
        },
        NamedColor {
            name: "fuchsia",
            rgb: (255, 0, 255),
        },
        NamedColor {
            name: "gainsboro",
            rgb: (220, 220, 220),
        },
        NamedColor {
            name: "ghostwhite",
            rgb: (248, 248, 255),
        },
        NamedColor {
            name: "gold",
            rgb: (255, 215, 0),
        },
        NamedColor {
            name: "goldenrod",
            rgb: (218, 165, 32),
        },
        NamedColor {
            name: "gray",
            rgb: (128, 128, 128),
        },
        NamedColor {
            name: "green",
            rgb: (0, 128, 0),
        },
        NamedColor {
            name: "greenyellow",
            rgb: (173, 255, 47),
        },
        NamedColor {
            name: "grey",
            rgb: (128, 128, 128),
        },
        NamedColor {
            name: "honeydew",
            rgb: (240, 255, 240),
        },
        NamedColor {
            name: "hotpink",
            rgb: (255, 105, 180),
        },
        NamedColor {
            name: "indianred",
            rgb: (205, 92, 92),
        },
        NamedColor {
            name: "indigo",
            rgb: (75, 0, 130),
        },
        NamedColor {
            name: "ivory",
            rgb: (255, 255, 240),
        },
        NamedColor {
            name: "khaki",
            rgb: (240, 230, 140),
        },
        NamedColor {
            name: "lavender",
            rgb: (230, 230, 250),
        },
        NamedColor {
            name: "lavenderblush",
            rgb: (255, 240, 245),
        },
        NamedColor {
            name: "lawngreen",
            rgb: (124, 252, 0),
        },
        NamedColor {
            name: "lemonchiffon",
            rgb: (255, 250, 205),
        },
        NamedColor {
            name: "lightblue",
            rgb: (173, 216, 230),
        },
        NamedColor {
            name: "lightcoral",
            rgb: (240, 128, 128),
        },
        NamedColor {
            name: "lightcyan",
            rgb: (224, 255, 255),
        },
        NamedColor {
            name: "lightgoldenrodyellow",
            rgb: (250, 250, 210),
        },
        NamedColor {
            name: "lightgray",
            rgb: (211, 211, 211),
        },
        NamedColor {
            name: "lightgreen",
            rgb: (144, 238, 144),
        },
        NamedColor {
            name: "lightgrey",
            rgb: (211, 211, 211),
        },
        NamedColor {
            name: "lightpink",
            rgb: (255, 182, 193),
        },
        NamedColor {
            name: "lightsalmon",
            rgb: (255, 160, 122),
        },
        NamedColor {
            name: "lightseagreen",
            rgb: (32, 178, 170),
        },
        NamedColor {
            name: "lightskyblue",
            rgb: (135, 206, 250),
        },
        NamedColor {
            name: "lightslategray",
            rgb: (119, 136, 153),
        },
        NamedColor {
            name: "lightslategrey",
            rgb: (119, 136, 153),
        },
        NamedColor {
            name: "lightsteelblue",
            rgb: (176, 196, 222),
        },
        NamedColor {
            name: "lightyellow",
            rgb: (255, 255, 224),
        },
        NamedColor {
            name: "lime",
            rgb: (0, 255, 0),
        },
        NamedColor {
            name: "limegreen",
            rgb: (50, 205, 50),
        },
        NamedColor {
            name: "linen",
            rgb: (250, 240, 230),
        },
        NamedColor {
            name: "magenta",
            rgb: (255, 0, 255),
        },
        NamedColor {
            name: "maroon",
            rgb: (128, 0, 0),
        },
        NamedColor {
            name: "mediumaquamarine",
            rgb: (102, 205, 170),
        },
        NamedColor {
            name: "mediumblue",
            rgb: (0, 0, 205),
        },
        NamedColor {
            name: "mediumorchid",
            rgb: (186, 85, 211),
        },
        NamedColor {
            name: "mediumpurple",
            rgb: (147, 112, 219),
        },
        NamedColor {
            name: "mediumseagreen",
            rgb: (60, 179, 113),
        },
        NamedColor {
            name: "mediumslateblue",
            rgb: (123, 104, 238),
        },
        NamedColor {
            name: "mediumspringgreen",
            rgb: (0, 250, 154),
        },
        NamedColor {
            name: "mediumturquoise",
            rgb: (72, 209, 204),
        },
        NamedColor {
            name: "mediumvioletred",
            rgb: (199, 21, 133),
        },
        NamedColor {
            name: "midnightblue",
            rgb: (25, 25, 112),
        },
        NamedColor {
            name: "mintcream",
            rgb: (245, 255, 250),
        },
        NamedColor {
            name: "mistyrose",
            rgb: (255, 228, 225),
        },
        NamedColor {
            name: "moccasin",
            rgb: (255, 228, 181),
        },
        NamedColor {
            name: "navajowhite",
            rgb: (255, 222, 173),
        },
        NamedColor {
            name: "navy",
            rgb: (0, 0, 128),
        },
        NamedColor {
            name: "oldlace",
            rgb: (253, 245, 230),
        },
        NamedColor {
            name: "olive",
            rgb: (128, 128, 0),
        },
        NamedColor {
            name: "olivedrab",
            rgb: (107, 142, 35),
        },
        NamedColor {
            name: "orange",
            rgb: (255, 165, 0),
        },
        NamedColor {
            name: "orangered",
            rgb: (255, 69, 0),
        },
        NamedColor {
            name: "orchid",
            rgb: (218, 112, 214),
        },
        NamedColor {
            name: "palegoldenrod",
            rgb: (238, 232, 170),
        },
        NamedColor {
            name: "palegreen",
            rgb: (152, 251, 152),
        },
        NamedColor {
            name: "paleturquoise",
            rgb: (175, 238, 238),
        },
        NamedColor {
            name: "palevioletred",
            rgb: (219, 112, 147),
        },
        NamedColor {
            name: "papayawhip",
            rgb: (255, 239, 213),
        },
        NamedColor {
            name: "peachpuff",
            rgb: (255, 218, 185),
        },
        NamedColor {
            name: "peru",
            rgb: (205, 133, 63),
        },
        NamedColor {
            name: "pink",
            rgb: (255, 192, 203),
        },
        NamedColor {
            name: "plum",
            rgb: (221, 160, 221),
        },
        NamedColor {
            name: "powderblue",
            rgb: (176, 224, 230),
        },
        NamedColor {
            name: "purple",
            rgb: (128, 0, 128),
        },
        NamedColor {
            name: "red",
            rgb: (255, 0, 0),
        },
        NamedColor {
            name: "rosybrown",
            rgb: (188, 143, 143),
        },
        NamedColor {
            name: "royalblue",
            rgb: (65, 105, 225),
        },
        NamedColor {
            name: "saddlebrown",
            rgb: (139, 69, 19),
        },
        NamedColor {
            name: "salmon",
            rgb: (250, 128, 114),
        },
        NamedColor {
            name: "sandybrown",
            rgb: (244, 164, 96),
        },
        NamedColor {
            name: "seagreen",
            rgb: (46, 139, 87),
        },
        NamedColor {
            name: "seashell",
            rgb: (255, 245, 238),
        },
        NamedColor {
            name: "sienna",
            rgb: (160, 82, 45),
        },
        NamedColor {
            name: "silver",
            rgb: (192, 192, 192),
        },
        NamedColor {
            name: "skyblue",
            rgb: (135, 206, 235),
        },
        NamedColor {
            name: "slateblue",
            rgb: (106, 90, 205),
        },
        NamedColor {
            name: "slategray",
            rgb: (112, 128, 144),
        },
        NamedColor {
            name: "slategrey",
            rgb: (112, 128, 144),
        },
        NamedColor {
            name: "snow",
            rgb: (255, 250, 250),
        },
        NamedColor {
            name: "springgreen",
            rgb: (0, 255, 127),
        },
        NamedColor {
            name: "steelblue",
            rgb: (70, 130, 180),
        },
        NamedColor {
            name: "tan",
            rgb: (210, 180, 140),
        },
        NamedColor {
            name: "teal",
            rgb: (0, 128, 128),
        },
        NamedColor {
            name: "thistle",
            rgb: (216, 191, 216),
        },
        NamedColor {
            name: "tomato",
            rgb: (255, 99, 71),
        },
        NamedColor {
            name: "turquoise",
            rgb: (64, 224, 208),
        },
        NamedColor {
            name: "violet",
            rgb: (238, 130, 238),
        },
        NamedColor {
            name: "wheat",
            rgb: (245, 222, 179),
        },
        NamedColor {
            name: "white",
            rgb: (255, 255, 255),
        },
        NamedColor {
            name: "whitesmoke",
            rgb: (245, 245, 245),
        },
        NamedColor {
            name: "yellow",
            rgb: (255, 255, 0),
        },
        NamedColor {
            name: "yellowgreen",
            rgb: (154, 205, 50),
        },
        NamedColor {
            name: "rebeccapurple",
            rgb: (102, 51, 153),
        },
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserInput;

    fn parse(input: &str) -> Result<Color, String> {
        let mut parser_input = ParserInput::new(input);
        let mut parser = Parser::new(&mut parser_input);
        parser
            .parse_entirely(Color::parse)
            .map_err(|e| e.to_string())
    }

    fn rgba(input: &str) -> Rgba {
        match parse(input) {
            Ok(Color::Rgba(rgba)) => rgba,
            other => panic!("expected an rgba color for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn red_is_red_is_red() {
        let reference = Rgba::new(255, 0, 0, 1.0);
        assert_eq!(rgba("rgb(255, 0, 0)"), reference);
        assert_eq!(rgba("#ff0000"), reference);
        assert_eq!(rgba("#f00"), reference);
        assert_eq!(rgba("red"), reference);
        assert_eq!(rgba("RED"), reference);
        assert_eq!(rgba("rgb(100%, 0%, 0%)"), reference);
        assert_eq!(rgba("rgb(255 0 0)"), reference);
    }

    #[test]
    fn hash_colors() {
        // four digits: alpha is 0xdd / 255
        let color = rgba("#abcd");
        assert_eq!(color.red, Some(170));
        assert_eq!(color.green, Some(187));
        assert_eq!(color.blue, Some(204));
        assert_eq!(color.alpha, Some(221.0 / 255.0));

        let color = rgba("#80808080");
        assert_eq!(color.red, Some(128));
        assert_eq!(color.alpha, Some(128.0 / 255.0));

        assert!(parse("#abcde").is_err());
        assert!(parse("#xyz").is_err());
    }

    #[test]
    fn named_colors_and_keywords() {
        assert_eq!(rgba("rebeccapurple"), Rgba::new(102, 51, 153, 1.0));
        assert_eq!(rgba("MediumSeaGreen"), Rgba::new(60, 179, 113, 1.0));
        assert_eq!(rgba("transparent"), Rgba::new(0, 0, 0, 0.0));
        assert_eq!(parse("currentcolor").ok(), Some(Color::CurrentColor));
        assert_eq!(parse("CURRENTCOLOR").ok(), Some(Color::CurrentColor));
        assert!(parse("notacolor").is_err());
    }

    #[test]
    fn legacy_rgb_does_not_mix_flavors() {
        assert!(parse("rgb(100%, 0, 0)").is_err());
        assert!(parse("rgb(255, 0%, 0)").is_err());
        assert!(parse("rgb(255, none, 0)").is_err());
    }

    #[test]
    fn modern_rgb_preserves_none() {
        let color = rgba("rgb(255 0 0 / none)");
        assert_eq!(color.alpha, None);
        assert_eq!(format!("{}", Color::Rgba(color)), "rgb(255 0 0 / none)");

        let color = rgba("rgb(none 0 0)");
        assert_eq!(color.red, None);
        assert_eq!(color.alpha, Some(1.0));
    }

    #[test]
    fn alpha_is_clamped() {
        assert_eq!(rgba("rgb(0 0 0 / 1.5)").alpha, Some(1.0));
        assert_eq!(rgba("rgb(0 0 0 / -0.5)").alpha, Some(0.0));
        assert_eq!(rgba("rgba(0, 0, 0, 40%)").alpha, Some(0.4));
    }

    #[test]
    fn hsl_converts_like_rgb() {
        let hsl = match parse("hsl(0 100% 50%)") {
            Ok(color) => color,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(hsl.to_rgba(), Some(Rgba::new(255, 0, 0, 1.0)));

        let hsl = match parse("hsl(120, 100%, 25%)") {
            Ok(color) => color,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(hsl.to_rgba(), Some(Rgba::new(0, 128, 0, 1.0)));
    }

    #[test]
    fn hue_accepts_angles_and_normalizes() {
        let color = match parse("hsl(0.5turn 100% 50%)") {
            Ok(Color::Hsl(hsl)) => hsl,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(color.hue, Some(180.0));

        let color = match parse("hsl(-120 100% 50%)") {
            Ok(Color::Hsl(hsl)) => hsl,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(color.hue, Some(240.0));

        // legacy syntax requires a real hue, not `none`
        assert!(parse("hsl(none, 100%, 50%)").is_err());
    }

    #[test]
    fn hwb_conversion() {
        let color = match parse("hwb(0 0% 0%)") {
            Ok(color) => color,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(color.to_rgba(), Some(Rgba::new(255, 0, 0, 1.0)));

        // whiteness + blackness >= 100% is gray
        let color = match parse("hwb(90 60% 60%)") {
            Ok(color) => color,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(color.to_rgba(), Some(Rgba::new(128, 128, 128, 1.0)));
    }

    #[test]
    fn lab_and_oklab_percentage_scaling() {
        let lab = match parse("lab(50% 100% -100%)") {
            Ok(Color::Lab(lab)) => lab,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(lab.lightness, Some(50.0));
        assert_eq!(lab.a, Some(125.0));
        assert_eq!(lab.b, Some(-125.0));

        let oklch = match parse("oklch(100% 50% 30)") {
            Ok(Color::Oklch(oklch)) => oklch,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(oklch.lightness, Some(1.0));
        assert_eq!(oklch.chroma, Some(0.2));
        assert_eq!(oklch.hue, Some(30.0));

        let lch = match parse("lch(50% 50% 30deg)") {
            Ok(Color::Lch(lch)) => lch,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(lch.chroma, Some(75.0));

        // `none` stays distinct
        let lab = match parse("lab(none 0 0)") {
            Ok(Color::Lab(lab)) => lab,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(lab.lightness, None);
    }

    #[test]
    fn color_function_spaces() {
        let color = match parse("color(display-p3 1 0 0)") {
            Ok(Color::ColorFunction(color)) => color,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(color.color_space, PredefinedColorSpace::DisplayP3);
        assert_eq!(color.c1, Some(1.0));

        let color = match parse("color(xyz 0 0 0)") {
            Ok(Color::ColorFunction(color)) => color,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(color.color_space, PredefinedColorSpace::XyzD65);

        let color = match parse("color(--my-ink 1 2 3 4 / 50%)") {
            Ok(Color::CustomColorSpace(color)) => color,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(color.name, "--my-ink");
        assert_eq!(color.components, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        assert_eq!(color.alpha, Some(0.5));

        assert!(parse("color(bogus-space 1 0 0)").is_err());
    }

    #[test]
    fn device_cmyk() {
        let color = match parse("device-cmyk(0 81% 81% 30%)") {
            Ok(Color::DeviceCmyk(color)) => color,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(color.magenta, Some(0.81));

        let color = match parse("device-cmyk(0, 0.81, 0.81, 0.3)") {
            Ok(Color::DeviceCmyk(color)) => color,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(color.black, Some(0.3));

        // legacy syntax takes numbers only
        assert!(parse("device-cmyk(0%, 81%, 81%, 30%)").is_err());
    }

    #[test]
    fn calc_components() {
        assert_eq!(rgba("rgb(calc(200 + 55) 0 0)"), Rgba::new(255, 0, 0, 1.0));
        let color = match parse("hsl(calc(0.5turn) 100% 50%)") {
            Ok(Color::Hsl(hsl)) => hsl,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(color.hue, Some(180.0));
    }

    #[test]
    fn serialization() {
        assert_eq!(rgba("red").to_string(), "rgb(255, 0, 0)");
        assert_eq!(rgba("rgba(255, 0, 0, 0.5)").to_string(), "rgba(255, 0, 0, 0.5)");
        let color = match parse("hsl(120 50% 25%)") {
            Ok(color) => color,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(color.to_string(), "hsl(120 50% 25%)");
    }
}
