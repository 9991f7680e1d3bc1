//! Parser and constant folder for [CSS math expressions](https://drafts.csswg.org/css-values-4/#math)
//! (`calc()`, `min()`, `max()`, `clamp()` and the trig / exp / stepped-value
//! functions).
//!
//! Math expressions nest arbitrarily (`calc(calc(calc(…)))`), so the parser
//! runs as a state machine over an explicit frame stack, one frame per open
//! math function or parenthesis, instead of descending recursively. Constant
//! folding happens while nodes are built: sums and products of plain numbers
//! collapse, adding zero and multiplying by one are elided, and transcendental
//! functions fold when every argument is a pure number. Folding never touches
//! the unit of a value leaf.

use crate::parser::{NestedBlockScope, Parser};
use crate::tokenizer::{Token, TokenType};
use crate::values::{ValueParseError, ValueParseErrorKind};
use nimbra_shared::location::Location;

/// A leaf value usable inside a math expression: any parseable dimension
/// (length, angle, time, resolution, percentage).
pub trait CalcDimension<'i>: Sized + Clone + std::fmt::Debug + PartialEq {
    /// Builds a leaf from a dimension or percentage token, or rejects it
    fn from_token(token: &TokenType<'i>) -> Option<Self>;
}

/// How `round()` maps the value onto a multiple of the step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoundingStrategy {
    #[default]
    Nearest,
    Up,
    Down,
    ToZero,
}

impl RoundingStrategy {
    fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("nearest") {
            Some(RoundingStrategy::Nearest)
        } else if name.eq_ignore_ascii_case("up") {
            Some(RoundingStrategy::Up)
        } else if name.eq_ignore_ascii_case("down") {
            Some(RoundingStrategy::Down)
        } else if name.eq_ignore_ascii_case("to-zero") {
            Some(RoundingStrategy::ToZero)
        } else {
            None
        }
    }
}

/// A math function node
#[derive(Clone, Debug, PartialEq)]
pub enum MathFunction<V> {
    Min(Vec<CalcExpr<V>>),
    Max(Vec<CalcExpr<V>>),
    Clamp {
        min: CalcExpr<V>,
        center: CalcExpr<V>,
        max: CalcExpr<V>,
    },
    Round {
        strategy: RoundingStrategy,
        value: CalcExpr<V>,
        step: CalcExpr<V>,
    },
    Mod(CalcExpr<V>, CalcExpr<V>),
    Rem(CalcExpr<V>, CalcExpr<V>),
    Abs(CalcExpr<V>),
    Sign(CalcExpr<V>),
    Sin(CalcExpr<V>),
    Cos(CalcExpr<V>),
    Tan(CalcExpr<V>),
    Asin(CalcExpr<V>),
    Acos(CalcExpr<V>),
    Atan(CalcExpr<V>),
    Atan2(CalcExpr<V>, CalcExpr<V>),
    Pow(CalcExpr<V>, CalcExpr<V>),
    Sqrt(CalcExpr<V>),
    Hypot(Vec<CalcExpr<V>>),
    Log {
        value: CalcExpr<V>,
        base: Option<CalcExpr<V>>,
    },
    Exp(CalcExpr<V>),
}

impl<V> MathFunction<V> {
    /// Evaluates the function when every argument is a pure number
    fn evaluate_numeric(&self) -> Option<f64> {
        fn all_numbers<V>(args: &[CalcExpr<V>]) -> Option<Vec<f64>> {
            args.iter().map(CalcExpr::as_number).collect()
        }

        Some(match self {
            MathFunction::Min(args) => all_numbers(args)?.into_iter().fold(f64::INFINITY, f64::min),
            MathFunction::Max(args) => {
                all_numbers(args)?.into_iter().fold(f64::NEG_INFINITY, f64::max)
            }
            MathFunction::Clamp { min, center, max } => {
                let (min, center, max) = (min.as_number()?, center.as_number()?, max.as_number()?);
                center.min(max).max(min)
            }
            MathFunction::Round { strategy, value, step } => {
                round_step(*strategy, value.as_number()?, step.as_number()?)
            }
            MathFunction::Mod(a, b) => {
                let (a, b) = (a.as_number()?, b.as_number()?);
                a - b * (a / b).floor()
            }
            MathFunction::Rem(a, b) => a.as_number()? % b.as_number()?,
            MathFunction::Abs(v) => v.as_number()?.abs(),
            MathFunction::Sign(v) => {
                let v = v.as_number()?;
                if v == 0.0 || v.is_nan() {
                    v
                } else {
                    v.signum()
                }
            }
            MathFunction::Sin(v) => v.as_number()?.sin(),
            MathFunction::Cos(v) => v.as_number()?.cos(),
            MathFunction::Tan(v) => v.as_number()?.tan(),
            MathFunction::Asin(v) => v.as_number()?.asin(),
            MathFunction::Acos(v) => v.as_number()?.acos(),
            MathFunction::Atan(v) => v.as_number()?.atan(),
            MathFunction::Atan2(y, x) => y.as_number()?.atan2(x.as_number()?),
            MathFunction::Pow(base, exponent) => base.as_number()?.powf(exponent.as_number()?),
            MathFunction::Sqrt(v) => v.as_number()?.sqrt(),
            MathFunction::Hypot(args) => all_numbers(args)?
                .into_iter()
                .fold(0.0, |acc: f64, v| acc.hypot(v)),
            MathFunction::Log { value, base } => match base {
                Some(base) => value.as_number()?.log(base.as_number()?),
                None => value.as_number()?.ln(),
            },
            MathFunction::Exp(v) => v.as_number()?.exp(),
        })
    }
}

/// `round(strategy, value, step)` for plain numbers. Ties under `nearest`
/// round toward positive infinity.
fn round_step(strategy: RoundingStrategy, value: f64, step: f64) -> f64 {
    if step == 0.0 {
        return f64::NAN;
    }
    let ratio = value / step;
    let rounded = match strategy {
        RoundingStrategy::Up => ratio.ceil(),
        RoundingStrategy::Down => ratio.floor(),
        RoundingStrategy::ToZero => ratio.trunc(),
        RoundingStrategy::Nearest => {
            let down = ratio.floor();
            let up = ratio.ceil();
            if ratio - down < up - ratio {
                down
            } else {
                up
            }
        }
    };
    rounded * step
}

/// A math expression over value leaves of type `V`
#[derive(Clone, Debug, PartialEq)]
pub enum CalcExpr<V> {
    /// A dimension / percentage leaf; folding never changes its unit
    Value(V),
    /// A plain number
    Number(f64),
    /// `a + b` (subtraction is canonicalized to `a + b * -1`)
    Sum(Box<CalcExpr<V>>, Box<CalcExpr<V>>),
    /// `a * factor`; at most one non-numeric side survives parsing
    Product(Box<CalcExpr<V>>, f64),
    Function(Box<MathFunction<V>>),
}

impl<V> CalcExpr<V> {
    /// `Some` when the expression folded down to a plain number
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CalcExpr::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// `a + b`, folding number pairs and eliding zero terms
    #[must_use]
    pub fn sum_of(a: CalcExpr<V>, b: CalcExpr<V>) -> CalcExpr<V> {
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => CalcExpr::Number(x + y),
            (Some(x), None) if x == 0.0 => b,
            (None, Some(y)) if y == 0.0 => a,
            _ => CalcExpr::Sum(Box::new(a), Box::new(b)),
        }
    }

    /// `a - b`, canonicalized to `a + (b * -1)`
    #[must_use]
    pub fn difference_of(a: CalcExpr<V>, b: CalcExpr<V>) -> CalcExpr<V> {
        let negated = CalcExpr::product_of(b, -1.0);
        CalcExpr::sum_of(a, negated)
    }

    /// `a * factor`, folding numbers, eliding `* 1` and merging chained
    /// products
    #[must_use]
    pub fn product_of(a: CalcExpr<V>, factor: f64) -> CalcExpr<V> {
        if let Some(x) = a.as_number() {
            return CalcExpr::Number(x * factor);
        }
        if factor == 1.0 {
            return a;
        }
        match a {
            CalcExpr::Product(inner, f) => CalcExpr::Product(inner, f * factor),
            a => CalcExpr::Product(Box::new(a), factor),
        }
    }

    /// Wraps a math function, folding it away when it evaluates to a number
    #[must_use]
    pub fn function_of(function: MathFunction<V>) -> CalcExpr<V> {
        match function.evaluate_numeric() {
            Some(value) => CalcExpr::Number(value),
            None => CalcExpr::Function(Box::new(function)),
        }
    }
}

/// Which math function (or plain parenthesis) a frame belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CalcContext {
    Parenthesis,
    Calc,
    Min,
    Max,
    Clamp,
    Round,
    Mod,
    Rem,
    Abs,
    Sign,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Pow,
    Sqrt,
    Hypot,
    Log,
    Exp,
}

impl CalcContext {
    fn from_name(name: &str) -> Option<CalcContext> {
        const NAMES: &[(&str, CalcContext)] = &[
            ("calc", CalcContext::Calc),
            ("min", CalcContext::Min),
            ("max", CalcContext::Max),
            ("clamp", CalcContext::Clamp),
            ("round", CalcContext::Round),
            ("mod", CalcContext::Mod),
            ("rem", CalcContext::Rem),
            ("abs", CalcContext::Abs),
            ("sign", CalcContext::Sign),
            ("sin", CalcContext::Sin),
            ("cos", CalcContext::Cos),
            ("tan", CalcContext::Tan),
            ("asin", CalcContext::Asin),
            ("acos", CalcContext::Acos),
            ("atan", CalcContext::Atan),
            ("atan2", CalcContext::Atan2),
            ("pow", CalcContext::Pow),
            ("sqrt", CalcContext::Sqrt),
            ("hypot", CalcContext::Hypot),
            ("log", CalcContext::Log),
            ("exp", CalcContext::Exp),
        ];
        NAMES
            .iter()
            .find(|(n, _)| name.eq_ignore_ascii_case(n))
            .map(|(_, context)| *context)
    }

    /// Whether commas separate further arguments in this context
    fn accepts_commas(self) -> bool {
        matches!(
            self,
            CalcContext::Min
                | CalcContext::Max
                | CalcContext::Clamp
                | CalcContext::Round
                | CalcContext::Mod
                | CalcContext::Rem
                | CalcContext::Atan2
                | CalcContext::Pow
                | CalcContext::Hypot
                | CalcContext::Log
        )
    }
}

/// True when `name` is one of the math function names
#[must_use]
pub fn is_math_function(name: &str) -> bool {
    CalcContext::from_name(name).is_some()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ProductOp {
    NoOp,
    Mul,
    Div,
}

/// One open math function (or parenthesis) under construction
struct CalcFrame<V> {
    context: CalcContext,
    scope: NestedBlockScope,
    args: Vec<CalcExpr<V>>,
    round_strategy: Option<RoundingStrategy>,
    sum: Option<CalcExpr<V>>,
    negate_next: bool,
    product: Option<CalcExpr<V>>,
    pending_op: ProductOp,
}

impl<V> CalcFrame<V> {
    fn new(context: CalcContext, scope: NestedBlockScope) -> Self {
        CalcFrame {
            context,
            scope,
            args: Vec::new(),
            round_strategy: None,
            sum: None,
            negate_next: false,
            product: None,
            pending_op: ProductOp::NoOp,
        }
    }

    fn is_fresh(&self) -> bool {
        self.args.is_empty() && self.sum.is_none() && self.product.is_none()
    }

    /// Folds a just-parsed unit into the running product
    fn merge_leaf(&mut self, leaf: CalcExpr<V>) -> Result<(), ()> {
        match self.pending_op {
            ProductOp::NoOp => {
                if self.product.is_some() {
                    return Err(());
                }
                self.product = Some(leaf);
            }
            ProductOp::Mul => {
                let acc = self.product.take().ok_or(())?;
                // only one side of a product may carry a unit
                let merged = if let Some(n) = leaf.as_number() {
                    CalcExpr::product_of(acc, n)
                } else if let Some(n) = acc.as_number() {
                    CalcExpr::product_of(leaf, n)
                } else {
                    return Err(());
                };
                self.product = Some(merged);
            }
            ProductOp::Div => {
                let acc = self.product.take().ok_or(())?;
                // the divisor must be a number, and not zero
                let divisor = leaf.as_number().ok_or(())?;
                if divisor == 0.0 {
                    return Err(());
                }
                self.product = Some(CalcExpr::product_of(acc, 1.0 / divisor));
            }
        }
        self.pending_op = ProductOp::NoOp;
        Ok(())
    }

    /// Folds the running product into the running sum
    fn flush_product(&mut self) -> Result<(), ()> {
        if self.pending_op != ProductOp::NoOp {
            return Err(());
        }
        let product = self.product.take().ok_or(())?;
        let product = if self.negate_next {
            CalcExpr::product_of(product, -1.0)
        } else {
            product
        };
        self.negate_next = false;
        self.sum = Some(match self.sum.take() {
            None => product,
            Some(sum) => CalcExpr::sum_of(sum, product),
        });
        Ok(())
    }

    /// Completes the current comma-separated argument
    fn finish_argument(&mut self) -> Result<(), ()> {
        self.flush_product()?;
        let argument = self.sum.take().ok_or(())?;
        self.args.push(argument);
        Ok(())
    }
}

/// Builds (and folds) the node for a completed frame, enforcing arity
fn build_expression<V>(
    context: CalcContext,
    mut args: Vec<CalcExpr<V>>,
    round_strategy: Option<RoundingStrategy>,
) -> Result<CalcExpr<V>, ()> {
    fn one<V>(args: &mut Vec<CalcExpr<V>>) -> Result<CalcExpr<V>, ()> {
        if args.len() == 1 {
            args.pop().ok_or(())
        } else {
            Err(())
        }
    }
    fn two<V>(args: &mut Vec<CalcExpr<V>>) -> Result<(CalcExpr<V>, CalcExpr<V>), ()> {
        if args.len() == 2 {
            let b = args.pop().ok_or(())?;
            let a = args.pop().ok_or(())?;
            Ok((a, b))
        } else {
            Err(())
        }
    }

    let function = match context {
        // plain grouping folds into the parent expression
        CalcContext::Parenthesis | CalcContext::Calc => return one(&mut args),
        CalcContext::Min => {
            if args.is_empty() {
                return Err(());
            }
            MathFunction::Min(args)
        }
        CalcContext::Max => {
            if args.is_empty() {
                return Err(());
            }
            MathFunction::Max(args)
        }
        CalcContext::Hypot => {
            if args.is_empty() {
                return Err(());
            }
            MathFunction::Hypot(args)
        }
        CalcContext::Clamp => {
            if args.len() != 3 {
                return Err(());
            }
            let max = args.pop().ok_or(())?;
            let center = args.pop().ok_or(())?;
            let min = args.pop().ok_or(())?;
            MathFunction::Clamp { min, center, max }
        }
        CalcContext::Round => {
            let (value, step) = two(&mut args)?;
            MathFunction::Round {
                strategy: round_strategy.unwrap_or_default(),
                value,
                step,
            }
        }
        CalcContext::Mod => {
            let (a, b) = two(&mut args)?;
            MathFunction::Mod(a, b)
        }
        CalcContext::Rem => {
            let (a, b) = two(&mut args)?;
            MathFunction::Rem(a, b)
        }
        CalcContext::Atan2 => {
            let (y, x) = two(&mut args)?;
            MathFunction::Atan2(y, x)
        }
        CalcContext::Pow => {
            let (base, exponent) = two(&mut args)?;
            MathFunction::Pow(base, exponent)
        }
        CalcContext::Log => match args.len() {
            1 => MathFunction::Log {
                value: args.pop().ok_or(())?,
                base: None,
            },
            2 => {
                let base = args.pop().ok_or(())?;
                let value = args.pop().ok_or(())?;
                MathFunction::Log {
                    value,
                    base: Some(base),
                }
            }
            _ => return Err(()),
        },
        CalcContext::Abs => MathFunction::Abs(one(&mut args)?),
        CalcContext::Sign => MathFunction::Sign(one(&mut args)?),
        CalcContext::Sin => MathFunction::Sin(one(&mut args)?),
        CalcContext::Cos => MathFunction::Cos(one(&mut args)?),
        CalcContext::Tan => MathFunction::Tan(one(&mut args)?),
        CalcContext::Asin => MathFunction::Asin(one(&mut args)?),
        CalcContext::Acos => MathFunction::Acos(one(&mut args)?),
        CalcContext::Atan => MathFunction::Atan(one(&mut args)?),
        CalcContext::Sqrt => MathFunction::Sqrt(one(&mut args)?),
        CalcContext::Exp => MathFunction::Exp(one(&mut args)?),
    };
    Ok(CalcExpr::function_of(function))
}

enum Phase {
    Value,
    AfterValue,
}

impl<V> CalcExpr<V> {
    /// Parses a whole math function from the cursor (the next token must be
    /// `calc(`, `min(`, or any of the other math function names)
    pub fn parse<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<CalcExpr<V>, ValueParseError<'i>>
    where
        V: CalcDimension<'i>,
    {
        log::trace!("parse_calc");
        let token = parser.next()?;
        match token.token_type {
            TokenType::Function(ref name) if is_math_function(name) => {
                let name = name.as_str().to_ascii_lowercase();
                Self::parse_math_function(parser, &name)
            }
            _ => Err(unexpected_calc(token)),
        }
    }

    /// Parses the interior of a just-consumed math function token
    pub fn parse_math_function<'i, 't>(
        parser: &mut Parser<'i, 't>,
        name: &str,
    ) -> Result<CalcExpr<V>, ValueParseError<'i>>
    where
        V: CalcDimension<'i>,
    {
        let context = match CalcContext::from_name(name) {
            Some(context) => context,
            None => {
                return Err(invalid_expression(parser.current_source_location()));
            }
        };

        let scope = parser.open_nested_block();
        let mut stack: Vec<CalcFrame<V>> = vec![CalcFrame::new(context, scope)];
        let mut phase = Phase::Value;

        loop {
            match phase {
                Phase::Value => {
                    // `round()` may open with a strategy keyword and a comma
                    let round_fresh = matches!(
                        stack.last(),
                        Some(frame)
                            if frame.context == CalcContext::Round
                                && frame.round_strategy.is_none()
                                && frame.is_fresh()
                    );
                    if round_fresh {
                        let strategy: Result<RoundingStrategy, ()> = parser.try_parse(|p| {
                            let ident = p.expect_ident().map_err(|_| ())?;
                            let strategy = RoundingStrategy::from_name(&ident).ok_or(())?;
                            p.expect_comma().map_err(|_| ())?;
                            Ok(strategy)
                        });
                        if let Ok(strategy) = strategy {
                            if let Some(frame) = stack.last_mut() {
                                frame.round_strategy = Some(strategy);
                            }
                        }
                    }

                    let token = match parser.next() {
                        Ok(token) => token,
                        Err(error) => return fail(parser, stack, error.into()),
                    };
                    let location = token.location;
                    let leaf: CalcExpr<V> = match token.token_type {
                        TokenType::Number(value) => CalcExpr::Number(value.value),
                        TokenType::Ident(ref name) => match numeric_constant(name) {
                            Some(value) => CalcExpr::Number(value),
                            None => return fail(parser, stack, unexpected_calc(token)),
                        },
                        TokenType::LParen => {
                            let scope = parser.open_nested_block();
                            stack.push(CalcFrame::new(CalcContext::Parenthesis, scope));
                            continue;
                        }
                        TokenType::Function(ref name) => match CalcContext::from_name(name) {
                            Some(context) => {
                                let scope = parser.open_nested_block();
                                stack.push(CalcFrame::new(context, scope));
                                continue;
                            }
                            None => return fail(parser, stack, unexpected_calc(token)),
                        },
                        ref token_type @ (TokenType::Dimension { .. } | TokenType::Percentage(_)) => {
                            match V::from_token(token_type) {
                                Some(value) => CalcExpr::Value(value),
                                None => return fail(parser, stack, unexpected_calc(token)),
                            }
                        }
                        _ => return fail(parser, stack, unexpected_calc(token)),
                    };

                    let merged = match stack.last_mut() {
                        Some(frame) => frame.merge_leaf(leaf).is_ok(),
                        None => false,
                    };
                    if !merged {
                        return fail(parser, stack, invalid_expression(location));
                    }
                    phase = Phase::AfterValue;
                }
                Phase::AfterValue => {
                    let token = match parser.next_including_whitespace() {
                        Ok(token) => token,
                        Err(_) => {
                            // end of this frame's block
                            match pop_frame(parser, &mut stack) {
                                Ok(Some(expr)) => return Ok(expr),
                                Ok(None) => continue,
                                Err(location) => {
                                    return fail(parser, stack, invalid_expression(location))
                                }
                            }
                        }
                    };
                    match token.token_type {
                        TokenType::Whitespace(_) => {
                            // `+` and `-` require whitespace on both sides
                            let state = parser.state();
                            let op_token = match parser.next() {
                                Ok(token) => token,
                                Err(_) => continue, // trailing whitespace
                            };
                            match op_token.token_type {
                                TokenType::Delim(c @ ('+' | '-')) => {
                                    let after = parser.next_including_whitespace();
                                    let has_trailing_ws =
                                        matches!(&after, Ok(t) if t.is_whitespace());
                                    if !has_trailing_ws {
                                        return fail(
                                            parser,
                                            stack,
                                            invalid_expression(op_token.location),
                                        );
                                    }
                                    let flushed = match stack.last_mut() {
                                        Some(frame) => {
                                            let r = frame.flush_product();
                                            frame.negate_next = c == '-';
                                            r.is_ok()
                                        }
                                        None => false,
                                    };
                                    if !flushed {
                                        return fail(
                                            parser,
                                            stack,
                                            invalid_expression(op_token.location),
                                        );
                                    }
                                    phase = Phase::Value;
                                }
                                TokenType::Delim('*') => {
                                    set_product_op(&mut stack, ProductOp::Mul);
                                    phase = Phase::Value;
                                }
                                TokenType::Delim('/') => {
                                    set_product_op(&mut stack, ProductOp::Div);
                                    phase = Phase::Value;
                                }
                                TokenType::Comma => {
                                    if let Err(location) =
                                        finish_argument(&mut stack, op_token.location)
                                    {
                                        return fail(parser, stack, invalid_expression(location));
                                    }
                                    phase = Phase::Value;
                                }
                                _ => {
                                    parser.reset(&state);
                                    return fail(parser, stack, unexpected_calc(op_token));
                                }
                            }
                        }
                        TokenType::Delim('*') => {
                            set_product_op(&mut stack, ProductOp::Mul);
                            phase = Phase::Value;
                        }
                        TokenType::Delim('/') => {
                            set_product_op(&mut stack, ProductOp::Div);
                            phase = Phase::Value;
                        }
                        TokenType::Comma => {
                            if let Err(location) = finish_argument(&mut stack, token.location) {
                                return fail(parser, stack, invalid_expression(location));
                            }
                            phase = Phase::Value;
                        }
                        // `2px+1` style operators without whitespace land here
                        _ => return fail(parser, stack, unexpected_calc(token)),
                    }
                }
            }
        }
    }
}

/// The numeric keywords of CSS Values 4
fn numeric_constant(name: &str) -> Option<f64> {
    if name.eq_ignore_ascii_case("e") {
        Some(std::f64::consts::E)
    } else if name.eq_ignore_ascii_case("pi") {
        Some(std::f64::consts::PI)
    } else if name.eq_ignore_ascii_case("infinity") {
        Some(f64::INFINITY)
    } else if name.eq_ignore_ascii_case("-infinity") {
        Some(f64::NEG_INFINITY)
    } else if name.eq_ignore_ascii_case("nan") {
        Some(f64::NAN)
    } else {
        None
    }
}

fn unexpected_calc<'i>(token: Token<'i>) -> ValueParseError<'i> {
    let location = token.location;
    ValueParseError {
        kind: crate::errors::ParseErrorKind::Custom(ValueParseErrorKind::UnexpectedCalcToken(token)),
        location,
    }
}

fn invalid_expression<'i>(location: Location) -> ValueParseError<'i> {
    ValueParseError {
        kind: crate::errors::ParseErrorKind::Custom(ValueParseErrorKind::InvalidCalcExpression),
        location,
    }
}

/// Closes every open scope before surfacing an error
fn fail<'i, V, T>(
    parser: &mut Parser<'i, '_>,
    stack: Vec<CalcFrame<V>>,
    error: ValueParseError<'i>,
) -> Result<T, ValueParseError<'i>> {
    for frame in stack.into_iter().rev() {
        parser.close_nested_block(frame.scope);
    }
    Err(error)
}

fn set_product_op<V>(stack: &mut [CalcFrame<V>], op: ProductOp) {
    if let Some(frame) = stack.last_mut() {
        frame.pending_op = op;
    }
}

fn finish_argument<V>(stack: &mut [CalcFrame<V>], location: Location) -> Result<(), Location> {
    match stack.last_mut() {
        Some(frame) if frame.context.accepts_commas() => {
            frame.finish_argument().map_err(|()| location)
        }
        _ => Err(location),
    }
}

/// Pops a completed frame and merges its expression into the parent, or
/// returns the final expression for the outermost frame. Errors report the
/// parser's current location.
fn pop_frame<'i, V>(
    parser: &mut Parser<'i, '_>,
    stack: &mut Vec<CalcFrame<V>>,
) -> Result<Option<CalcExpr<V>>, Location> {
    let location = parser.current_source_location();
    let mut frame = match stack.pop() {
        Some(frame) => frame,
        None => unreachable!("the calc frame stack cannot be empty"),
    };
    let finished = frame.finish_argument();
    parser.close_nested_block(frame.scope);
    finished.map_err(|()| location)?;

    let expr = build_expression(frame.context, frame.args, frame.round_strategy)
        .map_err(|()| location)?;
    match stack.last_mut() {
        None => Ok(Some(expr)),
        Some(parent) => {
            parent.merge_leaf(expr).map_err(|()| location)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserInput;
    use crate::values::Length;

    fn parse(input: &str) -> Result<CalcExpr<Length>, String> {
        let mut parser_input = ParserInput::new(input);
        let mut parser = Parser::new(&mut parser_input);
        parser
            .parse_entirely(|p| CalcExpr::parse(p))
            .map_err(|e| e.to_string())
    }

    fn number(input: &str) -> f64 {
        match parse(input) {
            Ok(CalcExpr::Number(v)) => v,
            other => panic!("expected a folded number for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn folds_constant_arithmetic() {
        assert_eq!(number("calc(1 + 2)"), 3.0);
        assert_eq!(number("calc(6 / 2)"), 3.0);
        assert_eq!(number("calc(2 * 3 + 4)"), 10.0);
        assert_eq!(number("calc(2 + 3 * 4)"), 14.0);
        assert_eq!(number("calc((1 + 2) * 3)"), 9.0);
        assert_eq!(number("calc(10 - 4)"), 6.0);
        assert_eq!(number("calc(calc(2) * calc(3))"), 6.0);
    }

    #[test]
    fn dimension_sums_are_preserved() {
        // different from numbers: the value type is kept, not evaluated
        let expr = parse("calc(10px + 5px)");
        assert!(matches!(expr, Ok(CalcExpr::Sum(_, _))), "{expr:?}");
    }

    #[test]
    fn product_with_value_leaf() {
        let expr = match parse("calc( (1 + 2) * 3px )") {
            Ok(expr) => expr,
            Err(e) => panic!("{e}"),
        };
        match expr {
            CalcExpr::Product(leaf, factor) => {
                assert_eq!(factor, 3.0);
                assert!(matches!(*leaf, CalcExpr::Value(_)));
            }
            other => panic!("expected a product, got {other:?}"),
        }
    }

    #[test]
    fn multiplying_a_value_by_zero_stays_a_product() {
        let expr = parse("calc(2px * 0)");
        assert!(matches!(expr, Ok(CalcExpr::Product(_, f)) if f == 0.0), "{expr:?}");
        // a purely numeric product folds all the way down
        assert_eq!(number("calc(5 * 0)"), 0.0);
    }

    #[test]
    fn adding_zero_is_elided() {
        let expr = parse("calc(10px + 0)");
        assert!(matches!(expr, Ok(CalcExpr::Value(_))), "{expr:?}");
        let expr = parse("calc(0 + 10px)");
        assert!(matches!(expr, Ok(CalcExpr::Value(_))), "{expr:?}");
    }

    #[test]
    fn multiplying_by_one_is_elided() {
        let expr = parse("calc(10px * 1)");
        assert!(matches!(expr, Ok(CalcExpr::Value(_))), "{expr:?}");
    }

    #[test]
    fn comparison_functions_fold() {
        assert_eq!(number("min(3, 1, 2)"), 1.0);
        assert_eq!(number("max(3, 1, 2)"), 3.0);
        assert_eq!(number("clamp(1, 5, 3)"), 3.0);
        assert_eq!(number("hypot(3, 4)"), 5.0);
    }

    #[test]
    fn min_over_dimensions_stays_symbolic() {
        let expr = parse("min(1px, 2px)");
        assert!(matches!(expr, Ok(CalcExpr::Function(_))), "{expr:?}");
    }

    #[test]
    fn stepped_value_functions() {
        assert_eq!(number("round(up, 5, 2)"), 6.0);
        assert_eq!(number("round(down, 5, 2)"), 4.0);
        assert_eq!(number("round(to-zero, -5, 2)"), -4.0);
        assert_eq!(number("round(5, 2)"), 6.0);
        assert_eq!(number("round(nearest, 7, 4)"), 8.0);
        assert_eq!(number("mod(7, 3)"), 1.0);
        assert_eq!(number("mod(-7, 3)"), 2.0);
        assert_eq!(number("rem(-7, 3)"), -1.0);
    }

    #[test]
    fn transcendental_functions_fold_on_numbers() {
        assert_eq!(number("calc(sin(0))"), 0.0);
        assert_eq!(number("calc(cos(0))"), 1.0);
        assert_eq!(number("sqrt(16)"), 4.0);
        assert_eq!(number("pow(2, 10)"), 1024.0);
        assert_eq!(number("exp(0)"), 1.0);
        assert_eq!(number("log(100, 10)"), 2.0);
        assert!((number("calc(pi)") - std::f64::consts::PI).abs() < 1e-12);
        assert!((number("atan2(1, 1)") - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        assert_eq!(number("abs(-3)"), 3.0);
        assert_eq!(number("sign(-3)"), -1.0);
        assert_eq!(number("sign(0)"), 0.0);
    }

    #[test]
    fn plus_and_minus_require_whitespace() {
        assert!(parse("calc(1 +2)").is_err());
        assert!(parse("calc(1+ 2)").is_err());
        assert!(parse("calc(1px+ 1)").is_err());
        // `*` and `/` do not care
        assert_eq!(number("calc(3*4)"), 12.0);
        assert_eq!(number("calc(8/2)"), 4.0);
    }

    #[test]
    fn structural_errors() {
        assert!(parse("calc()").is_err());
        assert!(parse("calc(1, 2)").is_err());
        assert!(parse("calc(1px * 2px)").is_err());
        assert!(parse("calc(1 / 0)").is_err());
        assert!(parse("calc(1 / 2px)").is_err());
        assert!(parse("clamp(1, 2)").is_err());
        assert!(parse("round(sideways, 5, 2)").is_err());
        assert!(parse("frobnicate(1)").is_err());
        assert!(parse("calc(bareword)").is_err());
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut input = String::from("calc(");
        for _ in 0..500 {
            input.push_str("calc(");
        }
        input.push('1');
        for _ in 0..500 {
            input.push(')');
        }
        input.push(')');
        assert_eq!(number(&input), 1.0);
    }

    #[test]
    fn after_parsing_the_cursor_is_past_the_block() {
        let mut parser_input = ParserInput::new("calc(1 + 2) rest");
        let mut parser = Parser::new(&mut parser_input);
        let expr: CalcExpr<Length> = match CalcExpr::parse(&mut parser) {
            Ok(expr) => expr,
            Err(e) => panic!("{e}"),
        };
        assert_eq!(expr.as_number(), Some(3.0));
        assert!(matches!(
            parser.next().map(|t| t.token_type),
            Ok(TokenType::Ident(ref v)) if *v == "rest"
        ));
    }
}
