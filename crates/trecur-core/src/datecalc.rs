//! Evaluation of date expressions such as `due - 3d` or `now + 1w`.
//!
//! Parent tasks may carry `rwait`/`rscheduled` as unevaluated text; this module
//! turns that text into instants with real calendar arithmetic.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Offset, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;
use pest::iterators::Pairs;
use pest::pratt_parser::PrattParser;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::period::{parse_span, ParsePeriodError, Span};
use crate::timezone::resolve_local;

#[derive(Parser)]
#[grammar = "date_expr.pest"]
pub struct DateExprParser;

lazy_static::lazy_static! {
    static ref PRATT_PARSER: PrattParser<Rule> = {
        use pest::pratt_parser::{Assoc::*, Op};
        use Rule::*;

        PrattParser::new().op(Op::infix(add, Left) | Op::infix(sub, Left))
    };
}

#[derive(Error, Debug)]
pub enum DateExprError {
    #[error("Cannot parse date expression: {0}")]
    Pest(#[from] Box<pest::error::Error<Rule>>),
    #[error("Invalid date '{0}'")]
    InvalidDate(String),
    #[error(transparent)]
    Period(#[from] ParsePeriodError),
    #[error("'due' is not available in this expression")]
    MissingDue,
    #[error("Cannot {0} a date and a date")]
    TypeMismatch(&'static str),
    #[error("Date arithmetic overflowed")]
    Overflow,
    #[error("Unknown rule: {0:?}")]
    UnknownRule(Rule),
}

/// Result of an expression: a point in time or a span between two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Instant(DateTime<Utc>),
    Span(Span),
}

/// Anchors an expression is evaluated against.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub now: DateTime<Utc>,
    pub due: Option<DateTime<Utc>>,
    pub tz: Tz,
}

impl EvalContext {
    fn anchor(&self, name: &str) -> Result<Value, DateExprError> {
        let instant = match name {
            "now" => self.now,
            "today" => {
                let midnight = self
                    .now
                    .with_timezone(&self.tz)
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .ok_or(DateExprError::Overflow)?;
                resolve_local(&self.tz, midnight).ok_or(DateExprError::Overflow)?
            }
            "due" => self.due.ok_or(DateExprError::MissingDue)?,
            other => return Err(DateExprError::InvalidDate(other.to_string())),
        };
        Ok(Value::Instant(instant))
    }
}

/// Evaluates `input` to a [`Value`].
pub fn evaluate(input: &str, ctx: &EvalContext) -> Result<Value, DateExprError> {
    let expression = DateExprParser::parse(Rule::date_expression, input)
        .map_err(Box::new)?
        .next()
        .and_then(|pair| pair.into_inner().next())
        .ok_or_else(|| DateExprError::InvalidDate(input.to_string()))?;
    eval(expression.into_inner(), ctx)
}

/// Evaluates `input` to an instant.
///
/// A bare span is read as "that long before `due`", which is how template
/// offsets like `rwait:3d` are meant. Text the grammar rejects gets a second
/// chance as natural language ("tomorrow", "next friday").
pub fn evaluate_instant(input: &str, ctx: &EvalContext) -> Result<DateTime<Utc>, DateExprError> {
    match evaluate(input, ctx) {
        Ok(Value::Instant(instant)) => Ok(instant),
        Ok(Value::Span(span)) => {
            let due = ctx.due.ok_or(DateExprError::MissingDue)?;
            span.negate().add_to(due, &ctx.tz).ok_or(DateExprError::Overflow)
        }
        Err(err) => natural_language(input, ctx).ok_or(err),
    }
}

fn natural_language(input: &str, ctx: &EvalContext) -> Option<DateTime<Utc>> {
    let offset = ctx.now.with_timezone(&ctx.tz).offset().fix();
    parse_date_string(input, ctx.now.with_timezone(&offset), Dialect::Uk)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn eval(pairs: Pairs<Rule>, ctx: &EvalContext) -> Result<Value, DateExprError> {
    PRATT_PARSER
        .map_primary(|primary| match primary.as_rule() {
            Rule::anchor => ctx.anchor(primary.as_str()),
            Rule::date => parse_date(primary.as_str(), &ctx.tz).map(Value::Instant),
            Rule::duration => Ok(Value::Span(parse_span(primary.as_str())?)),
            Rule::expression => eval(primary.into_inner(), ctx),
            rule => Err(DateExprError::UnknownRule(rule)),
        })
        .map_infix(|lhs, op, rhs| {
            let (lhs, rhs) = (lhs?, rhs?);
            match op.as_rule() {
                Rule::add => add(lhs, rhs, &ctx.tz),
                Rule::sub => subtract(lhs, rhs, &ctx.tz),
                rule => Err(DateExprError::UnknownRule(rule)),
            }
        })
        .parse(pairs)
}

fn add(lhs: Value, rhs: Value, tz: &Tz) -> Result<Value, DateExprError> {
    match (lhs, rhs) {
        (Value::Instant(at), Value::Span(span)) | (Value::Span(span), Value::Instant(at)) => span
            .add_to(at, tz)
            .map(Value::Instant)
            .ok_or(DateExprError::Overflow),
        (Value::Span(a), Value::Span(b)) => a.checked_add(b).map(Value::Span).ok_or(DateExprError::Overflow),
        (Value::Instant(_), Value::Instant(_)) => Err(DateExprError::TypeMismatch("add")),
    }
}

fn subtract(lhs: Value, rhs: Value, tz: &Tz) -> Result<Value, DateExprError> {
    match (lhs, rhs) {
        (Value::Instant(at), Value::Span(span)) => span
            .negate()
            .add_to(at, tz)
            .map(Value::Instant)
            .ok_or(DateExprError::Overflow),
        (Value::Instant(a), Value::Instant(b)) => Ok(Value::Span(Span::from_seconds((a - b).num_seconds()))),
        (Value::Span(a), Value::Span(b)) => a
            .checked_add(b.negate())
            .map(Value::Span)
            .ok_or(DateExprError::Overflow),
        (Value::Span(_), Value::Instant(_)) => Err(DateExprError::TypeMismatch("subtract")),
    }
}

/// Zoned dates are absolute; naive ones are read on the local wall clock.
fn parse_date(text: &str, tz: &Tz) -> Result<DateTime<Utc>, DateExprError> {
    let invalid = || DateExprError::InvalidDate(text.to_string());

    if let Ok(zoned) = DateTime::parse_from_rfc3339(text) {
        return Ok(zoned.with_timezone(&Utc));
    }
    if let Some(basic) = text.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(basic, "%Y%m%dT%H%M%S")
            .map(|naive| naive.and_utc())
            .map_err(|_| invalid());
    }

    let naive = ["%Y%m%dT%H%M%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            ["%Y%m%d", "%Y-%m-%d"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(invalid)?;
    resolve_local(tz, naive).ok_or_else(invalid)
}
