use std::fmt::Display;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0},
    sequence::{delimited, preceded},
    IResult, Parser,
};
use serde::{Deserialize, Serialize};

use crate::match_spec::parse::matchspec_parser;

/// Represents a condition in a match spec, which can be a match spec itself or a logical combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Eq, Hash)]
pub enum MatchSpecCondition {
    /// A condition on a certain match spec (e.g. `python >=3.12`)
    MatchSpec(Box<crate::MatchSpec>),
    /// A logical AND condition combining two conditions
    And(Box<MatchSpecCondition>, Box<MatchSpecCondition>),
    /// A logical OR condition combining two conditions
    Or(Box<MatchSpecCondition>, Box<MatchSpecCondition>),
}

impl Display for MatchSpecCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchSpecCondition::MatchSpec(ms) => write!(f, "{ms}"),
            MatchSpecCondition::And(lhs, rhs) => write!(f, "({lhs} and {rhs})"),
            MatchSpecCondition::Or(lhs, rhs) => write!(f, "({lhs} or {rhs})"),
        }
    }
}

// Parse whitespace
fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

/// Check if the word-boundary delimiter `word` starts at byte position `pos` in `input`.
/// A word boundary means the character before (if any) and after (if any) must be
/// whitespace or a parenthesis.
fn check_word_delimiter(input: &str, pos: usize, word: &str) -> bool {
    let bytes = input.as_bytes();
    // Check that the word actually matches at this position
    if !input[pos..].starts_with(word) {
        return false;
    }
    let before_ok = pos == 0 || {
        let b = bytes[pos - 1];
        b.is_ascii_whitespace() || b == b'(' || b == b')'
    };
    let after_pos = pos + word.len();
    let after_ok = after_pos >= bytes.len() || {
        let b = bytes[after_pos];
        b.is_ascii_whitespace() || b == b'(' || b == b')'
    };
    before_ok && after_ok
}

// Parse a matchspec by consuming until we hit a delimiter.
// Correctly skips delimiters inside quoted strings and brackets.
fn matchspec_token(input: &str) -> IResult<&str, &str> {
    let bytes = input.as_bytes();
    let mut i = 0;
    let mut bracket_depth: u32 = 0;
    let mut in_double_quote = false;
    let mut in_single_quote = false;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' if in_double_quote || in_single_quote => {
                // Skip the escaped character
                i += 2;
                continue;
            }
            b'"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
            }
            b'\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
            }
            b'[' if !in_double_quote && !in_single_quote => {
                bracket_depth += 1;
            }
            b']' if !in_double_quote && !in_single_quote => {
                bracket_depth = bracket_depth.saturating_sub(1);
            }
            b'(' | b')' if !in_double_quote && !in_single_quote && bracket_depth == 0 => {
                break;
            }
            _ if !in_double_quote && !in_single_quote && bracket_depth == 0 => {
                if check_word_delimiter(input, i, "and") || check_word_delimiter(input, i, "or") {
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }

    if i == 0 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TakeUntil,
        )));
    }

    let token = input[..i].trim();
    if token.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TakeUntil,
        )));
    }

    Ok((&input[i..], token))
}

// Parse a matchspec
fn matchspec(input: &str) -> IResult<&str, MatchSpecCondition> {
    let (remaining, matchspec_str) = matchspec_token(input)?;

    match matchspec_parser(matchspec_str, crate::ParseStrictness::Strict.into()) {
        Ok(parsed_matchspec) => Ok((
            remaining,
            MatchSpecCondition::MatchSpec(Box::new(parsed_matchspec)),
        )),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::MapRes,
        ))),
    }
}

// Parse parenthesized condition
fn parenthesized_condition(input: &str) -> IResult<&str, MatchSpecCondition> {
    delimited((char('('), ws), parse_condition, (ws, char(')'))).parse(input)
}

// Parse primary condition (matchspec or parenthesized)
fn primary_condition(input: &str) -> IResult<&str, MatchSpecCondition> {
    alt((parenthesized_condition, matchspec)).parse(input)
}

// Parse AND expressions (higher precedence)
fn and_condition(input: &str) -> IResult<&str, MatchSpecCondition> {
    let (input, first) = primary_condition(input)?;
    let (input, rest) =
        nom::multi::many0(preceded((ws, tag("and"), ws), primary_condition)).parse(input)?;

    Ok((
        input,
        rest.into_iter().fold(first, |acc, next| {
            MatchSpecCondition::And(Box::new(acc), Box::new(next))
        }),
    ))
}

// Parse OR expressions (lower precedence)
fn or_condition(input: &str) -> IResult<&str, MatchSpecCondition> {
    let (input, first) = and_condition(input)?;
    let (input, rest) =
        nom::multi::many0(preceded((ws, tag("or"), ws), and_condition)).parse(input)?;

    Ok((
        input,
        rest.into_iter().fold(first, |acc, next| {
            MatchSpecCondition::Or(Box::new(acc), Box::new(next))
        }),
    ))
}

// Parse the main condition
pub(crate) fn parse_condition(input: &str) -> IResult<&str, MatchSpecCondition> {
    or_condition(input)
}

/// Error returned when a [`MatchSpecCondition`] cannot be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("could not parse condition '{0}'")]
pub struct ParseConditionError(String);

impl std::str::FromStr for MatchSpecCondition {
    type Err = ParseConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (remaining, condition) =
            parse_condition(s).map_err(|_| ParseConditionError(s.to_string()))?;
        if !remaining.trim().is_empty() {
            return Err(ParseConditionError(s.to_string()));
        }
        Ok(condition)
    }
}

impl MatchSpecCondition {
    /// Evaluates the condition, calling `is_satisfied` for every leaf match
    /// spec to determine whether it currently holds.
    pub fn evaluate(&self, is_satisfied: &impl Fn(&crate::MatchSpec) -> bool) -> bool {
        match self {
            MatchSpecCondition::MatchSpec(spec) => is_satisfied(spec),
            MatchSpecCondition::And(lhs, rhs) => {
                lhs.evaluate(is_satisfied) && rhs.evaluate(is_satisfied)
            }
            MatchSpecCondition::Or(lhs, rhs) => {
                lhs.evaluate(is_satisfied) || rhs.evaluate(is_satisfied)
            }
        }
    }
}

/// Splits off the legacy `"<matchspec>; if <condition>"` suffix used in
/// repodata `depends` entries (CEP 21). Returns the bare match spec part and,
/// if present, the parsed condition. The modern `[when="..."]` bracket syntax
/// is handled by `MatchSpec`'s own parser and does not need this helper.
pub fn split_legacy_conditional_dependency(raw: &str) -> (&str, Option<MatchSpecCondition>) {
    let Some(pos) = raw.find(';') else {
        return (raw.trim(), None);
    };
    let (spec_part, rest) = raw.split_at(pos);
    let rest = rest[1..].trim_start();
    let Some(cond_str) = rest.strip_prefix("if") else {
        return (raw.trim(), None);
    };
    match cond_str.trim().parse::<MatchSpecCondition>() {
        Ok(condition) => (spec_part.trim(), Some(condition)),
        Err(_) => (raw.trim(), None),
    }
}
