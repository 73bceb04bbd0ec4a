use super::*;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::char,
    combinator::{opt, value},
    error::{ErrorKind, ParseError},
    sequence::{terminated, tuple},
    IResult,
};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ParseOperatorError {
    #[error("found operator {0}")]
    InvalidOperator(String),
    #[error("expected operator")]
    ExpectedOperator,
    #[error("expected EOF")]
    ExpectedEOF,
}

// impl FromStr for Greater {
//     type Err = ParseOperatorError;
//     fn from_str(s: &str) -> Result<Self, Self::Err> {
//         match s {
//             ">" => Ok(Self(true)),
//             "<=" => Ok(Self(false)),
//             _ => Err(ParseOperatorError::InvalidOperator(s.to_string())),
//         }
//     }
// }

// impl FromStr for Less {
//     type Err = ParseOperatorError;
//     fn from_str(s: &str) -> Result<Self, Self::Err> {
//         match s {
//             "<" => Ok(Self(true)),
//             ">=" => Ok(Self(false)),
//             _ => Err(ParseOperatorError::InvalidOperator(s.to_string())),
//         }
//     }
// }

// impl FromStr for Equal {
//     type Err = ParseOperatorError;
//     fn from_str(s: &str) -> Result<Self, Self::Err> {
//         match s {
//             "==" => Ok(Self(true)),
//             "!=" => Ok(Self(false)),
//             _ => Err(ParseOperatorError::InvalidOperator(s.to_string())),
//         }
//     }
// }

// impl FromStr for StartsWith {
//     type Err = ParseOperatorError;
//     fn from_str(s: &str) -> Result<Self, Self::Err> {
//         match s {
//             "=" => Ok(Self(true)),
//             "!=startswith" => Ok(Self(false)),
//             _ => Err(ParseOperatorError::InvalidOperator(s.to_string())),
//         }
//     }
// }

// impl FromStr for CompatibleWith {
//     type Err = ParseOperatorError;
//     fn from_str(s: &str) -> Result<Self, Self::Err> {
//         match s {
//             "~=" => Ok(Self(true)),
//             "!~=" => Ok(Self(false)),
//             _ => Err(ParseOperatorError::InvalidOperator(s.to_string())),
//         }
//     }
// }
