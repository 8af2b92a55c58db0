// Filter expression grammar
//
//   selection := clause (';' clause)* ';'?
//   clause    := dimension '=' value (',' value)*
//
// Year values may be inclusive ranges (`2018..2023`), kept as bounds.

use super::lexer::{identifier, value, ws};
use crate::data::{Dimension, KeyValue, ResidentStatus};
use crate::filter::FilterSelection;
use anyhow::{bail, Result};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_opt, map_res, opt, recognize, verify},
    multi::separated_list0,
    multi::separated_list1,
    sequence::{delimited, pair, separated_pair, terminated},
    IResult,
};

fn dimension(input: &str) -> IResult<&str, Dimension> {
    map_opt(identifier, Dimension::from_name)(input)
}

fn year(input: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i32>)(input)
}

/// One accepted item of a clause
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Value(KeyValue),
    YearRange(i32, i32),
}

/// A single year or an inclusive range
fn year_term(input: &str) -> IResult<&str, Term> {
    alt((
        map(
            verify(separated_pair(year, ws(tag("..")), year), |&(lo, hi): &(i32, i32)| lo <= hi),
            |(lo, hi)| Term::YearRange(lo, hi),
        ),
        map(year, |y| Term::Value(KeyValue::Year(y))),
    ))(input)
}

fn resident_term(input: &str) -> IResult<&str, Term> {
    map_opt(value, |s| ResidentStatus::parse(s).map(|status| Term::Value(KeyValue::from(status))))(input)
}

fn text_term(input: &str) -> IResult<&str, Term> {
    map(value, |s| Term::Value(KeyValue::from(s)))(input)
}

/// Parse one `dimension=value,...` clause
pub fn clause(input: &str) -> IResult<&str, (Dimension, Vec<Term>)> {
    let (input, dimension) = ws(dimension)(input)?;
    let (input, _) = ws(char('='))(input)?;

    let (input, terms) = match dimension {
        Dimension::Year => separated_list1(ws(char(',')), ws(year_term))(input)?,
        Dimension::Resident => separated_list1(ws(char(',')), ws(resident_term))(input)?,
        _ => separated_list1(ws(char(',')), ws(text_term))(input)?,
    };

    Ok((input, (dimension, terms)))
}

fn clauses(input: &str) -> IResult<&str, Vec<(Dimension, Vec<Term>)>> {
    all_consuming(delimited(
        multispace0,
        terminated(separated_list0(ws(char(';')), clause), opt(ws(char(';')))),
        multispace0,
    ))(input)
}

/// Parse a textual filter expression into a selection.
///
/// Repeated clauses for one dimension union their values. An empty
/// expression is the unrestricted selection.
pub fn parse_selection(input: &str) -> Result<FilterSelection> {
    match clauses(input) {
        Ok((_, parsed)) => {
            let mut selection = FilterSelection::new();
            for (dimension, terms) in parsed {
                for term in terms {
                    match term {
                        Term::Value(value) => selection.extend(dimension, [value]),
                        Term::YearRange(lo, hi) => selection.add_year_range(lo, hi),
                    }
                }
            }
            Ok(selection)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            bail!("Invalid filter expression near '{}'", e.input.trim())
        }
        Err(nom::Err::Incomplete(_)) => bail!("Incomplete filter expression"),
    }
}
