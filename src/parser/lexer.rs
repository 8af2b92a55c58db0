// Shared lexical helpers for the filter expression grammar

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, recognize, verify},
    multi::many0_count,
    sequence::{delimited, pair},
    IResult,
};

/// Wrap a parser to consume surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parse an identifier (letters, digits, underscores; not starting with a digit)
pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// Parse a double-quoted string. No escapes: the value runs to the next quote.
pub fn string_literal(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_while(|c| c != '"'), char('"'))(input)
}

/// Parse an unquoted value up to the next separator, trimmed.
/// Inner spaces are kept, so `Judicial Review` is one value.
pub fn bare_word(input: &str) -> IResult<&str, &str> {
    map(
        verify(
            take_while1(|c: char| !matches!(c, ',' | ';' | '=' | '"')),
            |s: &str| !s.trim().is_empty(),
        ),
        str::trim,
    )(input)
}

/// A quoted or bare value
pub fn value(input: &str) -> IResult<&str, &str> {
    alt((string_literal, bare_word))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("country=India"), Ok(("=India", "country")));
        assert_eq!(identifier("_x1 rest"), Ok((" rest", "_x1")));
        assert!(identifier("1abc").is_err());
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal(r#""Iran, Islamic Rep." ;"#), Ok((" ;", "Iran, Islamic Rep.")));
        assert_eq!(string_literal(r#""""#), Ok(("", "")));
        // Unclosed quote should fail
        assert!(string_literal(r#""India"#).is_err());
    }

    #[test]
    fn test_bare_word_keeps_inner_spaces() {
        assert_eq!(bare_word(" Judicial Review ,x"), Ok((",x", "Judicial Review")));
        assert_eq!(bare_word("India;year=2019"), Ok((";year=2019", "India")));
    }

    #[test]
    fn test_bare_word_rejects_blank() {
        assert!(bare_word("   ,").is_err());
        assert!(bare_word(",").is_err());
    }

    #[test]
    fn test_ws() {
        let mut comma = ws(char(','));
        assert_eq!(comma("  ,  next"), Ok(("next", ',')));
    }
}
