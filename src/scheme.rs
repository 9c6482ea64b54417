use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::char,
    combinator::{all_consuming, value},
    multi::many0,
    sequence::{preceded, terminated},
};

use crate::ast::{Expression, NumberType};
use crate::{Error, ParseError, ParseErrorKind};

/// Reader options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseConfig {
    /// Treat `;` through end of line as a comment. Off by default, in which
    /// case `;` is an ordinary symbol character.
    pub handle_comments: bool,
    /// Maximum list nesting; `None` for unlimited
    pub max_depth: Option<usize>,
}

/// Split source text into tokens: `(`, `)`, and maximal runs of other
/// non-whitespace characters. Unbalanced parentheses are the reader's
/// concern; the tokenizer only fails if it cannot consume the whole input.
pub fn tokenize(input: &str) -> Result<Vec<&str>, ParseError> {
    tokenize_with_config(input, &ParseConfig::default())
}

pub fn tokenize_with_config<'a>(
    input: &'a str,
    config: &ParseConfig,
) -> Result<Vec<&'a str>, ParseError> {
    let comments = config.handle_comments;
    let is_space = |c: char| c.is_whitespace();
    let is_atom_char =
        move |c: char| !is_space(c) && c != '(' && c != ')' && !(comments && c == ';');

    // Whitespace here is exactly what `is_atom_char` rejects, so every
    // character is either skipped or starts a token.
    let skip = |input: &'a str| -> IResult<&'a str, ()> {
        if comments {
            let comment = preceded(char(';'), take_till(|c: char| c == '\n' || c == '\r'));
            value((), many0(alt((take_while1(is_space), comment)))).parse(input)
        } else {
            value((), take_while(is_space)).parse(input)
        }
    };
    let token = alt((tag("("), tag(")"), take_while1(is_atom_char)));

    all_consuming(terminated(many0(preceded(skip, token)), skip))
        .parse(input)
        .map(|(_, tokens)| tokens)
        .map_err(|err| unrecognized_input(input, &err))
}

/// Convert a nom failure into a parse error pointing at the unconsumed text
fn unrecognized_input(input: &str, error: &nom::Err<nom::error::Error<&str>>) -> ParseError {
    let rest = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => e.input,
        nom::Err::Incomplete(_) => "",
    };
    let position = input.len().saturating_sub(rest.len());
    ParseError::new(
        ParseErrorKind::UnrecognizedInput,
        format!("Unrecognized input at position {position}"),
        None,
        Some(rest.chars().take(10).collect()),
    )
}

/// Classify one atom token. Integers win over floats. A float needs at
/// least one digit, except the printer's spellings of the non-finite values;
/// other words such as `nan` or `infinity` stay symbols.
fn parse_atom(token: &str) -> Expression {
    if let Ok(n) = token.parse::<NumberType>() {
        return Expression::Integer(n);
    }
    if token.bytes().any(|b| b.is_ascii_digit())
        && let Ok(x) = token.parse::<f64>()
    {
        return Expression::Float(x);
    }
    match token {
        "inf" => Expression::Float(f64::INFINITY),
        "-inf" => Expression::Float(f64::NEG_INFINITY),
        "NaN" => Expression::Float(f64::NAN),
        "#t" => Expression::Boolean(true),
        "#f" => Expression::Boolean(false),
        _ => Expression::Text(token.to_owned()),
    }
}

/// Recursive-descent reader over a token stream.
///
/// Yields one top-level form per iteration. After the first error the
/// iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    tokens: Vec<&'a str>,
    position: usize,
    config: ParseConfig,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str) -> Result<Self, Error> {
        Self::with_config(input, ParseConfig::default())
    }

    pub fn with_config(input: &'a str, config: ParseConfig) -> Result<Self, Error> {
        Ok(Reader {
            tokens: tokenize_with_config(input, &config)?,
            position: 0,
            config,
        })
    }

    /// True once every token has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Read the next complete form
    pub fn read(&mut self) -> Result<Expression, Error> {
        self.read_form(0)
    }

    fn error(&self, kind: ParseErrorKind, message: impl Into<String>) -> Error {
        ParseError::with_token_context(kind, message, &self.tokens, self.position).into()
    }

    fn read_form(&mut self, open_lists: usize) -> Result<Expression, Error> {
        let Some(&token) = self.tokens.get(self.position) else {
            return Err(self.error(ParseErrorKind::Incomplete, "Unexpected end of input"));
        };

        match token {
            "(" => {
                if let Some(max) = self.config.max_depth
                    && open_lists >= max
                {
                    return Err(self.error(
                        ParseErrorKind::TooDeeplyNested,
                        format!("Expression too deeply nested (max depth: {max})"),
                    ));
                }
                self.position += 1;
                let mut elements = Vec::new();
                loop {
                    match self.tokens.get(self.position) {
                        None => {
                            return Err(self.error(
                                ParseErrorKind::Incomplete,
                                "Unexpected end of input: unclosed '('",
                            ));
                        }
                        Some(&")") => {
                            self.position += 1;
                            return Ok(Expression::List(elements));
                        }
                        Some(_) => elements.push(self.read_form(open_lists + 1)?),
                    }
                }
            }
            ")" => Err(self.error(ParseErrorKind::UnexpectedClose, "Unexpected ')'")),
            atom => {
                self.position += 1;
                Ok(parse_atom(atom))
            }
        }
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<Expression, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_exhausted() {
            return None;
        }
        let result = self.read();
        if result.is_err() {
            self.position = self.tokens.len();
        }
        Some(result)
    }
}

/// Parse exactly one expression; leftover tokens are an error
pub fn parse_scheme(input: &str) -> Result<Expression, Error> {
    parse_scheme_with_config(input, ParseConfig::default())
}

pub fn parse_scheme_with_config(input: &str, config: ParseConfig) -> Result<Expression, Error> {
    let mut reader = Reader::with_config(input, config)?;
    let expr = reader.read()?;
    if !reader.is_exhausted() {
        return Err(reader.error(
            ParseErrorKind::TrailingContent,
            "Unexpected remaining input after expression",
        ));
    }
    Ok(expr)
}

/// Parse every top-level form in `input`
pub fn parse_program(input: &str) -> Result<Vec<Expression>, Error> {
    parse_program_with_config(input, ParseConfig::default())
}

pub fn parse_program_with_config(
    input: &str,
    config: ParseConfig,
) -> Result<Vec<Expression>, Error> {
    Reader::with_config(input, config)?.collect()
}
