use std::str::{self, FromStr};

use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_while, take_while1, take_while_m_n};
use nom::character::complete::{digit0, digit1, one_of};
use nom::combinator::{map, map_opt, map_res, not, opt, recognize, verify};
use nom::multi::{fold_many0, many0};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{AsChar, IResult, Input, Parser};
use nom_locate::LocatedSpan;

use crate::cmap::CMap;
use crate::error::{ParseError, Result};

pub(crate) mod binary_parser;
pub(crate) mod cmap_parser;

pub use binary_parser::BinaryCMapReader;
pub use cmap_parser::TextCMapReader;

pub(crate) type ParserInput<'a> = LocatedSpan<&'a [u8], &'a str>;
// Change this to something else that implements ParseError to get a
// different error type out of nom.
pub(crate) type NomError<'a> = nom::error::Error<ParserInput<'a>>;

pub(crate) type NomResult<'a, O, E = NomError<'a>> = IResult<ParserInput<'a>, O, E>;

/// Deepest nesting of parentheses accepted inside a literal string.
const MAX_BRACKET: usize = 100;

/// A CMap reader fills a [`CMap`] from one of the two on-disk formats.
pub trait CMapReader {
    /// Read all mappings into `cmap` and return the name of the CMap it
    /// inherits from, if one was declared.
    fn read(&mut self, cmap: &mut CMap) -> Result<Option<String>>;
}

/// A PostScript token as seen by the text CMap reader.
///
/// Brackets, braces and dictionary delimiters are reported as commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Name(String),
    Command(String),
    Integer(i64),
    Real(f64),
    String(Vec<u8>),
}

/// Source of tokens for [`TextCMapReader`].
///
/// `Ok(None)` signals the end of the stream. Implementations backed by data
/// that arrives incrementally return [`Error::MissingData`](crate::Error::MissingData)
/// when they run out of bytes before the end.
pub trait TokenSource {
    fn next_token(&mut self) -> Result<Option<Token>>;
}

impl<T: TokenSource + ?Sized> TokenSource for &mut T {
    fn next_token(&mut self) -> Result<Option<Token>> {
        (**self).next_token()
    }
}

impl TokenSource for std::vec::IntoIter<Token> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        Ok(self.next())
    }
}

/// Tokenizer over a complete CMap stream.
pub struct Lexer<'a> {
    input: ParserInput<'a>,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Lexer<'a> {
        Lexer {
            input: ParserInput::new_extra(data, "cmap"),
        }
    }
}

impl TokenSource for Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Ok((rest, _)) = space(self.input) {
            self.input = rest;
        }
        if self.input.is_empty() {
            return Ok(None);
        }
        match token(self.input) {
            Ok((rest, token)) => {
                self.input = rest;
                Ok(Some(token))
            }
            Err(_) => {
                // skip the offending byte so the caller can resume
                let offset = self.input.location_offset();
                self.input = self.input.take_from(1);
                Err(ParseError::InvalidToken { offset }.into())
            }
        }
    }
}

pub(crate) fn eol(input: ParserInput) -> NomResult<ParserInput> {
    alt((tag(&b"\r\n"[..]), tag(&b"\n"[..]), tag(&b"\r"[..]))).parse(input)
}

pub(crate) fn comment(input: ParserInput) -> NomResult<()> {
    map(
        (tag(&b"%"[..]), take_while(|c: u8| !b"\r\n".contains(&c)), opt(eol)),
        |_| (),
    ).parse(input)
}

#[inline]
fn is_whitespace(c: u8) -> bool {
    b" \t\n\r\0\x0C".contains(&c)
}

#[inline]
fn is_delimiter(c: u8) -> bool {
    b"()<>[]{}/%".contains(&c)
}

#[inline]
fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

#[inline]
fn is_direct_literal_string(c: u8) -> bool {
    !b"()\\\r\n".contains(&c)
}

fn white_space(input: ParserInput) -> NomResult<()> {
    map(take_while(is_whitespace), |_| ()).parse(input)
}

fn space(input: ParserInput) -> NomResult<()> {
    fold_many0(
        alt((map(take_while1(is_whitespace), |_| ()), comment)),
        || {},
        |_, _| (),
    ).parse(input)
}

fn parse_ascii<T: FromStr>(digits: ParserInput) -> std::result::Result<T, ()> {
    str::from_utf8(&digits)
        .map_err(|_| ())
        .and_then(|s| T::from_str(s).map_err(|_| ()))
}

fn integer(input: ParserInput) -> NomResult<i64> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), parse_ascii::<i64>).parse(input)
}

fn real(input: ParserInput) -> NomResult<f64> {
    map_res(
        recognize(pair(
            opt(one_of("+-")),
            alt((
                map((digit1, tag(&b"."[..]), digit0), |_| ()),
                map(pair(tag(&b"."[..]), digit1), |_| ()),
            )),
        )),
        parse_ascii::<f64>,
    ).parse(input)
}

/// A number must not run into a regular character, `12abc` is a keyword.
fn number(input: ParserInput) -> NomResult<Token> {
    terminated(
        alt((map(real, Token::Real), map(integer, Token::Integer))),
        not(verify(take(1usize), |c: &ParserInput| is_regular(c[0]))),
    ).parse(input)
}

pub(crate) fn hex_char(input: ParserInput) -> NomResult<u8> {
    map_opt(
        verify(take(2usize), |h: &ParserInput| {
            h.iter().copied().all(AsChar::is_hex_digit)
        }),
        |x: ParserInput| str::from_utf8(&x).ok().and_then(|x| u8::from_str_radix(x, 16).ok()),
    ).parse(input)
}

fn oct_char(input: ParserInput) -> NomResult<u8> {
    map_opt(
        take_while_m_n(1, 3, AsChar::is_oct_digit),
        // Overflow of octal escapes is ignored.
        |x: ParserInput| {
            str::from_utf8(&x)
                .ok()
                .and_then(|x| u16::from_str_radix(x, 8).ok())
                .map(|o| o as u8)
        },
    ).parse(input)
}

pub(crate) fn name(input: ParserInput) -> NomResult<Vec<u8>> {
    preceded(
        tag(&b"/"[..]),
        many0(alt((
            preceded(tag(&b"#"[..]), hex_char),
            map_opt(take(1usize), |c: ParserInput| {
                if c[0] != b'#' && is_regular(c[0]) {
                    Some(c[0])
                } else {
                    None
                }
            }),
        ))),
    ).parse(input)
}

fn escape_sequence(input: ParserInput) -> NomResult<Option<u8>> {
    preceded(
        tag(&b"\\"[..]),
        alt((
            map(oct_char, Some),
            map(eol, |_| None),
            map(tag(&b"n"[..]), |_| Some(b'\n')),
            map(tag(&b"r"[..]), |_| Some(b'\r')),
            map(tag(&b"t"[..]), |_| Some(b'\t')),
            map(tag(&b"b"[..]), |_| Some(b'\x08')),
            map(tag(&b"f"[..]), |_| Some(b'\x0C')),
            map(take(1usize), |c: ParserInput| Some(c[0])),
        )),
    ).parse(input)
}

enum InnerLiteralString<'a> {
    Direct(ParserInput<'a>),
    Escape(Option<u8>),
    Eol(ParserInput<'a>),
    Nested(Vec<u8>),
}

impl InnerLiteralString<'_> {
    fn push(&self, output: &mut Vec<u8>) {
        match self {
            InnerLiteralString::Direct(s) | InnerLiteralString::Eol(s) => output.extend_from_slice(s),
            InnerLiteralString::Escape(e) => output.extend(e),
            InnerLiteralString::Nested(n) => output.extend_from_slice(n),
        }
    }
}

fn inner_literal_string(depth: usize) -> impl Fn(ParserInput) -> NomResult<Vec<u8>> {
    move |input| {
        fold_many0(
            alt((
                map(take_while1(is_direct_literal_string), InnerLiteralString::Direct),
                map(escape_sequence, InnerLiteralString::Escape),
                map(eol, InnerLiteralString::Eol),
                map(nested_literal_string(depth), InnerLiteralString::Nested),
            )),
            Vec::new,
            |mut out: Vec<u8>, value| {
                value.push(&mut out);
                out
            },
        ).parse(input)
    }
}

fn nested_literal_string(depth: usize) -> impl Fn(ParserInput) -> NomResult<Vec<u8>> {
    move |input| {
        if depth == 0 {
            map(verify(tag(&b"too deep"[..]), |_| false), |_| vec![]).parse(input)
        } else {
            map(
                delimited(tag(&b"("[..]), inner_literal_string(depth - 1), tag(&b")"[..])),
                |mut content| {
                    content.insert(0, b'(');
                    content.push(b')');
                    content
                },
            ).parse(input)
        }
    }
}

fn literal_string(input: ParserInput) -> NomResult<Vec<u8>> {
    delimited(tag(&b"("[..]), inner_literal_string(MAX_BRACKET), tag(&b")"[..])).parse(input)
}

#[inline]
fn hex_digit(input: ParserInput) -> NomResult<u8> {
    map_opt(take(1usize), |c: ParserInput| (c[0] as char).to_digit(16).map(|d| d as u8)).parse(input)
}

/// `<901FA>` reads as `90 1F A0`: a trailing odd digit is padded with zero.
fn hexadecimal_string(input: ParserInput) -> NomResult<Vec<u8>> {
    map(
        delimited(
            tag(&b"<"[..]),
            terminated(
                fold_many0(
                    preceded(white_space, hex_digit),
                    || -> (Vec<u8>, bool) { (Vec::new(), false) },
                    |state, c| match state {
                        (mut out, false) => {
                            out.push(c << 4);
                            (out, true)
                        }
                        (mut out, true) => {
                            if let Some(last) = out.last_mut() {
                                *last |= c;
                            }
                            (out, false)
                        }
                    },
                ),
                white_space,
            ),
            tag(&b">"[..]),
        ),
        |(bytes, _)| bytes,
    ).parse(input)
}

fn keyword(input: ParserInput) -> NomResult<String> {
    map(take_while1(is_regular), |k: ParserInput| String::from_utf8_lossy(&k).into_owned()).parse(input)
}

fn command(text: &str) -> Token {
    Token::Command(text.to_string())
}

fn token(input: ParserInput) -> NomResult<Token> {
    alt((
        map(tag(&b"<<"[..]), |_| command("<<")),
        map(tag(&b">>"[..]), |_| command(">>")),
        map(hexadecimal_string, Token::String),
        map(literal_string, Token::String),
        map(name, |name| Token::Name(String::from_utf8_lossy(&name).into_owned())),
        map(one_of("[]{}"), |c: char| Token::Command(c.to_string())),
        number,
        map(keyword, Token::Command),
    )).parse(input)
}
