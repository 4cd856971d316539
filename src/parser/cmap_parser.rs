use log::warn;

use super::{CMapReader, Token, TokenSource};
use crate::cmap::CMap;
use crate::error::{Error, ParseError, Result};
use crate::hex::{be_to_u32, u32_to_be};
use crate::mapping::Mapping;

/// Malformed constructs tolerated in one stream before giving up on it.
pub const MAX_RECOVERED_ERRORS: usize = 1024;

/// Reads the PostScript-like CMap syntax.
///
/// Anything outside the `begin...`/`end...` blocks and the `WMode`,
/// `CMapName` and `usecmap` pragmas is skipped. A malformed entry is logged
/// and reading continues with the next token, so one broken line doesn't
/// cost the whole table.
pub struct TextCMapReader<S> {
    source: S,
    use_cmap: Option<String>,
}

#[derive(Default)]
struct TopLevel {
    previous: Option<String>,
    use_cmap: Option<String>,
}

impl<S: TokenSource> TextCMapReader<S> {
    pub fn new(source: S) -> TextCMapReader<S> {
        TextCMapReader { source, use_cmap: None }
    }

    /// Like [`TextCMapReader::new`], with an inherited CMap supplied by the
    /// caller. It takes precedence over a `usecmap` found in the stream.
    pub fn with_use_cmap(source: S, use_cmap: Option<String>) -> TextCMapReader<S> {
        TextCMapReader { source, use_cmap }
    }

    fn next(&mut self) -> Result<Option<Token>> {
        self.source.next_token()
    }

    fn next_required(&mut self) -> Result<Token> {
        self.next()?.ok_or_else(|| ParseError::EndOfInput.into())
    }

    /// Handle one top level token. Returns false at `endcmap` or end of input.
    fn step(&mut self, cmap: &mut CMap, state: &mut TopLevel) -> Result<bool> {
        let Some(token) = self.next()? else {
            return Ok(false);
        };
        match token {
            Token::Name(name) => {
                match name.as_str() {
                    "WMode" => self.parse_wmode(cmap)?,
                    "CMapName" => self.parse_cmap_name(cmap)?,
                    _ => {}
                }
                state.previous = Some(name);
            }
            Token::Command(command) => match command.as_str() {
                "endcmap" => return Ok(false),
                "usecmap" => {
                    if let Some(previous) = &state.previous {
                        state.use_cmap = Some(previous.clone());
                    }
                }
                "begincodespacerange" => self.parse_codespace_range(cmap)?,
                "beginbfchar" => self.parse_bf_char(cmap)?,
                "begincidchar" => self.parse_cid_char(cmap)?,
                "beginbfrange" => self.parse_bf_range(cmap)?,
                "begincidrange" => self.parse_cid_range(cmap)?,
                _ => {}
            },
            _ => {}
        }
        Ok(true)
    }

    fn parse_wmode(&mut self, cmap: &mut CMap) -> Result<()> {
        if let Some(Token::Integer(mode)) = self.next()? {
            cmap.set_vertical(mode != 0);
        }
        Ok(())
    }

    fn parse_cmap_name(&mut self, cmap: &mut CMap) -> Result<()> {
        if let Some(Token::Name(name)) = self.next()? {
            cmap.set_name(name);
        }
        Ok(())
    }

    /// Next token of a block: `None` at the closing keyword or end of input.
    fn next_in_block(&mut self, end: &str) -> Result<Option<Token>> {
        match self.next()? {
            Some(Token::Command(command)) if command == end => Ok(None),
            token => Ok(token),
        }
    }

    fn parse_codespace_range(&mut self, cmap: &mut CMap) -> Result<()> {
        while let Some(token) = self.next_in_block("endcodespacerange")? {
            let Token::String(low) = token else {
                return Err(ParseError::InvalidCodespaceRange.into());
            };
            let Token::String(high) = self.next_required()? else {
                return Err(ParseError::InvalidCodespaceRange.into());
            };
            cmap.add_codespace_range(high.len(), be_to_u32(&low), be_to_u32(&high))?;
        }
        Ok(())
    }

    fn parse_bf_char(&mut self, cmap: &mut CMap) -> Result<()> {
        while let Some(token) = self.next_in_block("endbfchar")? {
            let src = expect_code(token)?;
            let dst = expect_string(self.next_required()?)?;
            cmap.map_one(src, dst.into());
        }
        Ok(())
    }

    fn parse_cid_char(&mut self, cmap: &mut CMap) -> Result<()> {
        while let Some(token) = self.next_in_block("endcidchar")? {
            let src = expect_code(token)?;
            let dst = expect_int(self.next_required()?)?;
            cmap.map_one(src, dst.into());
        }
        Ok(())
    }

    fn parse_cid_range(&mut self, cmap: &mut CMap) -> Result<()> {
        while let Some(token) = self.next_in_block("endcidrange")? {
            let low = expect_code(token)?;
            let high = expect_code(self.next_required()?)?;
            let dst_low = expect_int(self.next_required()?)?;
            cmap.map_cid_range(low, high, dst_low)?;
        }
        Ok(())
    }

    fn parse_bf_range(&mut self, cmap: &mut CMap) -> Result<()> {
        while let Some(token) = self.next_in_block("endbfrange")? {
            let low = expect_code(token)?;
            let high = expect_code(self.next_required()?)?;
            match self.next_required()? {
                Token::Integer(dst) => {
                    let dst = u32::try_from(dst).map_err(|_| ParseError::InvalidBfRange)?;
                    cmap.map_bf_range(low, high, &u32_to_be(dst))?;
                }
                Token::String(dst) => cmap.map_bf_range(low, high, &dst)?,
                Token::Command(command) if command == "[" => {
                    let values = self.parse_bf_range_array()?;
                    cmap.map_bf_range_to_array(low, high, values)?;
                }
                _ => return Err(ParseError::InvalidBfRange.into()),
            }
        }
        Ok(())
    }

    fn parse_bf_range_array(&mut self) -> Result<Vec<Mapping>> {
        let mut values: Vec<Mapping> = vec![];
        loop {
            match self.next()? {
                None => break,
                Some(Token::Command(command)) if command == "]" => break,
                Some(Token::String(dst)) => values.push(dst.into()),
                Some(Token::Integer(dst)) => {
                    let dst = u32::try_from(dst).map_err(|_| ParseError::InvalidBfRange)?;
                    values.push(Mapping::Cid(dst));
                }
                Some(_) => return Err(ParseError::InvalidBfRange.into()),
            }
        }
        Ok(values)
    }
}

impl<S: TokenSource> CMapReader for TextCMapReader<S> {
    fn read(&mut self, cmap: &mut CMap) -> Result<Option<String>> {
        let mut state = TopLevel::default();
        let mut errors = 0;
        loop {
            match self.step(cmap, &mut state) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err @ Error::MissingData) => return Err(err),
                Err(err) => {
                    warn!("Invalid cmap data: {err}");
                    errors += 1;
                    if errors >= MAX_RECOVERED_ERRORS {
                        return Err(ParseError::TooManyErrors.into());
                    }
                }
            }
        }
        Ok(self.use_cmap.take().or(state.use_cmap))
    }
}

fn expect_string(token: Token) -> Result<Vec<u8>> {
    match token {
        Token::String(bytes) => Ok(bytes),
        _ => Err(ParseError::Expected("string").into()),
    }
}

fn expect_code(token: Token) -> Result<u32> {
    expect_string(token).map(|bytes| be_to_u32(&bytes))
}

fn expect_int(token: Token) -> Result<u32> {
    match token {
        Token::Integer(value) => u32::try_from(value).map_err(|_| ParseError::Expected("unsigned int").into()),
        _ => Err(ParseError::Expected("int").into()),
    }
}
