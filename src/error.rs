use thiserror::Error;

use crate::fetch::CMapCompression;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Failed to parse a text or binary CMap.
    #[error("couldn't parse cmap: {0}")]
    Parse(#[from] ParseError),
    /// The name is neither an identity CMap nor one of the built-in CMaps.
    #[error("unknown cmap name: {0}")]
    UnknownCMap(String),
    /// A built-in CMap was requested but no fetcher was supplied.
    #[error("built-in cmap \"{0}\" requested but no fetcher was provided")]
    FetchRequired(String),
    /// The fetcher returned data in a compression format the readers can't handle.
    #[error("unsupported cmap compression type: {0:?}")]
    UnsupportedCompression(CMapCompression),
    /// A cidrange or bfrange spans more than `MAX_MAP_RANGE` codes.
    #[error("range <{low:x}> <{high:x}> exceeds the maximum map range")]
    RangeTooLarge { low: u32, high: u32 },
    /// The underlying data source has not received the requested bytes yet.
    /// Callers should retry once more data is available.
    #[error("cmap data is not available yet")]
    MissingData,
    /// A usecmap chain refers back to a CMap that is still being resolved.
    #[error("usecmap cycle detected: {0}")]
    UsecmapCycle(String),
    /// IO error while fetching a built-in CMap.
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
}

impl Error {
    /// Transient errors must never be swallowed by format-error recovery.
    pub fn is_missing_data(&self) -> bool {
        matches!(self, Error::MissingData)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("invalid token at offset {offset}")]
    InvalidToken { offset: usize },
    #[error("malformed cmap: expected {0}")]
    Expected(&'static str),
    #[error("invalid codespace range")]
    InvalidCodespaceRange,
    #[error("invalid bf range")]
    InvalidBfRange,
    #[error("code length must be between 1 and 4 bytes, got {0}")]
    InvalidCodeLength(usize),
    #[error("unknown binary cmap record type {0}")]
    UnknownRecordType(u8),
    #[error("number too large")]
    NumberOverflow,
    #[error("too many malformed constructs, giving up")]
    TooManyErrors,
}
