//! Decoding of PDF CMaps.
//!
//! A [`CMap`] splits the bytes of a PDF string into character codes and maps
//! each code to a CID or to a destination byte string. [`CMapFactory`] builds
//! them from embedded CMap streams or from the names of predefined CMaps.
//!
//! ```
//! use pdf_cmap::{CMapFactory, MappingRef};
//!
//! let data = b"1 begincodespacerange <00> <FF> endcodespacerange\n\
//!              1 begincidrange <20> <7E> 1 endcidrange\n";
//! let cmap = CMapFactory::new().create_from_stream(data, None)?;
//! assert_eq!(cmap.read_char_code(b"A", 0), (0x41, 1));
//! assert_eq!(cmap.lookup(0x41), Some(MappingRef::Cid(34)));
//! # Ok::<(), pdf_cmap::Error>(())
//! ```

mod builtin;
pub use builtin::{BUILT_IN_CMAPS, is_built_in};

mod cmap;
pub use cmap::{CMap, IDENTITY_H, IDENTITY_V, MAX_MAP_RANGE};

mod error;
pub use error::{Error, ParseError, Result};

mod factory;
pub use factory::{CMapEncoding, CMapFactory};

mod fetch;
pub use fetch::{BuiltInCMapData, CMapCompression, DirectoryFetcher, FetchBuiltInCMap};

mod hex;
mod mapping;
pub use mapping::{Mapping, MappingRef};

pub mod parser;
pub use parser::cmap_parser::MAX_RECOVERED_ERRORS;
pub use parser::{BinaryCMapReader, CMapReader, Lexer, TextCMapReader, Token, TokenSource};

mod table;
