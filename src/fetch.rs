use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// How the bytes returned by a fetcher are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CMapCompression {
    /// Plain text CMap program.
    None,
    /// Packed `.bcmap` format.
    Binary,
    /// Compressed PDF stream. Declared by some data sources, never decoded here.
    Stream,
}

/// Raw data of a built-in CMap.
#[derive(Debug, Clone)]
pub struct BuiltInCMapData {
    pub data: Vec<u8>,
    pub compression: CMapCompression,
}

impl BuiltInCMapData {
    pub fn new(data: Vec<u8>, compression: CMapCompression) -> BuiltInCMapData {
        BuiltInCMapData { data, compression }
    }
}

/// Supplies the data of built-in CMaps by name.
///
/// Any `Fn(&str) -> Result<BuiltInCMapData>` closure is a fetcher.
pub trait FetchBuiltInCMap {
    fn fetch(&self, name: &str) -> Result<BuiltInCMapData>;
}

impl<F> FetchBuiltInCMap for F
where
    F: Fn(&str) -> Result<BuiltInCMapData>,
{
    fn fetch(&self, name: &str) -> Result<BuiltInCMapData> {
        self(name)
    }
}

/// Loads built-in CMaps from a directory.
///
/// `<dir>/<name>.bcmap` is read as a binary CMap; otherwise `<dir>/<name>`
/// is read as a text CMap.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    dir: PathBuf,
}

impl DirectoryFetcher {
    pub fn new<P: AsRef<Path>>(dir: P) -> DirectoryFetcher {
        DirectoryFetcher {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FetchBuiltInCMap for DirectoryFetcher {
    fn fetch(&self, name: &str) -> Result<BuiltInCMapData> {
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("invalid cmap name {name:?}")).into());
        }
        let binary = self.dir.join(format!("{name}.bcmap"));
        if binary.is_file() {
            debug!("loading binary cmap {}", binary.display());
            return Ok(BuiltInCMapData::new(fs::read(binary)?, CMapCompression::Binary));
        }
        let text = self.dir.join(name);
        debug!("loading text cmap {}", text.display());
        Ok(BuiltInCMapData::new(fs::read(text)?, CMapCompression::None))
    }
}
