use indexmap::IndexSet;
use log::debug;
use std::sync::Arc;

use crate::builtin::is_built_in;
use crate::cmap::{CMap, IDENTITY_H, IDENTITY_V};
use crate::error::{Error, Result};
use crate::fetch::{CMapCompression, FetchBuiltInCMap};
use crate::parser::{BinaryCMapReader, CMapReader, Lexer, TextCMapReader, TokenSource};

/// Where a CMap comes from: a predefined name or an embedded CMap stream.
#[derive(Debug, Clone, Copy)]
pub enum CMapEncoding<'a> {
    Name(&'a str),
    Stream(&'a [u8]),
}

/// Builds [`CMap`]s from names and embedded streams and resolves `usecmap`.
///
/// Without a fetcher only the identity CMaps can be resolved by name.
#[derive(Clone, Copy, Default)]
pub struct CMapFactory<'a> {
    fetcher: Option<&'a dyn FetchBuiltInCMap>,
}

impl<'a> CMapFactory<'a> {
    pub fn new() -> CMapFactory<'a> {
        CMapFactory { fetcher: None }
    }

    pub fn with_fetcher(fetcher: &'a dyn FetchBuiltInCMap) -> CMapFactory<'a> {
        CMapFactory { fetcher: Some(fetcher) }
    }

    /// `use_cmap` is only honoured for embedded streams.
    pub fn create(&self, encoding: CMapEncoding<'_>, use_cmap: Option<&str>) -> Result<Arc<CMap>> {
        match encoding {
            CMapEncoding::Name(name) => self.create_by_name(name),
            CMapEncoding::Stream(data) => self.create_from_stream(data, use_cmap),
        }
    }

    pub fn create_by_name(&self, name: &str) -> Result<Arc<CMap>> {
        Resolver::new(self).resolve(name)
    }

    pub fn create_from_stream(&self, data: &[u8], use_cmap: Option<&str>) -> Result<Arc<CMap>> {
        self.create_from_tokens(Lexer::new(data), use_cmap)
    }

    /// Read a standalone `.bcmap` file. Its `usecmap` base is resolved by name.
    pub fn create_from_binary(&self, data: &[u8]) -> Result<Arc<CMap>> {
        let mut cmap = CMap::new();
        if let Some(base) = BinaryCMapReader::new(data).read(&mut cmap)? {
            Resolver::new(self).extend(&mut cmap, &base)?;
        }
        Ok(Arc::new(cmap))
    }

    /// Parse an embedded CMap from an arbitrary token source.
    ///
    /// An embedded copy of `Identity-H` or `Identity-V` is replaced by the
    /// shared identity CMap.
    pub fn create_from_tokens<S: TokenSource>(&self, source: S, use_cmap: Option<&str>) -> Result<Arc<CMap>> {
        let mut resolver = Resolver::new(self);
        let mut cmap = CMap::new();
        let base = TextCMapReader::with_use_cmap(source, use_cmap.map(String::from)).read(&mut cmap)?;
        if let Some(base) = base {
            resolver.extend(&mut cmap, &base)?;
        }
        if cmap.has_identity_name() && cmap.is_identity() {
            if let Some(name) = cmap.name() {
                debug!("replacing embedded {name} with the identity cmap");
                return resolver.resolve(name);
            }
        }
        Ok(Arc::new(cmap))
    }
}

/// One resolution, with the names currently being loaded.
struct Resolver<'f, 'a> {
    factory: &'f CMapFactory<'a>,
    in_progress: IndexSet<String>,
}

impl<'f, 'a> Resolver<'f, 'a> {
    fn new(factory: &'f CMapFactory<'a>) -> Self {
        Resolver {
            factory,
            in_progress: IndexSet::new(),
        }
    }

    fn resolve(&mut self, name: &str) -> Result<Arc<CMap>> {
        if name == IDENTITY_H || name == IDENTITY_V {
            let mut cmap = CMap::identity(name == IDENTITY_V, 2);
            cmap.set_name(name);
            return Ok(Arc::new(cmap));
        }
        if !is_built_in(name) {
            return Err(Error::UnknownCMap(name.to_string()));
        }
        let Some(fetcher) = self.factory.fetcher else {
            return Err(Error::FetchRequired(name.to_string()));
        };
        if !self.in_progress.insert(name.to_string()) {
            let chain: Vec<&str> = self.in_progress.iter().map(String::as_str).collect();
            return Err(Error::UsecmapCycle(format!("{} -> {name}", chain.join(" -> "))));
        }

        debug!("loading built-in cmap {name}");
        let data = fetcher.fetch(name)?;
        let mut cmap = CMap::new_builtin();
        cmap.set_name(name);
        let base = match data.compression {
            CMapCompression::Binary => BinaryCMapReader::new(&data.data).read(&mut cmap)?,
            CMapCompression::None => TextCMapReader::new(Lexer::new(&data.data)).read(&mut cmap)?,
            compression @ CMapCompression::Stream => return Err(Error::UnsupportedCompression(compression)),
        };
        // the name given by the caller wins over a CMapName inside the data
        cmap.set_name(name);
        if let Some(base) = base {
            self.extend(&mut cmap, &base)?;
        }
        self.in_progress.pop();
        Ok(Arc::new(cmap))
    }

    fn extend(&mut self, cmap: &mut CMap, base_name: &str) -> Result<()> {
        let base = self.resolve(base_name)?;
        cmap.extend_from(base);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BuiltInCMapData;
    use crate::mapping::MappingRef;

    fn text_fetcher(name: &str) -> Result<BuiltInCMapData> {
        let data: &[u8] = match name {
            "H" => b"/CMapName /H def\n1 begincodespacerange <2121> <7E7E> endcodespacerange\n\
                     1 begincidrange <2121> <217E> 633 endcidrange\nendcmap",
            "V" => b"/H usecmap\n/WMode 1 def\n1 begincidchar <2122> 1 endcidchar\nendcmap",
            "EUC-H" => b"/EUC-V usecmap endcmap",
            "EUC-V" => b"/EUC-H usecmap endcmap",
            "Roman" => b"",
            _ => return Err(std::io::Error::from(std::io::ErrorKind::NotFound).into()),
        };
        let compression = if name == "Roman" {
            CMapCompression::Stream
        } else {
            CMapCompression::None
        };
        Ok(BuiltInCMapData::new(data.to_vec(), compression))
    }

    #[test]
    fn identity_needs_no_fetcher() {
        let factory = CMapFactory::new();
        let cmap = factory.create_by_name(IDENTITY_V).unwrap();
        assert!(cmap.is_identity_table());
        assert!(cmap.is_vertical());
        assert_eq!(cmap.lookup(0xFFFF), Some(MappingRef::Cid(0xFFFF)));
    }

    #[test]
    fn built_in_resolution() {
        let fetcher = text_fetcher;
        let factory = CMapFactory::with_fetcher(&fetcher);
        let v = factory.create_by_name("V").unwrap();
        assert!(v.is_builtin());
        assert!(v.is_vertical());
        assert_eq!(v.name(), Some("V"));
        assert_eq!(v.lookup(0x2121), Some(MappingRef::Cid(633)));
        assert_eq!(v.lookup(0x2122), Some(MappingRef::Cid(1)));
        assert_eq!(v.codespace_ranges(2), &[(0x2121, 0x7E7E)]);
        assert_eq!(v.use_cmap().and_then(|base| base.name()), Some("H"));
    }

    #[test]
    fn usecmap_cycles_are_rejected() {
        let fetcher = text_fetcher;
        let factory = CMapFactory::with_fetcher(&fetcher);
        match factory.create_by_name("EUC-H") {
            Err(Error::UsecmapCycle(chain)) => assert_eq!(chain, "EUC-H -> EUC-V -> EUC-H"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn stream_compression_is_unsupported() {
        let fetcher = text_fetcher;
        let factory = CMapFactory::with_fetcher(&fetcher);
        assert!(matches!(
            factory.create_by_name("Roman"),
            Err(Error::UnsupportedCompression(CMapCompression::Stream))
        ));
    }

    #[test]
    fn fetch_errors_propagate() {
        let fetcher = text_fetcher;
        let factory = CMapFactory::with_fetcher(&fetcher);
        assert!(matches!(factory.create_by_name("B5-H"), Err(Error::IO(_))));
    }

    #[test]
    fn standalone_binary_with_base() {
        let fetcher = text_fetcher;
        let factory = CMapFactory::with_fetcher(&fetcher);
        // usecmap "H", then cidchar <2121> -> 7
        let data = [0x00, 0xE1, 0x01, 0x48, 0x41, 0x01, 0x21, 0x21, 0x07];
        let cmap = factory.create_from_binary(&data).unwrap();
        assert_eq!(cmap.lookup(0x2121), Some(MappingRef::Cid(7)));
        assert_eq!(cmap.lookup(0x2122), Some(MappingRef::Cid(634)));
    }

    #[test]
    fn embedded_stream_with_caller_base() {
        let fetcher = text_fetcher;
        let factory = CMapFactory::with_fetcher(&fetcher);
        let data = b"1 begincidchar <2121> 5 endcidchar endcmap";
        let cmap = factory.create(CMapEncoding::Stream(data), Some("H")).unwrap();
        assert!(!cmap.is_builtin());
        assert_eq!(cmap.lookup(0x2121), Some(MappingRef::Cid(5)));
        assert_eq!(cmap.lookup(0x2122), Some(MappingRef::Cid(634)));
        assert_eq!(cmap.num_codespace_ranges(), 1);
    }
}
