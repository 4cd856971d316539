use std::fs;

use pdf_cmap::{
    BuiltInCMapData, CMapCompression, CMapEncoding, CMapFactory, DirectoryFetcher, Error, IDENTITY_H, MappingRef,
    Result, Token, TokenSource,
};

// "Roman": one byte codespace <00> <FF> and cidrange <20> <7E> -> 1
const ROMAN_BCMAP: &[u8] = &[0x00, 0x00, 0x01, 0x00, 0x81, 0x7F, 0x60, 0x01, 0x20, 0x5E, 0x01];

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fetch_roman(name: &str) -> Result<BuiltInCMapData> {
    match name {
        "Roman" => Ok(BuiltInCMapData::new(ROMAN_BCMAP.to_vec(), CMapCompression::Binary)),
        _ => Err(std::io::Error::from(std::io::ErrorKind::NotFound).into()),
    }
}

#[test]
fn identity_h_covers_two_byte_codes() {
    init_logger();
    let cmap = CMapFactory::new().create(CMapEncoding::Name(IDENTITY_H), None).unwrap();
    assert!(!cmap.is_vertical());
    assert_eq!(cmap.len(), 0x10000);
    assert!((0..=0xFFFF).all(|code| cmap.lookup(code) == Some(MappingRef::Cid(code))));
    assert_eq!(cmap.lookup(0x10000), None);
    assert!(!cmap.contains(0x10000));
}

#[test]
fn unknown_and_unfetchable_names() {
    let factory = CMapFactory::new();
    assert!(matches!(factory.create_by_name("No-Such-CMap"), Err(Error::UnknownCMap(name)) if name == "No-Such-CMap"));
    assert!(matches!(factory.create_by_name("UniJIS-UCS2-H"), Err(Error::FetchRequired(name)) if name == "UniJIS-UCS2-H"));
}

#[test]
fn binary_built_in() {
    init_logger();
    let fetcher = fetch_roman;
    let factory = CMapFactory::with_fetcher(&fetcher);
    let cmap = factory.create_by_name("Roman").unwrap();
    assert!(cmap.is_builtin());
    assert_eq!(cmap.name(), Some("Roman"));
    assert_eq!(cmap.codespace_ranges(1), &[(0x00, 0xFF)]);
    assert_eq!(cmap.lookup(0x20), Some(MappingRef::Cid(1)));
    assert_eq!(cmap.lookup(0x41), Some(MappingRef::Cid(34)));
    assert_eq!(cmap.lookup(0x7F), None);
}

#[test]
fn child_entries_override_base() {
    init_logger();
    let fetcher = fetch_roman;
    let factory = CMapFactory::with_fetcher(&fetcher);
    let data = b"/Roman usecmap\n1 begincidchar\n<41> 500\nendcidchar\nendcmap\n";
    let cmap = factory.create_from_stream(data, None).unwrap();

    assert_eq!(cmap.lookup(0x41), Some(MappingRef::Cid(500)));
    assert_eq!(cmap.lookup(0x42), Some(MappingRef::Cid(35)));
    // no ranges of its own, so the base's are copied
    assert_eq!(cmap.codespace_ranges(1), &[(0x00, 0xFF)]);
    assert_eq!(cmap.use_cmap().and_then(|base| base.name()), Some("Roman"));
}

#[test]
fn child_ranges_are_never_mixed_with_base_ranges() {
    let fetcher = fetch_roman;
    let factory = CMapFactory::with_fetcher(&fetcher);
    let data = b"1 begincodespacerange <8140> <9FFC> endcodespacerange\nendcmap\n";
    let cmap = factory.create_from_stream(data, Some("Roman")).unwrap();

    assert!(cmap.codespace_ranges(1).is_empty());
    assert_eq!(cmap.codespace_ranges(2), &[(0x8140, 0x9FFC)]);
    assert_eq!(cmap.num_codespace_ranges(), 1);
    assert_eq!(cmap.lookup(0x41), Some(MappingRef::Cid(34)));
}

#[test]
fn embedded_identity_is_replaced() {
    let mut data = b"/CMapName /Identity-H def\n1 begincodespacerange <0000> <FFFF> endcodespacerange\n".to_vec();
    data.extend_from_slice(b"1 begincidrange <0000> <FFFF> 0 endcidrange\nendcmap\n");
    let cmap = CMapFactory::new().create_from_stream(&data, None).unwrap();
    assert!(cmap.is_identity_table());
    assert_eq!(cmap.name(), Some(IDENTITY_H));
}

#[test]
fn directory_fetcher() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Roman.bcmap"), ROMAN_BCMAP).unwrap();
    fs::write(
        dir.path().join("Hankaku"),
        b"/Roman usecmap\n/WMode 1 def\n1 begincidrange <A1> <DF> 327 endcidrange\nendcmap\n",
    )
    .unwrap();

    let fetcher = DirectoryFetcher::new(dir.path());
    let factory = CMapFactory::with_fetcher(&fetcher);
    let cmap = factory.create_by_name("Hankaku").unwrap();
    assert!(cmap.is_vertical());
    assert_eq!(cmap.lookup(0xA1), Some(MappingRef::Cid(327)));
    assert_eq!(cmap.lookup(0x20), Some(MappingRef::Cid(1)));
    assert!(matches!(factory.create_by_name("Katakana"), Err(Error::IO(_))));
}

struct Truncated(std::vec::IntoIter<Token>);

impl TokenSource for Truncated {
    fn next_token(&mut self) -> Result<Option<Token>> {
        match self.0.next() {
            Some(token) => Ok(Some(token)),
            None => Err(Error::MissingData),
        }
    }
}

#[test]
fn missing_data_propagates() {
    let tokens = vec![
        Token::Integer(1),
        Token::Command("begincidchar".into()),
        Token::String(vec![0x41]),
    ];
    let result = CMapFactory::new().create_from_tokens(Truncated(tokens.into_iter()), None);
    assert!(matches!(result, Err(ref err) if err.is_missing_data()));
}
