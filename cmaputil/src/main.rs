use std::fs;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;
use pdf_cmap::{CMap, CMapFactory, DirectoryFetcher, MappingRef, is_built_in};

#[derive(Parser, Debug)]
#[clap(author, version, about = "CMap utility program using the pdf-cmap library", arg_required_else_help = true)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Directory holding the predefined CMaps, used for built-in names and `usecmap`.
    #[clap(short, long, global = true)]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print name, writing mode, codespace ranges and size of a CMap
    Info {
        /// CMap file, or the name of a predefined CMap when --dir is given
        cmap: String,
    },
    /// Split a hex encoded string into character codes and look them up
    Decode {
        cmap: String,
        /// Bytes to decode, e.g. 8140A1
        hex: String,
    },
}

fn parse_hex(text: &str) -> Result<Vec<u8>, Error> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(Error::new(ErrorKind::InvalidInput, "odd number of hex digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| Error::new(ErrorKind::InvalidInput, format!("invalid hex string {text:?}")))
        })
        .collect()
}

fn load_cmap(source: &str, factory: &CMapFactory) -> pdf_cmap::Result<Arc<CMap>> {
    let path = Path::new(source);
    if !path.exists() {
        if is_built_in(source) || source.starts_with("Identity-") {
            return factory.create_by_name(source);
        }
        return Err(Error::new(ErrorKind::NotFound, format!("no such file or cmap: {source}")).into());
    }
    info!("Open {}", path.display());
    let data = fs::read(path)?;
    if path.extension().is_some_and(|ext| ext == "bcmap") {
        factory.create_from_binary(&data)
    } else {
        factory.create_from_stream(&data, None)
    }
}

fn print_info(cmap: &CMap) {
    println!("name: {}", cmap.name().unwrap_or("-"));
    println!("writing mode: {}", if cmap.is_vertical() { "vertical" } else { "horizontal" });
    println!("built-in: {}", cmap.is_builtin());
    if let Some(base) = cmap.use_cmap() {
        println!("usecmap: {}", base.name().unwrap_or("-"));
    }
    println!("codespace ranges: {}", cmap.num_codespace_ranges());
    for len in 1..=4 {
        for (low, high) in cmap.codespace_ranges(len) {
            println!("  <{low:0width$X}> <{high:0width$X}>", width = len * 2);
        }
    }
    println!("mapped codes: {}", cmap.len());
}

fn print_mapping(code: u32, len: usize, mapping: Option<MappingRef>) {
    let code = format!("<{code:0width$X}>", width = len * 2);
    match mapping {
        Some(MappingRef::Cid(cid)) => println!("{code} cid {cid}"),
        Some(value @ MappingRef::Bytes(bytes)) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            println!("{code} <{hex}> {:?}", value.to_unicode().unwrap_or_default());
        }
        None => println!("{code} unmapped"),
    }
}

fn run(args: Args) -> pdf_cmap::Result<()> {
    let fetcher = args.dir.as_ref().map(DirectoryFetcher::new);
    let factory = match &fetcher {
        Some(fetcher) => CMapFactory::with_fetcher(fetcher),
        None => CMapFactory::new(),
    };
    match args.command {
        Command::Info { cmap } => print_info(&load_cmap(&cmap, &factory)?),
        Command::Decode { cmap, hex } => {
            let cmap = load_cmap(&cmap, &factory)?;
            let bytes = parse_hex(&hex)?;
            let mut offset = 0;
            while offset < bytes.len() {
                let (code, len) = cmap.read_char_code(&bytes, offset);
                print_mapping(code, len, cmap.lookup(code));
                offset += len;
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
