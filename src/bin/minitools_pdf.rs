//! Command-line driver for the PDF engine.
//!
//! Usage:
//!   minitools_pdf merge OUT IN...
//!   minitools_pdf split IN RANGES OUTDIR        (RANGES like '[[1,3],[4,10]]')
//!   minitools_pdf rotate IN OUT DEGREES [PAGES]  (PAGES like '[0,2]')
//!   minitools_pdf delete IN OUT PAGES
//!   minitools_pdf reorder IN OUT ORDER
//!   minitools_pdf watermark IN OUT TEXT
//!   minitools_pdf number IN OUT
//!   minitools_pdf lock IN OUT PASSWORD
//!   minitools_pdf unlock IN OUT PASSWORD
//!   minitools_pdf images OUT IMG...
//!   minitools_pdf info IN
//!
//! Set `RUST_LOG=debug` for engine logging.

use minitools_pdf::encryption::EncryptionConfig;
use minitools_pdf::engine;
use minitools_pdf::error::{Error, ErrorBody, Result};
use minitools_pdf::operations::{ImageInput, PageNumberOptions, WatermarkOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "usage: minitools_pdf <merge|split|rotate|delete|reorder|watermark|number|lock|unlock|images|info> ARGS...";

fn read(path: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::InvalidInput(format!("cannot read {}: {}", path, e)))
}

fn write(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    fs::write(path.as_ref(), bytes)?;
    println!("Wrote {} ({} bytes)", path.as_ref().display(), bytes.len());
    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidInput(format!("missing {} argument\n{}", name, USAGE)))
}

fn run(args: &[String]) -> Result<()> {
    let command = arg(args, 0, "command")?;
    match command {
        "merge" => {
            let out = arg(args, 1, "OUT")?;
            let inputs = args[2..].iter().map(|p| read(p)).collect::<Result<Vec<_>>>()?;
            let refs: Vec<&[u8]> = inputs.iter().map(Vec::as_slice).collect();
            write(out, &engine::merge_pdf(&refs)?)
        },
        "split" => {
            let input = read(arg(args, 1, "IN")?)?;
            let ranges = engine::parse_ranges(arg(args, 2, "RANGES")?)?;
            let out_dir = PathBuf::from(arg(args, 3, "OUTDIR")?);
            fs::create_dir_all(&out_dir)?;
            for (index, part) in engine::split_pdf(&input, &ranges)?.iter().enumerate() {
                write(out_dir.join(format!("split_{}.pdf", index + 1)), part)?;
            }
            Ok(())
        },
        "rotate" => {
            let input = read(arg(args, 1, "IN")?)?;
            let degrees = engine::parse_rotation(arg(args, 3, "DEGREES")?)?;
            let pages = args.get(4).map(|p| engine::parse_page_list(p)).transpose()?;
            write(arg(args, 2, "OUT")?, &engine::rotate_pdf(&input, degrees, pages.as_deref())?)
        },
        "delete" => {
            let input = read(arg(args, 1, "IN")?)?;
            let pages = engine::parse_page_list(arg(args, 3, "PAGES")?)?;
            write(arg(args, 2, "OUT")?, &engine::delete_pages(&input, &pages)?)
        },
        "reorder" => {
            let input = read(arg(args, 1, "IN")?)?;
            let order = engine::parse_page_list(arg(args, 3, "ORDER")?)?;
            write(arg(args, 2, "OUT")?, &engine::reorder_pages(&input, &order)?)
        },
        "watermark" => {
            let input = read(arg(args, 1, "IN")?)?;
            let options = WatermarkOptions::text(arg(args, 3, "TEXT")?);
            write(arg(args, 2, "OUT")?, &engine::watermark_pdf(&input, &options)?)
        },
        "number" => {
            let input = read(arg(args, 1, "IN")?)?;
            write(arg(args, 2, "OUT")?, &engine::add_page_numbers(&input, &PageNumberOptions::default())?)
        },
        "lock" => {
            let input = read(arg(args, 1, "IN")?)?;
            let config = EncryptionConfig::new(arg(args, 3, "PASSWORD")?);
            write(arg(args, 2, "OUT")?, &engine::lock_pdf(&input, &config)?)
        },
        "unlock" => {
            let input = read(arg(args, 1, "IN")?)?;
            write(arg(args, 2, "OUT")?, &engine::unlock_pdf(&input, arg(args, 3, "PASSWORD")?)?)
        },
        "images" => {
            let out = arg(args, 1, "OUT")?;
            let images = args[2..]
                .iter()
                .map(|p| read(p).map(ImageInput::new))
                .collect::<Result<Vec<_>>>()?;
            write(out, &engine::images_to_pdf(&images)?)
        },
        "info" => {
            let input = read(arg(args, 1, "IN")?)?;
            let pages = engine::page_count(&input)?;
            let info = engine::get_metadata(&input)?;
            let mut report = serde_json::to_value(&info).map_err(|e| Error::InvalidInput(e.to_string()))?;
            report["pageCount"] = serde_json::json!(pages);
            println!("{:#}", report);
            Ok(())
        },
        other => Err(Error::InvalidInput(format!("unknown command '{}'\n{}", other, USAGE))),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let body = ErrorBody::from(&e);
            eprintln!("Error [{}]: {}", body.code, e);
            ExitCode::FAILURE
        },
    }
}
