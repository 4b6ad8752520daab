//! # Folio CLI
//!
//! Usage:
//!   folio book.json -o book.pdf
//!   echo '{ ... }' | folio -o book.pdf
//!   folio --example > book.json
//!   folio book.json --layout-json

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use folio::{Book, FontContext};

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(version, about = "Render a book of chapters to PDF", long_about = None)]
struct Args {
    /// Book JSON file. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Where to write the PDF
    #[arg(short, long, default_value = "output.pdf")]
    output: PathBuf,

    /// Print a sample book JSON and exit
    #[arg(long)]
    example: bool,

    /// Print the resolved layout as JSON instead of writing a PDF
    #[arg(long)]
    layout_json: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match (args.quiet, args.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.example {
        print!("{}", example_book_json());
        return Ok(());
    }

    let input = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let book: Book = serde_json::from_str(&input).map_err(folio::FolioError::from)?;
    let fonts = FontContext::from_sources(&book.fonts)?;

    if args.layout_json {
        let doc = folio::layout(&book, &fonts)?;
        println!("{}", serde_json::to_string_pretty(&doc.info())?);
        return Ok(());
    }

    let pdf_bytes = folio::render_with(&book, &fonts)?;
    fs::write(&args.output, &pdf_bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(
        "Written {} bytes to {}",
        pdf_bytes.len(),
        args.output.display()
    );
    Ok(())
}

fn example_book_json() -> &'static str {
    r##"{
  "metadata": {
    "title": "A Short Sampler",
    "author": "Folio",
    "language": "en"
  },
  "config": {
    "pageWidth": 419.53,
    "pageHeight": 595.28,
    "margin": 48,
    "pageNumbers": true
  },
  "chapters": [
    {
      "title": "Hello world",
      "body": "The first chapter is plain Latin text. It wraps at word boundaries and flows onto as many pages as it needs.\n\nA blank line starts a new paragraph."
    },
    {
      "title": "第一章 你好世界",
      "body": "中文段落可以在任意两个汉字之间换行，不需要空格。\n\nMixed lines work too: 中文和 English 可以写在同一行里。"
    }
  ]
}
"##
}
