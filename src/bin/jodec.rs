//! jodec CLI — Dump serialisierter Java-Streams als JSON.

#[cfg(feature = "fast-alloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Args, Parser, Subcommand};
use jodec::{DecodeOptions, Decoder, TypeRegistry};
use std::io::Read;
use std::process;
use std::rc::Rc;

#[derive(Parser)]
#[command(name = "jodec", about = "Java serialization stream -> JSON dump")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dump all top-level objects of a stream as JSON
    Dump(DumpArgs),
}

#[derive(Args)]
struct DumpArgs {
    /// Input file (- for stdin)
    #[arg(short, long)]
    input: String,

    /// Pretty-printed JSON output (2-space indent)
    #[arg(long)]
    pretty: bool,

    /// Abort when a string body exceeds this many bytes
    #[arg(long)]
    max_string_length: Option<u64>,

    /// Abort when an array exceeds this many elements
    #[arg(long)]
    max_array_length: Option<u32>,

    /// Abort when the graph nests deeper than this
    #[arg(long)]
    max_depth: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Dump(args) => dump(&args),
    };
    if let Err(msg) = result {
        eprintln!("jodec: {msg}");
        process::exit(1);
    }
}

fn dump(args: &DumpArgs) -> Result<(), String> {
    let data = read_input(&args.input)?;

    let mut options = DecodeOptions::new();
    if let Some(max) = args.max_string_length {
        options = options.with_max_string_length(max);
    }
    if let Some(max) = args.max_array_length {
        options = options.with_max_array_length(max);
    }
    if let Some(max) = args.max_depth {
        options = options.with_max_depth(max);
    }

    // Lenient: jede Klasse wird als Accept-all-Record aufgeloest, der
    // Dump braucht keine registrierten Typen.
    let registry = Rc::new(TypeRegistry::lenient());
    let mut dec =
        Decoder::with_options(&data[..], registry, options).map_err(|e| e.to_string())?;

    let mut values = Vec::new();
    while dec.has_more().map_err(|e| e.to_string())? {
        let value = dec.read_object().map_err(|e| e.to_string())?;
        values.push(jodec::to_json(&value));
    }

    let rendered = if values.len() == 1 {
        values.remove(0)
    } else {
        serde_json::Value::Array(values)
    };
    let out = if args.pretty {
        serde_json::to_string_pretty(&rendered)
    } else {
        serde_json::to_string(&rendered)
    }
    .map_err(|e| e.to_string())?;
    println!("{out}");
    Ok(())
}

fn read_input(path: &str) -> Result<Vec<u8>, String> {
    if path == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| e.to_string())?;
        Ok(buf)
    } else {
        std::fs::read(path).map_err(|e| format!("{path}: {e}"))
    }
}
