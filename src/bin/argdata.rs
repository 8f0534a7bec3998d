//! argdata CLI — JSON <-> argdata conversion.
//!
//! The translation front end of the system: `encode` turns a JSON config
//! document into an argdata buffer plus descriptor array using only the
//! public constructor API, and `inspect` walks a received buffer back into
//! JSON through the public accessor/iterator API. Descriptor, binary and
//! timestamp values use single-key objects (`@fd`, `@binary`,
//! `@timestamp`), standing in for the custom document tags of the original
//! YAML front end.

use std::io::{Read, Write};
use std::process;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Args, Parser, Subcommand};

use argdata::{serializer, Argdata, Kind};

#[derive(Parser)]
#[command(name = "argdata", about = "JSON <-> argdata conversion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a JSON document to an argdata buffer
    Encode(EncodeArgs),
    /// Decode an argdata buffer to JSON
    Inspect(InspectArgs),
}

#[derive(Args)]
struct EncodeArgs {
    /// Input file (- for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Output file (- for stdout)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Write the descriptor array here, one decimal per line
    /// (default: report on stderr)
    #[arg(short, long)]
    fds_out: Option<String>,
}

#[derive(Args)]
struct InspectArgs {
    /// Input file (- for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Pretty-printed JSON output (2-space indent)
    #[arg(long)]
    pretty: bool,
}

fn main() {
    match Cli::parse().command {
        Command::Encode(args) => encode(&args),
        Command::Inspect(args) => inspect(&args),
    }
}

fn die(message: impl AsRef<str>) -> ! {
    eprintln!("argdata: {}", message.as_ref());
    process::exit(1);
}

fn read_input(path: &str) -> Vec<u8> {
    let mut data = Vec::new();
    let result = if path == "-" {
        std::io::stdin().read_to_end(&mut data)
    } else {
        std::fs::File::open(path).and_then(|mut f| f.read_to_end(&mut data))
    };
    if let Err(e) = result {
        die(format!("failed to read {path}: {e}"));
    }
    data
}

fn write_output(path: &str, data: &[u8]) {
    let result = if path == "-" {
        std::io::stdout().write_all(data)
    } else {
        std::fs::write(path, data)
    };
    if let Err(e) = result {
        die(format!("failed to write {path}: {e}"));
    }
}

fn encode(args: &EncodeArgs) {
    let input = read_input(&args.input);
    let document: serde_json::Value = match serde_json::from_slice(&input) {
        Ok(document) => document,
        Err(e) => die(format!("invalid JSON: {e}")),
    };

    let tree = build(&document);
    let (buf, fds) = match serializer::serialize_to_vec(&tree) {
        Ok(pair) => pair,
        Err(e) => die(format!("serialization failed: {e}")),
    };

    write_output(&args.output, &buf);
    match &args.fds_out {
        Some(path) => {
            let mut listing = String::new();
            for fd in &fds {
                listing.push_str(&fd.to_string());
                listing.push('\n');
            }
            write_output(path, listing.as_bytes());
        }
        None => eprintln!("descriptors: {fds:?}"),
    }
}

/// Builds a tree from a JSON document through the constructor API.
///
/// The tree only has to live until serialization, and composite
/// constructors borrow caller-owned child arrays; leaking the arrays keeps
/// that contract trivial for a process that exits right after, the same
/// way the original front end never freed its nodes.
fn build(value: &serde_json::Value) -> Argdata<'static> {
    use serde_json::Value;
    match value {
        Value::Null => Argdata::null(),
        Value::Bool(b) => Argdata::boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Argdata::int(i)
            } else if let Some(u) = n.as_u64() {
                Argdata::int(u)
            } else if let Some(f) = n.as_f64() {
                Argdata::float(f)
            } else {
                die(format!("unrepresentable number: {n}"))
            }
        }
        Value::String(s) => Argdata::str(s.clone()),
        Value::Array(entries) => {
            let children: Vec<Argdata<'static>> = entries.iter().map(build).collect();
            Argdata::seq(Box::leak(children.into_boxed_slice()))
        }
        Value::Object(fields) => {
            if let Some(special) = build_special(fields) {
                return special;
            }
            let keys: Vec<Argdata<'static>> = fields
                .keys()
                .map(|k| Argdata::str(k.clone()))
                .collect();
            let values: Vec<Argdata<'static>> = fields.values().map(build).collect();
            Argdata::map(
                Box::leak(keys.into_boxed_slice()),
                Box::leak(values.into_boxed_slice()),
            )
        }
    }
}

/// Recognizes the single-key special forms `@fd`, `@binary`, `@timestamp`.
fn build_special(fields: &serde_json::Map<String, serde_json::Value>) -> Option<Argdata<'static>> {
    if fields.len() != 1 {
        return None;
    }
    let (key, value) = fields.iter().next()?;
    match key.as_str() {
        "@fd" => {
            let fd = value
                .as_u64()
                .and_then(|fd| u32::try_from(fd).ok())
                .unwrap_or_else(|| die(format!("invalid descriptor number: {value}")));
            Some(Argdata::fd(fd))
        }
        "@binary" => {
            let encoded = value
                .as_str()
                .unwrap_or_else(|| die("@binary expects a base64 string"));
            let blob = BASE64
                .decode(encoded)
                .unwrap_or_else(|e| die(format!("invalid base64 in @binary: {e}")));
            Some(Argdata::binary(Box::leak(blob.into_boxed_slice())))
        }
        "@timestamp" => {
            let sec = value
                .get("sec")
                .and_then(|v| v.as_i64())
                .unwrap_or_else(|| die("@timestamp expects integer sec"));
            let nsec = value
                .get("nsec")
                .and_then(|v| v.as_u64())
                .and_then(|n| u32::try_from(n).ok())
                .filter(|&n| n < 1_000_000_000)
                .unwrap_or_else(|| die("@timestamp expects nsec below one billion"));
            Some(Argdata::timestamp(sec, nsec))
        }
        _ => None,
    }
}

fn inspect(args: &InspectArgs) {
    let input = read_input(&args.input);
    let root = Argdata::encoded(&input);
    let document = render(&root);
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&document)
    } else {
        serde_json::to_string(&document)
    };
    match rendered {
        Ok(mut text) => {
            text.push('\n');
            write_output("-", text.as_bytes());
        }
        Err(e) => die(format!("failed to render JSON: {e}")),
    }
}

/// Walks a buffer-backed value back into a JSON document.
fn render(value: &Argdata) -> serde_json::Value {
    use serde_json::{json, Value};
    let kind = value
        .kind()
        .unwrap_or_else(|e| die(format!("malformed input: {e}")));
    match kind {
        Kind::Null => Value::Null,
        Kind::Bool => Value::Bool(checked(value.get_bool())),
        Kind::Int => {
            if let Ok(i) = value.get_int::<i64>() {
                json!(i)
            } else {
                json!(checked(value.get_int::<u64>()))
            }
        }
        Kind::Float => {
            let f = checked(value.get_float());
            serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or_else(|| die(format!("float {f} has no JSON form")))
        }
        Kind::Timestamp => {
            let ts = checked(value.get_timestamp());
            json!({ "@timestamp": { "sec": ts.sec, "nsec": ts.nsec } })
        }
        Kind::Binary => {
            let blob = checked(value.get_binary());
            json!({ "@binary": BASE64.encode(blob) })
        }
        Kind::Str => Value::String(checked(value.get_str()).to_owned()),
        Kind::Fd => json!({ "@fd": checked(value.get_fd()) }),
        Kind::Seq => {
            let mut entries = Vec::new();
            let mut it = checked(value.seq_iter());
            while let Some(entry) = it.next() {
                entries.push(render(checked(entry)));
            }
            Value::Array(entries)
        }
        Kind::Map => {
            let mut fields = serde_json::Map::new();
            let mut it = checked(value.map_iter());
            while let Some(pair) = it.next() {
                let (key, entry) = checked(pair);
                let key = checked(key.get_str()).to_owned();
                let rendered = render(entry);
                fields.insert(key, rendered);
            }
            Value::Object(fields)
        }
    }
}

fn checked<T>(result: argdata::Result<T>) -> T {
    result.unwrap_or_else(|e| die(format!("malformed input: {e}")))
}
