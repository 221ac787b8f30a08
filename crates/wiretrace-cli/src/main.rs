//! wiretrace - Replay binary read scripts and render the recovered structure
//!
//! This tool executes a small read script against a binary file (or inline
//! hex) under a structure tracker, then renders the reconstructed parse tree
//! as JSON, YAML, or a hex-editor pattern definition.
//!
//! ```text
//! wiretrace --file header.bin --script 'magic=raw:4,version=u16,entries=4xu32'
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn, Level};
use tracing_subscriber::EnvFilter;
use wiretrace_core::wire::FieldCode;
use wiretrace_core::{generate_pattern, Endian, RootKind, StructureReader, Wire};

/// Replay binary read scripts against a file and render the recovered structure
#[derive(Parser, Debug)]
#[command(name = "wiretrace")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Read script: comma-separated `[name=]spec` items where spec is one of
    /// u8..u64, i8..i64, f32, f64, raw:N, or NxTYPE for a list of N reads
    #[arg(short, long)]
    script: String,

    /// Byte order for fixed-width reads
    #[arg(long, value_enum, default_value = "big")]
    endian: EndianArg,

    /// Shape of the root container
    #[arg(long, value_enum, default_value = "object")]
    root: RootArg,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Byte offset at which script execution starts
    #[arg(long, default_value = "0")]
    offset: u64,

    /// Write the rendering to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a binary file to read from
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Inline input given as a hex string (whitespace ignored)
    #[arg(long)]
    hex: Option<String>,
}

/// Byte order for fixed-width reads
#[derive(Debug, Clone, Copy, ValueEnum)]
enum EndianArg {
    /// Most significant byte first
    Big,
    /// Least significant byte first
    Little,
}

impl From<EndianArg> for Endian {
    fn from(value: EndianArg) -> Self {
        match value {
            EndianArg::Big => Endian::Big,
            EndianArg::Little => Endian::Little,
        }
    }
}

/// Shape of the root container
#[derive(Debug, Clone, Copy, ValueEnum)]
enum RootArg {
    /// Named fields at the top level
    Object,
    /// Unnamed elements at the top level
    List,
}

impl From<RootArg> for RootKind {
    fn from(value: RootArg) -> Self {
        match value {
            RootArg::Object => RootKind::Object,
            RootArg::List => RootKind::List,
        }
    }
}

/// Output format for the recovered structure
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Viewer payload as JSON
    Json,
    /// Viewer payload as YAML
    Yaml,
    /// Binary-template ("pattern") text for hex editors
    Pattern,
}

/// One step of a read script
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScriptItem {
    /// Field name for the next attachment, when given
    name: Option<String>,
    op: ScriptOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptOp {
    /// Single fixed-width read
    Scalar(FieldCode),
    /// Exact raw read of N bytes
    Raw(usize),
    /// List scope of N fixed-width reads
    Repeat(usize, FieldCode),
}

/// Maps a script type name onto a field code
fn parse_type(spec: &str) -> Option<FieldCode> {
    match spec {
        "u8" => Some(FieldCode::U8),
        "i8" => Some(FieldCode::I8),
        "u16" => Some(FieldCode::U16),
        "i16" => Some(FieldCode::I16),
        "u32" => Some(FieldCode::U32),
        "i32" => Some(FieldCode::I32),
        "u64" => Some(FieldCode::U64),
        "i64" => Some(FieldCode::I64),
        "f32" => Some(FieldCode::F32),
        "f64" => Some(FieldCode::F64),
        _ => None,
    }
}

fn parse_spec(spec: &str) -> Result<ScriptOp> {
    if let Some(code) = parse_type(spec) {
        return Ok(ScriptOp::Scalar(code));
    }
    if let Some(count) = spec.strip_prefix("raw:") {
        let count: usize = count
            .parse()
            .with_context(|| format!("invalid raw byte count in '{}'", spec))?;
        return Ok(ScriptOp::Raw(count));
    }
    if let Some((count, type_name)) = spec.split_once('x') {
        if let Some(code) = parse_type(type_name) {
            let count: usize = count
                .parse()
                .with_context(|| format!("invalid repeat count in '{}'", spec))?;
            return Ok(ScriptOp::Repeat(count, code));
        }
    }
    bail!("unknown read spec '{}'", spec)
}

/// Parses a comma-separated read script into its steps
fn parse_script(script: &str) -> Result<Vec<ScriptItem>> {
    let mut items = Vec::new();
    for raw_item in script.split(',') {
        let raw_item = raw_item.trim();
        if raw_item.is_empty() {
            continue;
        }
        let (name, spec) = match raw_item.split_once('=') {
            Some((name, spec)) => (Some(name.trim().to_string()), spec.trim()),
            None => (None, raw_item),
        };
        items.push(ScriptItem {
            name,
            op: parse_spec(spec)?,
        });
    }
    if items.is_empty() {
        bail!("script is empty");
    }
    Ok(items)
}

/// Runs the script's reads against the tracked cursor
fn execute(reader: &mut StructureReader, items: &[ScriptItem]) -> wiretrace_core::Result<()> {
    for item in items {
        if let Some(name) = &item.name {
            reader.will_read(name.clone());
        }
        match item.op {
            ScriptOp::Raw(count) => {
                reader.wire().read_exact(count)?;
            }
            ScriptOp::Scalar(code) => {
                reader.wire().read_fmt_single(&code.as_char().to_string())?;
            }
            ScriptOp::Repeat(count, code) => {
                let fmt = code.as_char().to_string();
                reader.list(|r| {
                    for _ in 0..count {
                        r.wire().read_fmt_single(&fmt)?;
                    }
                    Ok(())
                })?;
            }
        }
    }
    Ok(())
}

fn render(reader: &StructureReader, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&reader.viewer_payload()).context("JSON rendering failed")
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(&reader.viewer_payload()).context("YAML rendering failed")
        }
        OutputFormat::Pattern => Ok(generate_pattern(&reader.root())),
    }
}

fn load_input(input: &InputMode) -> Result<Vec<u8>> {
    if let Some(file) = &input.file {
        return fs::read(file)
            .with_context(|| format!("failed to read input file: {}", file.display()));
    }
    if let Some(hex_str) = &input.hex {
        let compact: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
        return hex::decode(&compact).context("invalid hex input");
    }
    bail!("either --file or --hex must be specified")
}

/// Writes the rendering to a file
fn write_output(output_path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
    }
    let mut file = fs::File::create(output_path)
        .with_context(|| format!("failed to create file: {}", output_path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write file: {}", output_path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let data = load_input(&cli.input)?;
    debug!("loaded {} input bytes", data.len());
    let items = parse_script(&cli.script)?;

    let mut wire = Wire::from_bytes(data);
    wire.set_endian(cli.endian.into());
    wire.seek_to(cli.offset)
        .with_context(|| format!("offset {} lies outside the input", cli.offset))?;

    let mut reader = StructureReader::with_root(wire, cli.root.into())?;
    if let Err(e) = execute(&mut reader, &items) {
        // render whatever was reconstructed up to the failure point
        warn!("script stopped early: {e}; rendering partial structure");
    }

    let rendered = render(&reader, cli.format)?;
    match &cli.output {
        Some(path) => {
            write_output(path, &rendered)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reader_over_hex(hex_str: &str, root: RootArg, endian: EndianArg) -> StructureReader {
        let compact: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
        let mut wire = Wire::from_bytes(hex::decode(compact).unwrap());
        wire.set_endian(endian.into());
        StructureReader::with_root(wire, root.into()).unwrap()
    }

    #[test]
    fn test_parse_type() {
        assert_eq!(parse_type("u16"), Some(FieldCode::U16));
        assert_eq!(parse_type("f64"), Some(FieldCode::F64));
        assert_eq!(parse_type("u24"), None);
    }

    #[test]
    fn test_parse_script() {
        let items = parse_script("magic=raw:4, version=u16,4xu32,i8").unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].name.as_deref(), Some("magic"));
        assert_eq!(items[0].op, ScriptOp::Raw(4));
        assert_eq!(items[1].op, ScriptOp::Scalar(FieldCode::U16));
        assert_eq!(items[2].name, None);
        assert_eq!(items[2].op, ScriptOp::Repeat(4, FieldCode::U32));
        assert_eq!(items[3].op, ScriptOp::Scalar(FieldCode::I8));
    }

    #[test]
    fn test_parse_script_rejects_garbage() {
        assert!(parse_script("").is_err());
        assert!(parse_script("x=floaty").is_err());
        assert!(parse_script("raw:many").is_err());
    }

    #[test]
    fn test_execute_builds_structure() {
        let mut reader = reader_over_hex(
            "74657374 1234 11223344 55667788",
            RootArg::Object,
            EndianArg::Big,
        );
        let items = parse_script("magic=raw:4,version=u16,words=2xu32").unwrap();
        execute(&mut reader, &items).unwrap();

        let payload = reader.viewer_payload();
        assert_eq!(payload.data, "7465737412341122334455667788");
        let s = &payload.structure;
        assert_eq!(s["$SIZE"], 14);
        assert_eq!(s["magic"]["data_hex"], "74657374");
        assert_eq!(s["version"]["data_fmt"], 0x1234);
        assert_eq!(s["words"]["items"][1]["data_fmt"], 0x55667788u32);
    }

    #[test]
    fn test_execute_partial_on_short_input() {
        let mut reader = reader_over_hex("1234", RootArg::Object, EndianArg::Big);
        let items = parse_script("a=u16,b=u32").unwrap();
        assert!(execute(&mut reader, &items).is_err());
        // the first read survives in the tree
        assert_eq!(reader.viewer_payload().structure["a"]["data_fmt"], 0x1234);
    }

    #[test]
    fn test_render_formats() {
        let mut reader = reader_over_hex("ff00", RootArg::Object, EndianArg::Big);
        execute(&mut reader, &parse_script("flags=u16").unwrap()).unwrap();

        let json = render(&reader, OutputFormat::Json).unwrap();
        assert!(json.contains("\"data\": \"ff00\""));

        let yaml = render(&reader, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("data: ff00"));

        let pattern = render(&reader, OutputFormat::Pattern).unwrap();
        assert!(pattern.contains("be u16 flags;"));
        assert!(pattern.contains("type_0000 root @ 0x00;"));
    }

    #[test]
    fn test_write_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/out.json");
        write_output(&path, "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
