//! jsoncsv CLI - Turn JSON documents into CSV
//!
//! # Main Commands
//!
//! ```bash
//! jsoncsv serve                                 # Start HTTP server (port 3000)
//! jsoncsv export data.json -c config.json       # Export CSV
//! jsoncsv batch data.json -c a.json -c b.json   # Export several CSV files
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! jsoncsv analyze data.json                     # Structure and record count
//! jsoncsv fields data.json                      # Available field paths
//! jsoncsv suggest data.json                     # Suggested column mappings
//! jsoncsv compat old.json new.json              # Re-upload compatibility
//! jsoncsv preview data.json -c config.json      # First rows, unfiltered
//! jsoncsv validate data.json -c config.json     # Check a configuration
//! jsoncsv columns data.json -c config.json      # Column types and samples
//! jsoncsv operations                            # Available transformations
//! ```

use chrono::Local;
use clap::{Parser, Subcommand};
use jsoncsv::pipeline::{self, load_config, profile_columns, validate_config};
use jsoncsv::{operations_description, CsvExportConfig, Ingested, Settings};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "jsoncsv")]
#[command(about = "Transform JSON documents into CSV files", long_about = None)]
struct Cli {
    /// Maximum input size in bytes (default: JSONCSV_MAX_UPLOAD_BYTES or 10 MiB)
    #[arg(long, global = true)]
    max_bytes: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe the structure of a JSON document
    Analyze {
        /// Input JSON file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the field paths available for mapping
    Fields {
        /// Input JSON file
        input: PathBuf,
    },

    /// Suggest CSV column names for every field path
    Suggest {
        /// Input JSON file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a new document keeps every path of an old one
    Compat {
        /// Previously uploaded JSON file
        old: PathBuf,

        /// Replacement JSON file
        new: PathBuf,
    },

    /// Preview the first transformed rows (filters and column order ignored)
    Preview {
        /// Input JSON file
        input: PathBuf,

        /// Export configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Number of rows (1-20)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Validate an export configuration against a document
    Validate {
        /// Input JSON file
        input: PathBuf,

        /// Export configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Export a document to CSV
    Export {
        /// Input JSON file
        input: PathBuf,

        /// Export configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export one CSV file per configuration
    Batch {
        /// Input JSON file
        input: PathBuf,

        /// Export configuration files
        #[arg(short, long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Directory receiving the CSV files
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Show inferred types and sample values per mapped column
    Columns {
        /// Input JSON file
        input: PathBuf,

        /// Export configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show available transformations and callback functions
    Operations,

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: JSONCSV_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(max) = cli.max_bytes {
        settings.max_upload_bytes = max;
    }

    let result = match cli.command {
        Commands::Analyze { input, output } => cmd_analyze(&settings, &input, output.as_deref()),

        Commands::Fields { input } => cmd_fields(&settings, &input),

        Commands::Suggest { input, output } => cmd_suggest(&settings, &input, output.as_deref()),

        Commands::Compat { old, new } => cmd_compat(&settings, &old, &new),

        Commands::Preview {
            input,
            config,
            limit,
        } => cmd_preview(&settings, &input, &config, limit),

        Commands::Validate { input, config } => cmd_validate(&settings, &input, &config),

        Commands::Export {
            input,
            config,
            output,
        } => cmd_export(&settings, &input, &config, output.as_deref()),

        Commands::Batch {
            input,
            configs,
            out_dir,
        } => cmd_batch(&settings, &input, &configs, &out_dir),

        Commands::Columns { input, config } => cmd_columns(&settings, &input, &config),

        Commands::Operations => cmd_operations(),

        Commands::Serve { port } => cmd_serve(settings, port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn read_document(settings: &Settings, input: &Path) -> Result<Ingested, Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());
    let bytes = fs::read(input)?;
    Ok(pipeline::ingest(&bytes, settings.max_upload_bytes)?)
}

fn read_config(path: &Path) -> Result<CsvExportConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)?;
    Ok(load_config(&document)?)
}

fn cmd_analyze(settings: &Settings, input: &Path, output: Option<&Path>) -> CliResult {
    let doc = read_document(settings, input)?;
    let summary = json!({
        "encoding": doc.encoding,
        "recordCount": doc.record_count,
        "fieldPaths": doc.field_paths,
        "structure": doc.structure,
    });
    write_output(&serde_json::to_string_pretty(&summary)?, output)
}

fn cmd_fields(settings: &Settings, input: &Path) -> CliResult {
    let doc = read_document(settings, input)?;
    for path in &doc.field_paths {
        println!("{}", path);
    }
    Ok(())
}

fn cmd_suggest(settings: &Settings, input: &Path, output: Option<&Path>) -> CliResult {
    let doc = read_document(settings, input)?;
    let suggestion = pipeline::suggest(&doc.value);
    write_output(&serde_json::to_string_pretty(&suggestion)?, output)
}

fn cmd_compat(settings: &Settings, old: &Path, new: &Path) -> CliResult {
    let previous = read_document(settings, old)?;
    eprintln!("📄 Comparing with: {}", new.display());
    let bytes = fs::read(new)?;
    let reupload = pipeline::check_reupload(&previous.structure, &bytes, settings.max_upload_bytes)?;
    eprintln!("✅ {}", reupload.report.message);
    println!("{}", serde_json::to_string_pretty(&reupload.report)?);
    Ok(())
}

fn cmd_preview(settings: &Settings, input: &Path, config: &Path, limit: Option<usize>) -> CliResult {
    let doc = read_document(settings, input)?;
    let config = read_config(config)?;
    let limit = pipeline::preview_limit(limit, settings.preview_default)?;
    let preview = pipeline::preview(
        &doc.value,
        &config.field_mappings,
        &config.transformations,
        Some(limit),
    )?;
    eprintln!(
        "   Showing {} of {} record(s)",
        preview.preview_records, preview.total_records
    );
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

fn cmd_validate(settings: &Settings, input: &Path, config: &Path) -> CliResult {
    let doc = read_document(settings, input)?;
    let config = read_config(config)?;
    match validate_config(&doc.value, &config) {
        Ok(()) => {
            eprintln!("✅ Configuration is valid");
            Ok(())
        }
        Err(err) => {
            eprintln!("\n❌ Configuration is invalid:");
            for message in err.messages() {
                eprintln!("   - {}", message);
            }
            std::process::exit(1);
        }
    }
}

fn cmd_export(settings: &Settings, input: &Path, config: &Path, output: Option<&Path>) -> CliResult {
    let doc = read_document(settings, input)?;
    let config = read_config(config)?;
    let csv = pipeline::export_csv(&doc.value, &config)?;
    write_csv(&csv, output)
}

fn cmd_batch(settings: &Settings, input: &Path, configs: &[PathBuf], out_dir: &Path) -> CliResult {
    let doc = read_document(settings, input)?;
    let configs = configs
        .iter()
        .map(|path| read_config(path))
        .collect::<Result<Vec<_>, _>>()?;

    let batch = pipeline::export_batch(&doc.value, &configs, &Local::now().naive_local())?;
    fs::create_dir_all(out_dir)?;
    for file in batch.files() {
        let path = out_dir.join(&file.filename);
        fs::write(&path, &file.content)?;
        eprintln!("   💾 {} ({} bytes)", path.display(), file.size);
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_columns(settings: &Settings, input: &Path, config: &Path) -> CliResult {
    let doc = read_document(settings, input)?;
    let config = read_config(config)?;
    let analysis = profile_columns(&doc.value, &config.field_mappings);
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn cmd_operations() -> CliResult {
    println!("{}", operations_description());
    Ok(())
}

async fn cmd_serve(settings: Settings, port: Option<u16>) -> CliResult {
    let settings = match port {
        Some(port) => settings.with_port(port),
        None => settings,
    };
    jsoncsv::server::start_server(settings).await
}

fn write_output(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

/// CSV already ends with its terminator, so stdout gets it verbatim.
fn write_csv(content: &str, path: Option<&Path>) -> CliResult {
    match path {
        Some(_) => write_output(content, path),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_output_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv("Name\nAnn\n", Some(&path)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Name\nAnn\n");
    }

    #[test]
    fn test_read_config_rejects_bad_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"name": "no mappings"}"#).unwrap();
        assert!(read_config(&path).is_err());

        fs::write(&path, r#"{"field_mappings": {"Name": "name"}}"#).unwrap();
        let config = read_config(&path).unwrap();
        assert_eq!(config.field_mappings.len(), 1);
    }

    #[test]
    fn test_batch_writes_files() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("data.json");
        fs::write(&input, r#"[{"name": "Ann", "age": 30}]"#).unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        fs::write(&a, r#"{"name": "names", "field_mappings": {"Name": "name"}}"#).unwrap();
        fs::write(&b, r#"{"name": "ages", "field_mappings": {"Age": "age"}}"#).unwrap();
        let out = dir.path().join("out");

        cmd_batch(&Settings::default(), &input, &[a, b], &out).unwrap();

        let mut names: Vec<String> = fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("ages_"));
        assert!(names[1].starts_with("names_"));
    }
}
