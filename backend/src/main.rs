//! EFS Writer CLI - one filled EFS form per spreadsheet trade
//!
//! # Commands
//!
//! ```bash
//! efs-writer generate -i trades.xlsx -d out -n transaction   # Fill one PDF per row
//! efs-writer preview trades.xlsx --transformed               # Show what would be filled
//! efs-writer fields "Trade EFS Template.pdf"                 # List template fields
//! efs-writer check-template "Trade EFS Template.pdf"         # Check template against mapping
//! efs-writer serve                                           # Start HTTP server (127.0.0.1:3000)
//! efs-writer serve --host 0.0.0.0 --allow-origin http://localhost:5173
//! ```

use clap::{Parser, Subcommand};
use efs_writer::api::logs::LOG_BROADCASTER;
use efs_writer::config::default_template;
use efs_writer::{
    check_template, expected_fields, load_records, read_source, run, to_field_values,
    AcroFormFiller, FormConstants, FormFiller, OverwritePolicy, RunConfig, UnfilledFieldPolicy,
};
use efs_writer::server::ServerOptions;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "efs-writer")]
#[command(about = "Generate one filled EFS PDF form per spreadsheet trade", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill the template once per input row
    Generate {
        /// Input spreadsheet or delimited file
        #[arg(short, long)]
        input: PathBuf,

        /// Template PDF (default: $EFS_TEMPLATE or "Trade EFS Template.pdf",
        /// looked up next to the input when relative)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Directory receiving the generated files
        #[arg(short = 'd', long)]
        output_dir: PathBuf,

        /// Base output name: files are <name>_1.<ext>, <name>_2.<ext>, ...
        #[arg(short, long)]
        name: String,

        /// Output file extension
        #[arg(long, default_value = "pdf")]
        ext: String,

        /// Abort if any destination file already exists
        #[arg(long)]
        keep_existing: bool,

        /// Template fields left without value: allow, warn or reject
        #[arg(long, default_value = "allow")]
        unfilled: UnfilledFieldPolicy,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Don't echo progress to stderr
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the first rows of an input file
    Preview {
        /// Input spreadsheet or delimited file
        input: PathBuf,

        /// Number of rows to show
        #[arg(short, long, default_value = "10")]
        rows: usize,

        /// Show template field values instead of raw cells
        #[arg(long)]
        transformed: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the fields of a PDF form with their current values
    Fields {
        /// PDF file
        pdf: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a template has every field a run fills
    CheckTemplate {
        /// Template PDF
        pdf: PathBuf,

        /// Also require the Seller/Buyer checkboxes
        #[arg(long)]
        with_side: bool,
    },

    /// Start HTTP server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Origin allowed to call the API cross-origin (repeatable, or comma-separated).
        /// Falls back to EFS_ALLOWED_ORIGINS.
        #[arg(long = "allow-origin", value_delimiter = ',')]
        allow_origin: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            input,
            template,
            output_dir,
            name,
            ext,
            keep_existing,
            unfilled,
            json,
            quiet,
        } => {
            let template = resolve_template(&input, template);
            let overwrite = if keep_existing {
                OverwritePolicy::Keep
            } else {
                OverwritePolicy::Overwrite
            };
            let config = RunConfig::new(input, template, output_dir, name)
                .with_extension(ext)
                .with_overwrite(overwrite)
                .with_unfilled_fields(unfilled)
                .with_constants(FormConstants::from_env());
            LOG_BROADCASTER.set_echo(!quiet);
            cmd_generate(&config, json)
        }

        Commands::Preview {
            input,
            rows,
            transformed,
            output,
        } => cmd_preview(&input, rows, transformed, output.as_deref()),

        Commands::Fields { pdf, output } => cmd_fields(&pdf, output.as_deref()),

        Commands::CheckTemplate { pdf, with_side } => cmd_check_template(&pdf, with_side),

        Commands::Serve {
            host,
            port,
            allow_origin,
        } => cmd_serve(host, port, allow_origin).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Relative templates that don't exist from the working directory are
/// looked up in the input file's directory.
fn resolve_template(input: &Path, template: Option<PathBuf>) -> PathBuf {
    let template = template.unwrap_or_else(default_template);
    if template.is_absolute() || template.exists() {
        return template;
    }
    match input.parent() {
        Some(dir) if dir.join(&template).exists() => dir.join(&template),
        _ => template,
    }
}

fn cmd_generate(config: &RunConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", config.input.display());

    let report = run(config, &AcroFormFiller)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    eprintln!("\n✨ Done! {} files written to {}", report.files.len(), config.output_dir.display());
    Ok(())
}

fn cmd_preview(
    input: &Path,
    rows: usize,
    transformed: bool,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Previewing: {}", input.display());

    let json = if transformed {
        let batch = load_records(input)?;
        eprintln!("   Rows: {}", batch.records.len());
        let fields: Vec<_> = to_field_values(&batch).into_iter().take(rows).collect();
        serde_json::to_string_pretty(&fields)?
    } else {
        let table = read_source(input)?;
        eprintln!("   Rows: {}", table.rows.len());
        eprintln!("   Columns: {}", table.headers.join(", "));
        serde_json::to_string_pretty(&table.preview(rows))?
    };

    write_output(&json, output)
}

fn cmd_fields(pdf: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading fields: {}", pdf.display());

    let fields = AcroFormFiller.form_fields(pdf)?;
    eprintln!("   {} fields", fields.len());

    let json = serde_json::to_string_pretty(&fields)?;
    write_output(&json, output)
}

fn cmd_check_template(pdf: &Path, with_side: bool) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Checking template: {}", pdf.display());

    let fields = AcroFormFiller.form_fields(pdf)?;
    let missing = check_template(&fields, &expected_fields(with_side));

    if missing.is_empty() {
        eprintln!("   ✅ All expected fields present ({} fields in template)", fields.len());
        return Ok(());
    }

    eprintln!("   ❌ Missing {} fields:", missing.len());
    for name in &missing {
        eprintln!("     - {}", name);
    }
    Err(format!("template is missing {} fields", missing.len()).into())
}

async fn cmd_serve(
    host: IpAddr,
    port: u16,
    allowed_origins: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = ServerOptions {
        host,
        port,
        allowed_origins,
    }
    .with_env_origins();
    efs_writer::server::start_server(options).await
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
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
