// cardrecon CLI - card activity report / receipt report reconciliation

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cardrecon_cli::pipeline::{self, RunOutput, RunRequest, RunStatus};
use cardrecon_recon::{ReconConfig, ReconError};

use exit_codes::{
    exit_code_for, EXIT_CONFIG_PARSE, EXIT_ERROR, EXIT_OUTPUT_WRITE, EXIT_SUCCESS, EXIT_UNFINISHED,
};

#[derive(Parser)]
#[command(name = "cardrecon")]
#[command(about = "Reconcile a Card Activity Report against a Receipt Report")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, reconcile, and write per-employee PDFs plus Excel/CSV reports
    #[command(after_help = "\
Examples:
  cardrecon run --car car.pdf --receipts receipts.pdf --out out/
  cardrecon run --car car.pdf --receipts receipts.pdf --out out/ --config recon.toml
  cardrecon run --car car.pdf --receipts receipts.pdf --out out/ --json > dataset.json
  cardrecon run --car car.pdf --receipts receipts.pdf --out out/ --output run.json")]
    Run {
        /// Card Activity Report PDF
        #[arg(long)]
        car: PathBuf,

        /// Receipt Report PDF
        #[arg(long)]
        receipts: PathBuf,

        /// Output directory for employee PDFs and reports
        #[arg(long)]
        out: PathBuf,

        /// Run config (TOML); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Password for encrypted source PDFs
        #[arg(long, env = "CARDRECON_PDF_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Only log warnings and errors
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Validate a run config without running
    #[command(after_help = "\
Examples:
  cardrecon validate recon.toml")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  cardrecon-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let quiet = matches!(cli.command, Commands::Run { quiet: true, .. });
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if quiet { "warn" } else { "info" }),
    )
    .init();

    let result = match cli.command {
        Commands::Run { car, receipts, out, config, json, output, password, quiet: _ } => {
            let request =
                RunRequest { car_pdf: car, receipts_pdf: receipts, out_dir: out, password };
            cmd_run(request, config, json, output)
        }
        Commands::Validate { config } => cmd_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::UnreadablePdf { .. } => {
                Some("check the path; encrypted PDFs need --password or CARDRECON_PDF_PASSWORD")
            }
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Some("run `cardrecon validate <config>` for details")
            }
            _ => None,
        };
        let mut cli = CliError::new(exit_code_for(&err), err.to_string());
        cli.hint = hint.map(str::to_string);
        cli
    }
}

// ============================================================================
// config
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::new(EXIT_CONFIG_PARSE, format!("cannot read config '{}': {e}", path.display()))
    })?;
    Ok(ReconConfig::from_toml(&text)?)
}

fn cmd_validate(path: &Path) -> Result<(), CliError> {
    let config = load_config(Some(path))?;
    eprintln!(
        "ok: '{}' ({} alias(es), tolerance {} cents, date format '{}')",
        config.name,
        config.aliases.len(),
        config.tolerance.amount_cents,
        config.receipts.date_format
    );
    Ok(())
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(
    request: RunRequest,
    config_path: Option<PathBuf>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config_path.as_deref())?;
    let run = pipeline::run(&config, &request)?;

    if json_output || output_file.is_some() {
        let json_str = serde_json::to_string_pretty(&run)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        if let Some(ref path) = output_file {
            std::fs::write(path, &json_str).map_err(|e| {
                CliError::new(EXIT_OUTPUT_WRITE, format!("cannot write output: {e}"))
            })?;
            eprintln!("wrote {}", path.display());
        }
        if json_output {
            println!("{json_str}");
        }
    }

    print_summary(&run);

    let report = &run.report;
    match report.status {
        RunStatus::Complete => Ok(()),
        RunStatus::Unfinished => Err(CliError::new(
            EXIT_UNFINISHED,
            format!("{} employee(s) unfinished", report.unfinished.len()),
        )),
        RunStatus::OutputErrors => Err(CliError::new(
            EXIT_OUTPUT_WRITE,
            format!(
                "{} output error(s), {} employee PDF(s) not written",
                report.report_errors.len(),
                report.pdf_failures.len()
            ),
        )
        .with_hint("reconciliation results are complete; see the messages above")),
    }
}

/// Human summary to stderr.
fn print_summary(run: &RunOutput) {
    let s = &run.report.summary;
    eprintln!(
        "{} employees: {} finished, {} unfinished ({} receipts, {} CAR-only, {} receipt-only)",
        s.total_employees, s.finished, s.unfinished, s.receipt_count, s.car_only, s.receipt_only,
    );
    for e in &run.report.unfinished {
        eprintln!("  {} [{}]: {}", e.display_name, e.key, e.flags.join(", "));
    }
    eprintln!("pdfs: {} written to {}", run.report.pdfs_written, run.report.pdf_dir);
    for f in &run.report.pdf_failures {
        eprintln!("  {}: {}", f.key, f.error);
    }
    if let Some(path) = &run.report.workbook {
        eprintln!("wrote {path}");
    }
    if let Some(path) = &run.report.csv {
        eprintln!("wrote {path}");
    }
    for err in &run.report.report_errors {
        eprintln!("  {err}");
    }
}
