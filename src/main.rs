use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vitalis::classify::classify_cause;
use vitalis::config::{self, PipelineConfig};
use vitalis::pipeline::run_pipeline;
use vitalis::reconcile::{is_positive, reconcile};
use vitalis::store::RecordStore;

#[derive(Parser)]
#[command(name = "vitalis", version, about = "Historical death-certificate record pipeline")]
struct Cli {
    /// Root data directory (defaults to ~/Vitalis)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every pipeline stage in sequence, then reconcile the
    /// positive subset
    Run {
        /// Document AI process endpoint
        #[arg(long, env = "VITALIS_OCR_ENDPOINT")]
        ocr_endpoint: Option<String>,

        /// Bearer token for the OCR endpoint
        #[arg(long, env = "VITALIS_OCR_TOKEN", hide_env_values = true)]
        ocr_token: Option<String>,

        /// Ollama base URL
        #[arg(long)]
        ollama_url: Option<String>,

        /// Extraction model name
        #[arg(long)]
        model: Option<String>,
    },

    /// Reconcile the positive subset (files + JSON export) only
    Reconcile,

    /// Classify a single cause-of-death string and print the label
    Classify { text: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let root = cli.data_dir.unwrap_or_else(config::app_data_dir);
    let mut cfg = PipelineConfig::with_data_dir(&root);

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    match cli.command {
        Command::Run {
            ocr_endpoint,
            ocr_token,
            ollama_url,
            model,
        } => {
            if let Some(v) = ocr_endpoint {
                cfg.ocr_endpoint = v;
            }
            if let Some(v) = ocr_token {
                cfg.ocr_access_token = v;
            }
            if let Some(v) = ollama_url {
                cfg.ollama_url = v;
            }
            if let Some(v) = model {
                cfg.model_name = v;
            }

            if let Err(e) = run_pipeline(&cfg) {
                tracing::error!(error = %e, "Pipeline run failed");
                return ExitCode::FAILURE;
            }
        }
        Command::Reconcile => {
            let store = RecordStore::new(&cfg.store_path);
            if let Err(e) = reconcile(
                &store,
                is_positive,
                &cfg.certificates_dir,
                &cfg.filtered_dir,
                &cfg.export_path,
            ) {
                tracing::error!(error = %e, "Reconciliation failed");
                return ExitCode::FAILURE;
            }
        }
        Command::Classify { text } => {
            println!("{}", classify_cause(&text).as_str());
        }
    }

    ExitCode::SUCCESS
}
