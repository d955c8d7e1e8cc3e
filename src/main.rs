//! Laudo CLI: interpret a hemogram PDF and print the result as JSON.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use laudo_lib::briefing::{
    briefing_or_fallback, OllamaBriefing, StaticBriefing, DEFAULT_MODEL, DEFAULT_OLLAMA_URL,
};
use laudo_lib::config;
use laudo_lib::models::PatientSex;
use laudo_lib::pipeline::extraction::{DocumentExtractor, ExtractionConfig};
use laudo_lib::{LabInterpretation, LabReportProcessor};

#[derive(Parser)]
#[command(
    name = "laudo",
    version,
    about = "Extract hemogram values from a lab report PDF and flag abnormal results"
)]
struct Cli {
    /// Lab report PDF.
    #[arg(value_name = "PDF")]
    pdf: PathBuf,

    /// Patient sex (masculino, feminino; anything else is unspecified).
    #[arg(long)]
    sexo: String,

    /// Patient age in whole years.
    #[arg(long)]
    idade: i32,

    /// Pattern table CSV [default: <data dir>/patterns.csv].
    #[arg(long, value_name = "CSV")]
    patterns: Option<PathBuf>,

    /// Guideline table CSV [default: <data dir>/guideline_map.csv].
    #[arg(long, value_name = "CSV")]
    guidelines: Option<PathBuf>,

    /// Number of specialties to recommend.
    #[arg(long, default_value_t = 3)]
    top: usize,

    /// Add a patient briefing (Ollama when reachable, static text otherwise).
    #[arg(long)]
    briefing: bool,

    /// Ollama base URL used for the briefing.
    #[arg(long, value_name = "URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Ollama model used for the briefing.
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
}

#[derive(Serialize)]
struct Output<'a> {
    #[serde(flatten)]
    interpretation: &'a LabInterpretation,
    #[serde(skip_serializing_if = "Option::is_none")]
    briefing: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    if let Err(error) = run(&cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let patterns = cli.patterns.clone().unwrap_or_else(config::patterns_path);
    let guidelines = cli.guidelines.clone().unwrap_or_else(config::guidelines_path);

    let extractor = DocumentExtractor::with_system_tools(ExtractionConfig::default());
    let processor =
        LabReportProcessor::from_files(&patterns, &guidelines, extractor)?.with_top_n(cli.top);

    let bytes = std::fs::read(&cli.pdf)
        .map_err(|e| format!("cannot read {}: {e}", cli.pdf.display()))?;
    let interpretation = processor.process(&bytes, PatientSex::parse(&cli.sexo), cli.idade)?;

    let briefing = cli.briefing.then(|| {
        match OllamaBriefing::new(&cli.ollama_url, &cli.model, 120) {
            Ok(generator) => briefing_or_fallback(
                &generator,
                &interpretation.findings,
                &interpretation.specialties,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Briefing client unavailable, using static text");
                StaticBriefing::text(&interpretation.findings, &interpretation.specialties)
            }
        }
    });

    let output = Output {
        interpretation: &interpretation,
        briefing,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
