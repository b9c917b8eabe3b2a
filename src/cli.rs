//! Command-line commands for batch linkography runs.
//!
//! Commands return a [`CliResult`] instead of printing directly so the
//! binary decides where output goes and which exit code to use.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Subcommand, ValueEnum};

use crate::config::{Config, LinkographConfig, LogFormat};
use crate::embedding::{Embedder, EmbeddingCache, HashingEmbedder, HttpEmbedder};
use crate::engine::{LinkographAnalysis, LinkographyEngine, SessionOutcome};
use crate::export::{read_session, write_metrics_csv, AnalysisWriter};
use crate::moves::MoveStore;

const RULE: &str =
    "═══════════════════════════════════════════════════════════════════════════════\n";

/// Which embedding backend to use.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    /// Offline feature hashing
    Hash,
    /// OpenAI-compatible embedding service
    Http,
}

/// Linkography CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Analyse one or more session files
    Analyze {
        /// Session JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Embedding backend
        #[arg(long, value_enum, default_value = "hash")]
        embedder: EmbedderKind,

        /// Directory for per-session analysis JSON
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// CSV file receiving one metrics row per session
        #[arg(long)]
        metrics_csv: Option<PathBuf>,

        /// Drop move embeddings from the analysis JSON
        #[arg(long)]
        strip_embeddings: bool,

        /// Skip intersection analysis
        #[arg(long)]
        no_intersections: bool,
    },

    /// Show the effective configuration
    Config,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Options for the `analyze` command.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Session JSON files
    pub files: Vec<PathBuf>,
    /// Embedding backend
    pub embedder: EmbedderKind,
    /// Directory for per-session analysis JSON
    pub output_dir: Option<PathBuf>,
    /// CSV file for metrics rows
    pub metrics_csv: Option<PathBuf>,
    /// Drop embeddings from written JSON
    pub strip_embeddings: bool,
    /// Skip intersection analysis
    pub no_intersections: bool,
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, config: Config) -> CliResult {
    match command {
        Commands::Analyze {
            files,
            embedder,
            output_dir,
            metrics_csv,
            strip_embeddings,
            no_intersections,
        } => {
            let options = AnalyzeOptions {
                files,
                embedder,
                output_dir,
                metrics_csv,
                strip_embeddings,
                no_intersections,
            };
            execute_analyze(options, config).await
        }
        Commands::Config => execute_config(&config),
    }
}

/// Execute analyze command.
pub async fn execute_analyze(options: AnalyzeOptions, config: Config) -> CliResult {
    let mut engine_config = config.engine.clone();
    if options.no_intersections {
        engine_config.include_intersections = false;
    }

    let mut output = String::new();
    output.push_str("\nLinkography Analysis\n");
    output.push_str(RULE);
    output.push('\n');

    let mut failures = 0;
    let mut sessions = Vec::new();
    for path in &options.files {
        match read_session(path) {
            Ok(store) => sessions.push(store),
            Err(e) => {
                failures += 1;
                output.push_str(&format!("  ✗ {}: {}\n", path.display(), e));
            }
        }
    }

    let outcomes = match options.embedder {
        EmbedderKind::Hash => {
            let embedder = HashingEmbedder::new(config.embedding.dimensions);
            run_batch(embedder, engine_config, &config, sessions).await
        }
        EmbedderKind::Http => match HttpEmbedder::new(&config.embedding, config.request.clone()) {
            Ok(embedder) => {
                embedder.log_endpoint();
                run_batch(embedder, engine_config, &config, sessions).await
            }
            Err(e) => return CliResult::error(format!("Embedding client error: {}", e)),
        },
    };
    let outcomes = match outcomes {
        Ok(outcomes) => outcomes,
        Err(message) => return CliResult::error(message),
    };

    let mut writer = options
        .output_dir
        .as_ref()
        .map(|dir| AnalysisWriter::new(dir, options.strip_embeddings));
    let mut analyses: Vec<LinkographAnalysis> = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(analysis) => {
                output.push_str(&format!(
                    "  ✓ {}: {} moves, {} links, {} critical, {} patterns\n",
                    outcome.session_id,
                    analysis.metrics.total_moves,
                    analysis.metrics.total_links,
                    analysis.critical_moves.len(),
                    analysis.patterns.patterns.len(),
                ));
                if let Some(writer) = writer.as_mut() {
                    match writer.write(&analysis) {
                        Ok(path) => output.push_str(&format!("      → {}\n", path.display())),
                        Err(e) => {
                            failures += 1;
                            output.push_str(&format!("      write failed: {}\n", e));
                        }
                    }
                }
                analyses.push(analysis);
            }
            Err(e) => {
                failures += 1;
                output.push_str(&format!(
                    "  ✗ {}: linkography unavailable for this session ({})\n",
                    outcome.session_id, e
                ));
            }
        }
    }

    if let Some(path) = &options.metrics_csv {
        match write_metrics_csv(path, &analyses) {
            Ok(rows) => output.push_str(&format!("\nMetrics: {} rows → {}\n", rows, path.display())),
            Err(e) => {
                failures += 1;
                output.push_str(&format!("\nMetrics CSV failed: {}\n", e));
            }
        }
    }

    output.push_str(&format!(
        "\n{} analysed, {} failed\n",
        analyses.len(),
        failures
    ));

    if failures > 0 {
        CliResult::error(output)
    } else {
        CliResult::success(output)
    }
}

async fn run_batch<E: Embedder + 'static>(
    embedder: E,
    engine_config: LinkographConfig,
    config: &Config,
    sessions: Vec<MoveStore>,
) -> Result<Vec<SessionOutcome>, String> {
    let engine = LinkographyEngine::new(
        embedder,
        EmbeddingCache::new(),
        engine_config,
        config.weights.clone(),
    )
    .map_err(|e| format!("Engine setup failed: {}", e))?;

    Ok(Arc::new(engine).analyze_batch(sessions).await)
}

/// Execute config command.
fn execute_config(config: &Config) -> CliResult {
    let engine = &config.engine;
    let mut output = String::new();

    output.push_str("\nLinkography Configuration\n");
    output.push_str(RULE);
    output.push('\n');

    output.push_str("Link Generation:\n");
    output.push_str(&format!("  Similarity Threshold: {:.2}\n", engine.similarity_threshold));
    output.push_str(&format!("  Max Link Range: {}\n", engine.max_link_range));
    output.push_str(&format!("  Lateral Window: {}\n", engine.lateral_window));
    output.push('\n');

    output.push_str("Patterns:\n");
    output.push_str(&format!("  Chunk Window: {}\n", engine.chunk_window_size));
    output.push_str(&format!(
        "  Chunk Density Threshold: {:.2}\n",
        engine.chunk_density_threshold
    ));
    output.push_str(&format!("  Web Link Threshold: {}\n", engine.web_link_threshold));
    output.push_str(&format!("  Sawtooth Min Run: {}\n", engine.sawtooth_min_run));
    output.push_str(&format!("  Orphan Run Threshold: {}\n", engine.orphan_run_threshold));
    output.push_str(&format!("  Breakthrough Window: {}\n", engine.breakthrough_window));
    output.push_str(&format!("  Breakthrough Ratio: {:.2}x\n", engine.breakthrough_ratio));
    output.push('\n');

    output.push_str("Critical Moves:\n");
    output.push_str(&format!("  Floor: {}\n", engine.critical_move_floor));
    output.push_str(&format!(
        "  Fraction: {:.1}%\n",
        engine.critical_move_fraction * 100.0
    ));
    output.push('\n');

    output.push_str("Intersections:\n");
    output.push_str(&format!(
        "  Enabled: {}\n",
        if engine.include_intersections { "YES" } else { "NO" }
    ));
    output.push_str(&format!("  Tolerance: {:.2}\n", engine.intersection_tolerance));
    output.push('\n');

    output.push_str("Embedding Service:\n");
    output.push_str(&format!("  Base URL: {}\n", config.embedding.base_url));
    output.push_str(&format!("  Model: {}\n", config.embedding.model));
    output.push_str(&format!("  Dimensions: {}\n", config.embedding.dimensions));
    output.push_str(&format!(
        "  API Key: {}\n",
        if config.embedding.api_key.is_some() { "set" } else { "not set" }
    ));
    output.push_str(&format!(
        "  Timeout: {}ms, {} retries\n",
        config.request.timeout_ms, config.request.max_retries
    ));
    output.push('\n');

    output.push_str("Logging:\n");
    output.push_str(&format!("  Level: {}\n", config.logging.level));
    output.push_str(&format!(
        "  Format: {}\n",
        match config.logging.format {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    ));

    CliResult::success(output)
}
