use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, LinkographError, LinkographResult};
use crate::metrics::MetricWeights;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Analysis thresholds and windows
    pub engine: LinkographConfig,
    /// Indicator weight tables
    pub weights: MetricWeights,
    /// Embedding service settings
    pub embedding: EmbeddingConfig,
    /// HTTP request settings
    pub request: RequestConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Embedding service configuration
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Service root; `/v1/embeddings` is appended
    pub base_url: String,
    /// Model name sent with each request
    pub model: String,
    /// Bearer token, if the service needs one
    pub api_key: Option<String>,
    /// Expected vector length
    pub dimensions: usize,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable
    Pretty,
    /// One JSON object per line
    Json,
}

/// Largest accepted `MAX_RETRIES`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-request timeout
    pub timeout_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub retry_delay_ms: u64,
}

/// Heuristic thresholds and window sizes for linkograph analysis.
///
/// Every tunable constant of the engine lives here so that re-calibration is
/// a configuration change. Missing fields fall back to their defaults when
/// deserialized from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkographConfig {
    /// Minimum cosine similarity for two moves to be linked
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Maximum index distance between linked moves
    #[serde(default = "default_max_link_range")]
    pub max_link_range: usize,
    /// Links spanning at most this many moves are lateral
    #[serde(default = "default_lateral_window")]
    pub lateral_window: usize,
    /// Number of moves in a chunk window
    #[serde(default = "default_chunk_window_size")]
    pub chunk_window_size: usize,
    /// Internal density a chunk window must exceed
    #[serde(default = "default_chunk_density_threshold")]
    pub chunk_density_threshold: f64,
    /// Minimum total links for a move to anchor a web
    #[serde(default = "default_web_link_threshold")]
    pub web_link_threshold: usize,
    /// Minimum number of chained moves in a sawtooth
    #[serde(default = "default_sawtooth_min_run")]
    pub sawtooth_min_run: usize,
    /// Consecutive orphans needed to raise a struggle signal
    #[serde(default = "default_orphan_run_threshold")]
    pub orphan_run_threshold: usize,
    /// Absolute floor for the critical-move link count
    #[serde(default = "default_critical_move_floor")]
    pub critical_move_floor: usize,
    /// Fraction of the session length used as the critical-move threshold
    #[serde(default = "default_critical_move_fraction")]
    pub critical_move_fraction: f64,
    /// Size of each window compared for breakthroughs
    #[serde(default = "default_breakthrough_window")]
    pub breakthrough_window: usize,
    /// Density ratio the later window must exceed
    #[serde(default = "default_breakthrough_ratio")]
    pub breakthrough_ratio: f64,
    /// Crossings closer than this (in move units) merge into one node
    #[serde(default = "default_intersection_tolerance")]
    pub intersection_tolerance: f64,
    /// Whether to compute rendering-only intersection nodes
    #[serde(default = "default_include_intersections")]
    pub include_intersections: bool,
}

fn default_similarity_threshold() -> f64 {
    0.35
}

fn default_max_link_range() -> usize {
    15
}

fn default_lateral_window() -> usize {
    3
}

fn default_chunk_window_size() -> usize {
    5
}

fn default_chunk_density_threshold() -> f64 {
    0.30
}

fn default_web_link_threshold() -> usize {
    5
}

fn default_sawtooth_min_run() -> usize {
    3
}

fn default_orphan_run_threshold() -> usize {
    3
}

fn default_critical_move_floor() -> usize {
    3
}

fn default_critical_move_fraction() -> f64 {
    0.10
}

fn default_breakthrough_window() -> usize {
    5
}

fn default_breakthrough_ratio() -> f64 {
    1.5
}

fn default_intersection_tolerance() -> f64 {
    0.25
}

fn default_include_intersections() -> bool {
    true
}

impl Default for LinkographConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_link_range: default_max_link_range(),
            lateral_window: default_lateral_window(),
            chunk_window_size: default_chunk_window_size(),
            chunk_density_threshold: default_chunk_density_threshold(),
            web_link_threshold: default_web_link_threshold(),
            sawtooth_min_run: default_sawtooth_min_run(),
            orphan_run_threshold: default_orphan_run_threshold(),
            critical_move_floor: default_critical_move_floor(),
            critical_move_fraction: default_critical_move_fraction(),
            breakthrough_window: default_breakthrough_window(),
            breakthrough_ratio: default_breakthrough_ratio(),
            intersection_tolerance: default_intersection_tolerance(),
            include_intersections: default_include_intersections(),
        }
    }
}

impl LinkographConfig {
    /// Set the similarity threshold
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the maximum link range
    pub fn with_max_link_range(mut self, range: usize) -> Self {
        self.max_link_range = range;
        self
    }

    /// Enable or disable intersection analysis
    pub fn with_intersections(mut self, enabled: bool) -> Self {
        self.include_intersections = enabled;
        self
    }

    /// Check every value against its admissible range.
    pub fn validate(&self) -> LinkographResult<()> {
        check_unit("similarity_threshold", self.similarity_threshold)?;
        check_unit("chunk_density_threshold", self.chunk_density_threshold)?;
        check_unit("critical_move_fraction", self.critical_move_fraction)?;
        check_min("max_link_range", self.max_link_range, 1)?;
        check_min("chunk_window_size", self.chunk_window_size, 2)?;
        check_min("breakthrough_window", self.breakthrough_window, 2)?;
        check_min("web_link_threshold", self.web_link_threshold, 1)?;
        check_min("sawtooth_min_run", self.sawtooth_min_run, 2)?;
        check_min("orphan_run_threshold", self.orphan_run_threshold, 1)?;
        check_min("critical_move_floor", self.critical_move_floor, 1)?;
        check_positive("breakthrough_ratio", self.breakthrough_ratio)?;
        check_positive("intersection_tolerance", self.intersection_tolerance)?;
        Ok(())
    }
}

fn check_unit(field: &str, value: f64) -> LinkographResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(LinkographError::config(
            field,
            format!("must be within [0, 1], got {}", value),
        ))
    }
}

fn check_min(field: &str, value: usize, min: usize) -> LinkographResult<()> {
    if value >= min {
        Ok(())
    } else {
        Err(LinkographError::config(
            field,
            format!("must be at least {}, got {}", min, value),
        ))
    }
}

fn check_positive(field: &str, value: f64) -> LinkographResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(LinkographError::config(
            field,
            format!("must be a positive finite number, got {}", value),
        ))
    }
}

/// Read and parse an environment variable, using `default` only when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e| AppError::Config {
            message: format!("{} has invalid value '{}': {}", key, raw, e),
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = LinkographConfig::default();
        let engine = LinkographConfig {
            similarity_threshold: env_parse(
                "LINKOGRAPHY_SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            )?,
            max_link_range: env_parse("LINKOGRAPHY_MAX_LINK_RANGE", defaults.max_link_range)?,
            lateral_window: env_parse("LINKOGRAPHY_LATERAL_WINDOW", defaults.lateral_window)?,
            chunk_window_size: env_parse(
                "LINKOGRAPHY_CHUNK_WINDOW_SIZE",
                defaults.chunk_window_size,
            )?,
            chunk_density_threshold: env_parse(
                "LINKOGRAPHY_CHUNK_DENSITY_THRESHOLD",
                defaults.chunk_density_threshold,
            )?,
            web_link_threshold: env_parse(
                "LINKOGRAPHY_WEB_LINK_THRESHOLD",
                defaults.web_link_threshold,
            )?,
            sawtooth_min_run: env_parse("LINKOGRAPHY_SAWTOOTH_MIN_RUN", defaults.sawtooth_min_run)?,
            orphan_run_threshold: env_parse(
                "LINKOGRAPHY_ORPHAN_RUN_THRESHOLD",
                defaults.orphan_run_threshold,
            )?,
            critical_move_floor: env_parse(
                "LINKOGRAPHY_CRITICAL_MOVE_FLOOR",
                defaults.critical_move_floor,
            )?,
            critical_move_fraction: env_parse(
                "LINKOGRAPHY_CRITICAL_MOVE_FRACTION",
                defaults.critical_move_fraction,
            )?,
            breakthrough_window: env_parse(
                "LINKOGRAPHY_BREAKTHROUGH_WINDOW",
                defaults.breakthrough_window,
            )?,
            breakthrough_ratio: env_parse(
                "LINKOGRAPHY_BREAKTHROUGH_RATIO",
                defaults.breakthrough_ratio,
            )?,
            intersection_tolerance: env_parse(
                "LINKOGRAPHY_INTERSECTION_TOLERANCE",
                defaults.intersection_tolerance,
            )?,
            include_intersections: env_parse(
                "LINKOGRAPHY_INCLUDE_INTERSECTIONS",
                defaults.include_intersections,
            )?,
        };

        engine.validate().map_err(|e| AppError::Config {
            message: e.to_string(),
        })?;

        let weights = match env::var("LINKOGRAPHY_WEIGHTS_PATH") {
            Ok(path) => MetricWeights::from_json_file(&PathBuf::from(path))?,
            Err(_) => MetricWeights::default(),
        };

        let embedding = EmbeddingConfig {
            base_url: env::var("EMBEDDING_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
            model: env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "all-minilm".to_string()),
            api_key: env::var("EMBEDDING_API_KEY").ok().filter(|k| !k.is_empty()),
            dimensions: env_parse("EMBEDDING_DIMENSIONS", 384)?,
        };

        if embedding.dimensions == 0 {
            return Err(AppError::Config {
                message: "EMBEDDING_DIMENSIONS must be greater than zero".to_string(),
            });
        }

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30000)?,
            max_retries: env_parse("MAX_RETRIES", 3)?,
            retry_delay_ms: env_parse("RETRY_DELAY_MS", 1000)?,
        };

        if request.max_retries > MAX_RETRIES_LIMIT {
            return Err(AppError::Config {
                message: format!(
                    "MAX_RETRIES must be at most {}, got {}",
                    MAX_RETRIES_LIMIT, request.max_retries
                ),
            });
        }

        Ok(Config {
            engine,
            weights,
            embedding,
            request,
            logging,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: LinkographConfig::default(),
            weights: MetricWeights::default(),
            embedding: EmbeddingConfig::default(),
            request: RequestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "all-minilm".to_string(),
            api_key: None,
            dimensions: 384,
        }
    }
}
