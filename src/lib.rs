//! # Linkography Engine
//!
//! Reconstructs a design session's thinking process as a linkograph: a
//! weighted graph over timestamped design moves, linked by the semantic
//! similarity of their text.
//!
//! ## Pipeline
//!
//! ```text
//! MoveRecords → MoveStore → LinkGenerator (Embedder + EmbeddingCache)
//!                                 ↓
//!                            Linkograph
//!        ↓              ↓                  ↓                 ↓
//!  PatternDetector  CriticalMoveClassifier  IntersectionAnalyzer
//!        ↓              ↓
//!              MetricMapper → LinkographMetrics
//! ```
//!
//! - **Link generation**: pairwise cosine similarity within a bounded
//!   temporal range, thresholded into weighted links
//! - **Patterns**: chunks, webs, sawtooth runs, orphans, plus struggle and
//!   breakthrough signals
//! - **Critical moves**: bidirectional link-count thresholding
//! - **Intersections**: arc crossings for rendering
//! - **Metrics**: scalar graph measures and six weighted cognitive indicators
//!
//! Embedding or validation failures are fatal to a session: the engine
//! never produces zeroed metrics in place of an analysis.
//!
//! ## Example
//!
//! ```ignore
//! use linkography_engine::{
//!     Config, EmbeddingCache, HashingEmbedder, LinkographyEngine, MoveStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let engine = LinkographyEngine::new(
//!         HashingEmbedder::default(),
//!         EmbeddingCache::new(),
//!         config.engine,
//!         config.weights,
//!     )?;
//!     let store = MoveStore::from_records(load_records()?)?;
//!     let analysis = engine.analyze(store).await?;
//!     println!("{:?}", analysis.metrics.to_flat_map());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Command-line subcommands.
pub mod cli;
/// Configuration management.
pub mod config;
/// Critical-move classification.
pub mod critical;
/// Embedding backends, cache and vector helpers.
pub mod embedding;
/// Full analysis pipeline and batch runs.
pub mod engine;
/// Error types and result aliases.
pub mod error;
/// Session file loading and result writers.
pub mod export;
/// Arc intersection geometry.
pub mod intersection;
/// Linkograph model and link generation.
pub mod linkograph;
/// Metric mapping and indicator weights.
pub mod metrics;
/// Design moves and session validation.
pub mod moves;
/// Structural pattern detection.
pub mod patterns;

pub use config::{Config, LinkographConfig};
pub use embedding::{Embedder, EmbeddingCache, HashingEmbedder, HttpEmbedder};
pub use engine::{LinkographAnalysis, LinkographyEngine, SessionOutcome};
pub use error::{AppError, AppResult, LinkographError, LinkographResult};
pub use linkograph::{LinkGenerator, Linkograph, LinkographLink};
pub use metrics::{LinkographMetrics, MetricWeights};
pub use moves::{DesignMove, DesignPhase, MoveRecord, MoveStore, MoveType};
