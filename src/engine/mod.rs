//! End-to-end session analysis.
//!
//! [`LinkographyEngine`] wires the link generator, pattern detector,
//! critical-move classifier, intersection analyzer and metric mapper into a
//! single pipeline. Only link generation is asynchronous (it may call the
//! embedding service); every later stage is pure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::LinkographConfig;
use crate::critical::{CriticalMove, CriticalMoveClassifier};
use crate::embedding::{Embedder, EmbeddingCache};
use crate::error::{LinkographError, LinkographResult};
use crate::intersection::{IntersectionAnalyzer, IntersectionNode};
use crate::linkograph::{LinkGenerator, Linkograph};
use crate::metrics::{LinkographMetrics, MetricMapper, MetricWeights};
use crate::moves::{DesignMove, MoveStore};
use crate::patterns::{PatternDetector, PatternReport};

/// Complete result of analysing one session.
#[derive(Debug, Clone, Serialize)]
pub struct LinkographAnalysis {
    /// Unique id of this analysis run.
    pub analysis_id: Uuid,
    /// When the analysis finished.
    pub generated_at: DateTime<Utc>,
    /// The graph itself.
    pub linkograph: Linkograph,
    /// Detected patterns and derived signals.
    pub patterns: PatternReport,
    /// Moves above the critical threshold.
    pub critical_moves: Vec<CriticalMove>,
    /// Arc crossings; absent when intersection analysis is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersections: Option<Vec<IntersectionNode>>,
    /// Scalar summary.
    pub metrics: LinkographMetrics,
}

impl LinkographAnalysis {
    /// Session this analysis belongs to
    pub fn session_id(&self) -> &str {
        self.linkograph.session_id()
    }

    /// Copy with move embeddings dropped, for compact output.
    pub fn without_embeddings(&self) -> Self {
        Self {
            linkograph: self.linkograph.without_embeddings(),
            ..self.clone()
        }
    }
}

/// Result for one session of a batch run.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Session id of the input.
    pub session_id: String,
    /// Analysis, or the error that made linkography unavailable.
    pub result: LinkographResult<LinkographAnalysis>,
}

impl SessionOutcome {
    /// Whether the session was analysed successfully
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// The full linkography pipeline.
pub struct LinkographyEngine<E> {
    generator: LinkGenerator<E>,
    detector: PatternDetector,
    classifier: CriticalMoveClassifier,
    intersections: Option<IntersectionAnalyzer>,
    mapper: MetricMapper,
}

impl<E: Embedder> LinkographyEngine<E> {
    /// Create an engine; fails if the configuration or weights are invalid.
    pub fn new(
        embedder: E,
        cache: EmbeddingCache,
        config: LinkographConfig,
        weights: MetricWeights,
    ) -> LinkographResult<Self> {
        weights.validate()?;
        let generator = LinkGenerator::new(embedder, cache, config.clone())?;

        Ok(Self {
            detector: PatternDetector::new(config.clone()),
            classifier: CriticalMoveClassifier::new(&config),
            intersections: config
                .include_intersections
                .then(|| IntersectionAnalyzer::new(config.intersection_tolerance)),
            mapper: MetricMapper::new(&config, weights),
            generator,
        })
    }

    /// Bound each embedding call by `timeout`.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.generator = self.generator.with_embed_timeout(timeout);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &LinkographConfig {
        self.generator.config()
    }

    /// Shared embedding cache
    pub fn cache(&self) -> &EmbeddingCache {
        self.generator.cache()
    }

    /// Analyse one session from scratch.
    pub async fn analyze(&self, store: MoveStore) -> LinkographResult<LinkographAnalysis> {
        let start = Instant::now();
        let linkograph = self.generator.generate(store).await?;
        let analysis = self.analyze_linkograph(linkograph);

        info!(
            session_id = %analysis.session_id(),
            analysis_id = %analysis.analysis_id,
            moves = analysis.metrics.total_moves,
            links = analysis.metrics.total_links,
            critical_moves = analysis.critical_moves.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Session analyzed"
        );

        Ok(analysis)
    }

    /// Append one move to an analysed session and rerun the pure stages.
    pub async fn extend(
        &self,
        previous: &LinkographAnalysis,
        new_move: DesignMove,
    ) -> LinkographResult<LinkographAnalysis> {
        let linkograph = self.generator.extend(&previous.linkograph, new_move).await?;
        Ok(self.analyze_linkograph(linkograph))
    }

    /// Run pattern detection, classification, intersections and metrics on
    /// an existing linkograph.
    pub fn analyze_linkograph(&self, linkograph: Linkograph) -> LinkographAnalysis {
        let patterns = self.detector.detect(&linkograph);
        let critical_moves = self.classifier.classify(&linkograph);
        let intersections = self
            .intersections
            .as_ref()
            .map(|analyzer| analyzer.analyze(&linkograph));
        let metrics = self.mapper.map(&linkograph, &patterns, &critical_moves);

        LinkographAnalysis {
            analysis_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            linkograph,
            patterns,
            critical_moves,
            intersections,
            metrics,
        }
    }
}

impl<E: Embedder + 'static> LinkographyEngine<E> {
    /// Analyse many sessions concurrently.
    ///
    /// Outcomes come back in input order. A failing session is logged and
    /// reported in its own outcome; the others are unaffected.
    pub async fn analyze_batch(self: &Arc<Self>, sessions: Vec<MoveStore>) -> Vec<SessionOutcome> {
        let handles: Vec<_> = sessions
            .into_iter()
            .map(|store| {
                let engine = Arc::clone(self);
                let session_id = store.session_id().to_string();
                let handle = tokio::spawn(async move { engine.analyze(store).await });
                (session_id, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (session_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_error) if join_error.is_panic() => Err(LinkographError::TaskPanicked {
                    message: panic_message(join_error.into_panic()),
                }),
                Err(join_error) => Err(LinkographError::Cancelled {
                    message: join_error.to_string(),
                }),
            };

            if let Err(e) = &result {
                error!(
                    session_id = %session_id,
                    error = %e,
                    "linkography unavailable for this session"
                );
            }
            outcomes.push(SessionOutcome { session_id, result });
        }

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(
            sessions = outcomes.len(),
            failed,
            "Batch analysis complete"
        );

        outcomes
    }
}

/// Best-effort text of a panic payload.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "non-string panic payload".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::error::EmbeddingError;
    use crate::linkograph::test_support::moves;
    use pretty_assertions::assert_eq;

    const DIMS: usize = 4;

    fn basis(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIMS];
        v[axis] = 1.0;
        v
    }

    /// Moves pre-embedded on the given axes, so similarity is exact.
    fn session(id: &str, axes: &[usize]) -> MoveStore {
        let moves = moves(axes.len())
            .into_iter()
            .zip(axes)
            .map(|(mut mv, &axis)| {
                mv.session_id = id.to_string();
                mv.with_embedding(basis(axis))
            })
            .collect();
        MoveStore::new(moves).unwrap()
    }

    fn engine(config: LinkographConfig) -> LinkographyEngine<HashingEmbedder> {
        LinkographyEngine::new(
            HashingEmbedder::new(DIMS),
            EmbeddingCache::new(),
            config,
            MetricWeights::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_analyze_runs_every_stage() {
        // Axis-0 moves at 0, 2, 4, 6 link to each other; the rest are
        // one-offs on distinct axes.
        let store = session("s-1", &[0, 1, 0, 2, 0, 3, 0]);
        let analysis = engine(LinkographConfig::default())
            .analyze(store)
            .await
            .unwrap();

        assert_eq!(analysis.session_id(), "s-1");
        assert_eq!(analysis.linkograph.link_count(), 6);
        assert_eq!(analysis.metrics.total_links, 6);
        assert_eq!(analysis.metrics.orphan_count, 3);
        assert_eq!(analysis.critical_moves.len(), 2);
        assert!(analysis.intersections.is_some());
        assert!(analysis
            .linkograph
            .links()
            .iter()
            .all(|l| (l.strength - 1.0).abs() < 1e-12));
    }

    #[tokio::test]
    async fn test_disabling_intersections_changes_nothing_else() {
        let axes = [0, 1, 0, 1, 0, 2, 1, 0];
        let with = engine(LinkographConfig::default())
            .analyze(session("s", &axes))
            .await
            .unwrap();
        let without = engine(LinkographConfig::default().with_intersections(false))
            .analyze(session("s", &axes))
            .await
            .unwrap();

        assert!(with.intersections.as_ref().is_some_and(|n| !n.is_empty()));
        assert!(without.intersections.is_none());
        assert_eq!(with.linkograph, without.linkograph);
        assert_eq!(with.patterns, without.patterns);
        assert_eq!(with.critical_moves, without.critical_moves);
        assert_eq!(with.metrics, without.metrics);
    }

    #[tokio::test]
    async fn test_batch_isolates_failing_session() {
        let mut bad_moves = session("bad", &[0, 0, 0]).into_moves();
        bad_moves[1].embedding = Some(vec![0.0; DIMS]);
        let bad = MoveStore::new(bad_moves).unwrap();

        let engine = Arc::new(engine(LinkographConfig::default()));
        let outcomes = engine
            .analyze_batch(vec![
                session("first", &[0, 0, 1]),
                bad,
                session("last", &[2, 2]),
            ])
            .await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.session_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "bad", "last"]);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[2].is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(LinkographError::Embedding(EmbeddingError::ZeroVector { .. }))
        ));

        let first = outcomes[0].result.as_ref().unwrap();
        assert_eq!(first.metrics.total_links, 1);
    }

    /// Hashing embedder that panics on one exact text.
    struct TrippingEmbedder {
        inner: HashingEmbedder,
        trip_on: &'static str,
    }

    #[async_trait::async_trait]
    impl Embedder for TrippingEmbedder {
        async fn embed(&self, text: &str) -> crate::error::EmbeddingResult<Vec<f32>> {
            if text == self.trip_on {
                panic!("embedding backend crashed on {:?}", text);
            }
            self.inner.embed(text).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn model_id(&self) -> String {
            self.inner.model_id()
        }
    }

    fn raw_session(id: &str, contents: &[&str]) -> MoveStore {
        let moves = moves(contents.len())
            .into_iter()
            .zip(contents)
            .map(|(mut mv, content)| {
                mv.session_id = id.to_string();
                mv.content = content.to_string();
                mv
            })
            .collect();
        MoveStore::new(moves).unwrap()
    }

    #[tokio::test]
    async fn test_batch_survives_panicking_embedder() {
        let engine = Arc::new(
            LinkographyEngine::new(
                TrippingEmbedder {
                    inner: HashingEmbedder::new(DIMS),
                    trip_on: "collapse",
                },
                EmbeddingCache::new(),
                LinkographConfig::default(),
                MetricWeights::default(),
            )
            .unwrap(),
        );

        let outcomes = engine
            .analyze_batch(vec![
                raw_session("a", &["site survey", "site survey again"]),
                raw_session("b", &["roof study", "collapse"]),
                raw_session("c", &["stair core", "stair core detail"]),
            ])
            .await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.session_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(outcomes[0].is_ok());
        assert!(outcomes[2].is_ok());
        match &outcomes[1].result {
            Err(LinkographError::TaskPanicked { message }) => {
                assert!(message.contains("embedding backend crashed"));
            }
            other => panic!("Expected TaskPanicked, got {:?}", other.as_ref().map(|_| ())),
        }
    }

    #[test]
    fn test_panic_message_reads_str_and_string_payloads() {
        assert_eq!(panic_message(Box::new("static text")), "static text");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_extend_matches_full_analysis() {
        let engine = engine(LinkographConfig::default());
        let full = session("s", &[0, 1, 0, 1, 0]);
        let mut moves = full.moves().to_vec();
        let last = moves.pop().unwrap();

        let partial = engine.analyze(MoveStore::new(moves).unwrap()).await.unwrap();
        let extended = engine.extend(&partial, last).await.unwrap();
        let fresh = engine.analyze(full).await.unwrap();

        assert_eq!(extended.linkograph, fresh.linkograph);
        assert_eq!(extended.patterns, fresh.patterns);
        assert_eq!(extended.metrics, fresh.metrics);
        assert_ne!(extended.analysis_id, fresh.analysis_id);
    }

    #[test]
    fn test_analysis_is_deterministic_apart_from_identity() {
        let engine = engine(LinkographConfig::default());
        let first = tokio_test::block_on(engine.analyze(session("s", &[0, 1, 1, 0, 2]))).unwrap();
        let second = tokio_test::block_on(engine.analyze(session("s", &[0, 1, 1, 0, 2]))).unwrap();

        assert_eq!(first.linkograph, second.linkograph);
        assert_eq!(first.metrics, second.metrics);
        assert_ne!(first.analysis_id, second.analysis_id);
    }

    #[test]
    fn test_without_embeddings_strips_vectors() {
        let engine = engine(LinkographConfig::default());
        let analysis = tokio_test::block_on(engine.analyze(session("s", &[0, 0]))).unwrap();
        let stripped = analysis.without_embeddings();

        assert!(analysis.linkograph.moves().iter().all(|m| m.embedding.is_some()));
        assert!(stripped.linkograph.moves().iter().all(|m| m.embedding.is_none()));
        assert_eq!(stripped.analysis_id, analysis.analysis_id);
        assert_eq!(stripped.metrics, analysis.metrics);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let mut weights = MetricWeights::default();
        weights.density_saturation = 0.0;
        let result = LinkographyEngine::new(
            HashingEmbedder::new(DIMS),
            EmbeddingCache::new(),
            LinkographConfig::default(),
            weights,
        );
        assert!(matches!(
            result,
            Err(LinkographError::Configuration { .. })
        ));
    }
}
