use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{build_link, Linkograph, LinkographLink};
use crate::config::LinkographConfig;
use crate::embedding::{cosine_similarity, validate_vector, Embedder, EmbeddingCache};
use crate::error::{EmbeddingError, LinkographResult, ValidationError};
use crate::moves::{validate_move, DesignMove, MoveStore};

/// Builds the fuzzy link set for a session.
///
/// Embeddings are resolved per move in this order: the move's own cached
/// vector, the shared [`EmbeddingCache`], then the [`Embedder`]. Any failure
/// aborts the whole run.
pub struct LinkGenerator<E> {
    embedder: E,
    cache: EmbeddingCache,
    config: LinkographConfig,
    embed_timeout: Option<Duration>,
}

impl<E: Embedder> LinkGenerator<E> {
    /// Create a generator; fails if the configuration is invalid.
    pub fn new(
        embedder: E,
        cache: EmbeddingCache,
        config: LinkographConfig,
    ) -> LinkographResult<Self> {
        config.validate()?;
        Ok(Self {
            embedder,
            cache,
            config,
            embed_timeout: None,
        })
    }

    /// Bound each embedding call by `timeout`.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = Some(timeout);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &LinkographConfig {
        &self.config
    }

    /// Shared embedding cache
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Embed every move and link all pairs within `max_link_range`.
    pub async fn generate(&self, store: MoveStore) -> LinkographResult<Linkograph> {
        let start = Instant::now();
        let session_id = store.session_id().to_string();
        let mut moves = store.into_moves();

        for mv in moves.iter_mut() {
            let vector = self.resolve_embedding(mv).await?;
            mv.embedding = Some(vector);
        }

        let links = link_moves(&moves, &self.config);

        info!(
            session_id = %session_id,
            moves = moves.len(),
            links = links.len(),
            threshold = self.config.similarity_threshold,
            max_link_range = self.config.max_link_range,
            elapsed_ms = start.elapsed().as_millis(),
            "Linkograph generated"
        );

        Ok(Linkograph::new(session_id, moves, links))
    }

    /// Append one move, linking it only against the trailing window.
    ///
    /// The result equals a full regeneration over the extended move list.
    pub async fn extend(
        &self,
        linkograph: &Linkograph,
        new_move: DesignMove,
    ) -> LinkographResult<Linkograph> {
        let index = linkograph.move_count();
        validate_move(&new_move, index, linkograph.session_id())?;
        if linkograph.moves().iter().any(|m| m.id == new_move.id) {
            return Err(ValidationError::DuplicateMoveId {
                move_id: new_move.id,
            }
            .into());
        }
        if let Some(last) = linkograph.moves().last() {
            if new_move.timestamp < last.timestamp {
                return Err(ValidationError::NonMonotonicTimestamp {
                    move_id: new_move.id,
                    index,
                }
                .into());
            }
        }

        let mut new_move = new_move;
        let vector = self.resolve_embedding(&new_move).await?;
        new_move.embedding = Some(vector);

        let mut moves = linkograph.moves().to_vec();
        moves.push(new_move);

        let mut links = linkograph.links().to_vec();
        let added = links_into(&moves, index, &self.config);
        debug!(
            session_id = %linkograph.session_id(),
            move_index = index,
            new_links = added.len(),
            "Linkograph extended"
        );
        links.extend(added);

        Ok(Linkograph::new(
            linkograph.session_id().to_string(),
            moves,
            links,
        ))
    }

    async fn resolve_embedding(&self, mv: &DesignMove) -> LinkographResult<Vec<f32>> {
        let dimensions = self.embedder.dimensions();

        if let Some(existing) = &mv.embedding {
            validate_vector(&mv.id, existing, dimensions)?;
            return Ok(existing.clone());
        }

        let model_id = self.embedder.model_id();
        if let Some(cached) = self.cache.get(&model_id, &mv.content).await {
            validate_vector(&mv.id, &cached, dimensions)?;
            return Ok(cached.to_vec());
        }

        let vector = match self.embed_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.embedder.embed(&mv.content))
                .await
                .map_err(|_| EmbeddingError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })??,
            None => self.embedder.embed(&mv.content).await?,
        };

        validate_vector(&mv.id, &vector, dimensions)?;
        self.cache
            .insert(&model_id, &mv.content, Arc::from(vector.as_slice()))
            .await;
        Ok(vector)
    }
}

/// Link every pair `i < j` with `j - i <= max_link_range` whose similarity
/// reaches the threshold. Every move must carry an embedding.
pub(crate) fn link_moves(moves: &[DesignMove], config: &LinkographConfig) -> Vec<LinkographLink> {
    (1..moves.len())
        .flat_map(|target| links_into(moves, target, config))
        .collect()
}

/// Links ending at `target` from the preceding `max_link_range` moves.
fn links_into(
    moves: &[DesignMove],
    target: usize,
    config: &LinkographConfig,
) -> Vec<LinkographLink> {
    let Some(target_vec) = moves[target].embedding.as_deref() else {
        return Vec::new();
    };
    let first = target.saturating_sub(config.max_link_range);

    (first..target)
        .filter_map(|source| {
            let source_vec = moves[source].embedding.as_deref()?;
            let similarity = cosine_similarity(source_vec, target_vec);
            (similarity >= config.similarity_threshold).then(|| {
                build_link(moves, source, target, similarity, config.lateral_window)
            })
        })
        .collect()
}
