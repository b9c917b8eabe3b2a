//! Critical-move classification.
//!
//! A move is critical when its forelink or backlink count reaches
//! `T = max(critical_move_floor, ceil(critical_move_fraction * total_moves))`.

use serde::Serialize;
use tracing::debug;

use crate::config::LinkographConfig;
use crate::linkograph::Linkograph;

/// Which link direction made a move critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalKind {
    /// Many forelinks: opens later work.
    Forward,
    /// Many backlinks: integrates earlier work.
    Backward,
    /// Both: a pivot point.
    Bidirectional,
}

impl CriticalKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            CriticalKind::Forward => "forward",
            CriticalKind::Backward => "backward",
            CriticalKind::Bidirectional => "bidirectional",
        }
    }
}

impl std::fmt::Display for CriticalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A move whose link count clears the critical threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalMove {
    /// Move id.
    pub move_id: String,
    /// Position in the session.
    pub move_index: usize,
    /// Links where this move is the source.
    pub forelinks: usize,
    /// Links where this move is the target.
    pub backlinks: usize,
    /// Classification.
    pub kind: CriticalKind,
}

/// Bidirectional link-count thresholding.
#[derive(Debug, Clone)]
pub struct CriticalMoveClassifier {
    floor: usize,
    fraction: f64,
}

impl CriticalMoveClassifier {
    /// Create a classifier from the critical-move settings in `config`
    pub fn new(config: &LinkographConfig) -> Self {
        Self {
            floor: config.critical_move_floor,
            fraction: config.critical_move_fraction,
        }
    }

    /// Link count a move needs in either direction for a session of
    /// `total_moves` moves.
    pub fn threshold(&self, total_moves: usize) -> usize {
        // Guard against 0.1 * 30 = 3.0000000000000004 rounding up to 4
        let scaled = (self.fraction * total_moves as f64 - 1e-9).ceil().max(0.0) as usize;
        self.floor.max(scaled)
    }

    /// Classify every move; moves below threshold are omitted.
    pub fn classify(&self, graph: &Linkograph) -> Vec<CriticalMove> {
        let threshold = self.threshold(graph.move_count());
        let fore = graph.forelink_counts();
        let back = graph.backlink_counts();

        let critical: Vec<CriticalMove> = graph
            .moves()
            .iter()
            .enumerate()
            .filter_map(|(i, mv)| {
                let kind = match (fore[i] >= threshold, back[i] >= threshold) {
                    (true, true) => CriticalKind::Bidirectional,
                    (true, false) => CriticalKind::Forward,
                    (false, true) => CriticalKind::Backward,
                    (false, false) => return None,
                };
                Some(CriticalMove {
                    move_id: mv.id.clone(),
                    move_index: i,
                    forelinks: fore[i],
                    backlinks: back[i],
                    kind,
                })
            })
            .collect();

        debug!(
            session_id = %graph.session_id(),
            threshold,
            critical = critical.len(),
            "Critical moves classified"
        );

        critical
    }
}
