//! Linkograph graph model.
//!
//! A [`Linkograph`] is the moves of one session plus every fuzzy link the
//! [`LinkGenerator`] found between them. Links always point from an earlier
//! move to a later one and are kept sorted by `(source_index, target_index)`.
//! Linkographs are never edited; extending a session produces a new one.

mod generator;

pub use generator::LinkGenerator;

use serde::Serialize;

use crate::moves::{DesignMove, DesignPhase};

/// Role of a link relative to one of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Seen from the earlier move: generative, opens later work.
    Forward,
    /// Seen from the later move: closes onto earlier work.
    Backward,
    /// Both endpoints within the lateral window.
    Lateral,
}

impl LinkType {
    /// Get the link type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Forward => "forward",
            LinkType::Backward => "backward",
            LinkType::Lateral => "lateral",
        }
    }
}

impl std::fmt::Display for LinkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A weighted link between an earlier and a later move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkographLink {
    /// Id of the earlier move.
    pub source_move_id: String,
    /// Id of the later move.
    pub target_move_id: String,
    /// Position of the earlier move in the session.
    pub source_index: usize,
    /// Position of the later move in the session.
    pub target_index: usize,
    /// Cosine similarity of the two moves, in [0, 1].
    pub strength: f64,
    /// `target_index - source_index`.
    pub temporal_distance: usize,
    /// Canonical type: lateral for short links, forward otherwise.
    pub link_type: LinkType,
}

impl LinkographLink {
    /// Type of this link as seen from the move at `index`.
    ///
    /// Returns `None` if the move is not an endpoint of the link.
    pub fn type_from(&self, index: usize) -> Option<LinkType> {
        if self.link_type == LinkType::Lateral
            && (index == self.source_index || index == self.target_index)
        {
            return Some(LinkType::Lateral);
        }
        if index == self.source_index {
            Some(LinkType::Forward)
        } else if index == self.target_index {
            Some(LinkType::Backward)
        } else {
            None
        }
    }

    /// Whether the link connects the moves at `a` and `b` (in either order).
    pub fn connects(&self, a: usize, b: usize) -> bool {
        (self.source_index == a && self.target_index == b)
            || (self.source_index == b && self.target_index == a)
    }
}

/// Moves and links of one analysed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Linkograph {
    session_id: String,
    phase: DesignPhase,
    moves: Vec<DesignMove>,
    links: Vec<LinkographLink>,
}

impl Linkograph {
    /// Assemble a linkograph. Links must come from the generator.
    pub(crate) fn new(
        session_id: String,
        moves: Vec<DesignMove>,
        mut links: Vec<LinkographLink>,
    ) -> Self {
        links.sort_by_key(|l| (l.source_index, l.target_index));
        let phase = majority_phase(&moves);
        Self {
            session_id,
            phase,
            moves,
            links,
        }
    }

    /// Session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Most frequent phase among the moves; ties go to the earlier phase
    pub fn majority_phase(&self) -> DesignPhase {
        self.phase
    }

    /// Moves in session order
    pub fn moves(&self) -> &[DesignMove] {
        &self.moves
    }

    /// All links, sorted by source then target index
    pub fn links(&self) -> &[LinkographLink] {
        &self.links
    }

    /// Number of moves
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    /// Number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Links whose source is the move at `index`.
    pub fn forelinks(&self, index: usize) -> impl Iterator<Item = &LinkographLink> {
        self.links.iter().filter(move |l| l.source_index == index)
    }

    /// Links whose target is the move at `index`.
    pub fn backlinks(&self, index: usize) -> impl Iterator<Item = &LinkographLink> {
        self.links.iter().filter(move |l| l.target_index == index)
    }

    /// Forelink count per move.
    pub fn forelink_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.moves.len()];
        for link in &self.links {
            counts[link.source_index] += 1;
        }
        counts
    }

    /// Backlink count per move.
    pub fn backlink_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.moves.len()];
        for link in &self.links {
            counts[link.target_index] += 1;
        }
        counts
    }

    /// Total links (in + out) of the move at `index`.
    pub fn degree(&self, index: usize) -> usize {
        self.links.iter().filter(|l| l.source_index == index || l.target_index == index).count()
    }

    /// Total links (in + out) per move.
    pub fn degrees(&self) -> Vec<usize> {
        self.forelink_counts()
            .into_iter()
            .zip(self.backlink_counts())
            .map(|(fore, back)| fore + back)
            .collect()
    }

    /// The link between moves `a` and `b`, if any.
    pub fn link_between(&self, a: usize, b: usize) -> Option<&LinkographLink> {
        let key = (a.min(b), a.max(b));
        self.links
            .binary_search_by(|l| (l.source_index, l.target_index).cmp(&key))
            .ok()
            .map(|pos| &self.links[pos])
    }

    /// Whether moves `a` and `b` are linked.
    pub fn has_link(&self, a: usize, b: usize) -> bool {
        self.link_between(a, b).is_some()
    }

    /// Number of links with both endpoints in `start..end`.
    pub fn links_within(&self, start: usize, end: usize) -> usize {
        self.links
            .iter()
            .filter(|l| l.source_index >= start && l.target_index < end)
            .count()
    }

    /// Copy of this linkograph without cached embeddings.
    pub fn without_embeddings(&self) -> Self {
        let mut stripped = self.clone();
        for mv in &mut stripped.moves {
            mv.embedding = None;
        }
        stripped
    }

    /// Build from hand-picked links, bypassing similarity scoring.
    #[cfg(test)]
    pub(crate) fn from_index_pairs(
        session_id: &str,
        moves: Vec<DesignMove>,
        pairs: &[(usize, usize, f64)],
        lateral_window: usize,
    ) -> Self {
        let links = pairs
            .iter()
            .map(|&(s, t, strength)| build_link(&moves, s, t, strength, lateral_window))
            .collect();
        Self::new(session_id.to_string(), moves, links)
    }
}

/// Construct a link between `source < target` with the canonical type.
pub(crate) fn build_link(
    moves: &[DesignMove],
    source: usize,
    target: usize,
    strength: f64,
    lateral_window: usize,
) -> LinkographLink {
    let temporal_distance = target - source;
    let link_type = if temporal_distance <= lateral_window {
        LinkType::Lateral
    } else {
        LinkType::Forward
    };
    LinkographLink {
        source_move_id: moves[source].id.clone(),
        target_move_id: moves[target].id.clone(),
        source_index: source,
        target_index: target,
        strength: strength.clamp(0.0, 1.0),
        temporal_distance,
        link_type,
    }
}

/// Most frequent phase; ties go to the earlier phase in design order.
pub(crate) fn majority_phase(moves: &[DesignMove]) -> DesignPhase {
    let mut best = DesignPhase::Ideation;
    let mut best_count = 0;
    for phase in DesignPhase::ALL {
        let count = moves.iter().filter(|m| m.phase == phase).count();
        if count > best_count {
            best = phase;
            best_count = count;
        }
    }
    best
}
