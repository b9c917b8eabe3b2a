//! Design moves and the per-session move store.
//!
//! A [`MoveStore`] is the validated, read-only sequence of [`DesignMove`]s for
//! one session. It is the only entry point into the engine: everything
//! downstream assumes its invariants (non-empty, unique ids, one session,
//! non-decreasing timestamps).

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Design phase a move was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignPhase {
    /// Generating ideas and concepts.
    Ideation,
    /// Sketching and representing ideas.
    Visualization,
    /// Resolving materials, structure and detail.
    Materialization,
}

impl DesignPhase {
    /// All phases in canonical order.
    pub const ALL: [DesignPhase; 3] = [
        DesignPhase::Ideation,
        DesignPhase::Visualization,
        DesignPhase::Materialization,
    ];

    /// Get the phase name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignPhase::Ideation => "ideation",
            DesignPhase::Visualization => "visualization",
            DesignPhase::Materialization => "materialization",
        }
    }
}

impl std::fmt::Display for DesignPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DesignPhase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ideation" => Ok(DesignPhase::Ideation),
            "visualization" => Ok(DesignPhase::Visualization),
            "materialization" => Ok(DesignPhase::Materialization),
            _ => Err(ValidationError::UnknownPhase {
                value: s.to_string(),
            }),
        }
    }
}

/// Cognitive operation a move performs, as labelled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    /// Examining the problem or an existing proposal.
    Analysis,
    /// Combining elements into a proposal.
    Synthesis,
    /// Judging a proposal against criteria.
    Evaluation,
    /// Modifying an existing proposal.
    Transformation,
    /// Thinking about one's own process.
    Reflection,
}

impl MoveType {
    /// Get the move type name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveType::Analysis => "analysis",
            MoveType::Synthesis => "synthesis",
            MoveType::Evaluation => "evaluation",
            MoveType::Transformation => "transformation",
            MoveType::Reflection => "reflection",
        }
    }
}

impl std::fmt::Display for MoveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MoveType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "analysis" => Ok(MoveType::Analysis),
            "synthesis" => Ok(MoveType::Synthesis),
            "evaluation" => Ok(MoveType::Evaluation),
            "transformation" => Ok(MoveType::Transformation),
            "reflection" => Ok(MoveType::Reflection),
            _ => Err(ValidationError::UnknownMoveType {
                value: s.to_string(),
            }),
        }
    }
}

/// One recorded unit of design thinking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignMove {
    /// Unique move identifier within the session.
    pub id: String,
    /// Session this move belongs to.
    pub session_id: String,
    /// When the move was recorded.
    pub timestamp: DateTime<Utc>,
    /// Design phase of the move.
    pub phase: DesignPhase,
    /// Source text, used only to produce an embedding.
    pub content: String,
    /// Cognitive operation of the move.
    pub move_type: MoveType,
    /// Cached embedding vector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl DesignMove {
    /// Create a new move without an embedding
    pub fn new(
        id: impl Into<String>,
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        phase: DesignPhase,
        move_type: MoveType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            timestamp,
            phase,
            content: content.into(),
            move_type,
            embedding: None,
        }
    }

    /// Attach a precomputed embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Loosely typed move record as read from session files.
///
/// `phase` and `move_type` are kept as strings so that out-of-range values
/// surface as [`ValidationError`]s rather than opaque deserialization errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Move identifier.
    pub id: String,
    /// Session identifier.
    pub session_id: String,
    /// Recording time.
    pub timestamp: DateTime<Utc>,
    /// Phase name.
    pub phase: String,
    /// Move text.
    pub content: String,
    /// Move type name.
    pub move_type: String,
    /// Optional precomputed embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl TryFrom<MoveRecord> for DesignMove {
    type Error = ValidationError;

    fn try_from(record: MoveRecord) -> Result<Self, Self::Error> {
        Ok(DesignMove {
            phase: record.phase.parse()?,
            move_type: record.move_type.parse()?,
            id: record.id,
            session_id: record.session_id,
            timestamp: record.timestamp,
            content: record.content,
            embedding: record.embedding,
        })
    }
}

/// Validated, ordered moves of a single session.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveStore {
    session_id: String,
    moves: Vec<DesignMove>,
}

impl MoveStore {
    /// Validate and take ownership of a session's moves.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the list is empty, a move has an empty
    /// id or content, ids repeat, moves span more than one session, or
    /// timestamps decrease.
    pub fn new(moves: Vec<DesignMove>) -> Result<Self, ValidationError> {
        let first = moves.first().ok_or(ValidationError::EmptySession)?;
        let session_id = first.session_id.clone();

        let mut seen = HashSet::with_capacity(moves.len());
        for (index, mv) in moves.iter().enumerate() {
            validate_move(mv, index, &session_id)?;
            if !seen.insert(mv.id.as_str()) {
                return Err(ValidationError::DuplicateMoveId {
                    move_id: mv.id.clone(),
                });
            }
            if index > 0 && mv.timestamp < moves[index - 1].timestamp {
                return Err(ValidationError::NonMonotonicTimestamp {
                    move_id: mv.id.clone(),
                    index,
                });
            }
        }

        Ok(Self { session_id, moves })
    }

    /// Convert loose records, then validate as in [`MoveStore::new`].
    pub fn from_records(records: Vec<MoveRecord>) -> Result<Self, ValidationError> {
        let moves = records
            .into_iter()
            .map(DesignMove::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(moves)
    }

    /// Session identifier shared by all moves.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Moves in session order.
    pub fn moves(&self) -> &[DesignMove] {
        &self.moves
    }

    /// Number of moves (always at least one).
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Always false; an empty store cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Release the moves.
    pub fn into_moves(self) -> Vec<DesignMove> {
        self.moves
    }
}

/// Check a single move's own fields and its session membership.
pub(crate) fn validate_move(
    mv: &DesignMove,
    index: usize,
    session_id: &str,
) -> Result<(), ValidationError> {
    if mv.id.trim().is_empty() {
        return Err(ValidationError::EmptyMoveId { index });
    }
    if mv.content.trim().is_empty() {
        return Err(ValidationError::EmptyContent {
            move_id: mv.id.clone(),
        });
    }
    if mv.session_id != session_id {
        return Err(ValidationError::SessionMismatch {
            move_id: mv.id.clone(),
            expected: session_id.to_string(),
            found: mv.session_id.clone(),
        });
    }
    Ok(())
}
