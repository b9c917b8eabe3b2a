//! Deterministic mapping from linkograph structure to scalar metrics.
//!
//! Graph quantities (density, ratios, entropy, pattern coverage) are
//! computed directly. The six cognitive indicators are weighted linear
//! combinations of normalised inputs; the weights live in [`MetricWeights`]
//! and can be replaced wholesale from a JSON file.

mod weights;

pub use weights::{IndicatorFormula, MetricInput, MetricWeights};

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::config::LinkographConfig;
use crate::critical::{CriticalKind, CriticalMove};
use crate::linkograph::Linkograph;
use crate::moves::{DesignPhase, MoveType};
use crate::patterns::{PatternReport, PatternType};

/// Final scalar summary of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkographMetrics {
    /// Moves in the session.
    pub total_moves: usize,
    /// Links in the graph.
    pub total_links: usize,
    /// Links per move.
    pub link_density: f64,
    /// Mean link strength; zero without links.
    pub average_link_strength: f64,
    /// Critical moves over total moves.
    pub critical_move_ratio: f64,
    /// Forward-only critical moves over total moves.
    pub forward_critical_ratio: f64,
    /// Backward-only critical moves over total moves.
    pub backward_critical_ratio: f64,
    /// Bidirectional critical moves over total moves.
    pub bidirectional_ratio: f64,
    /// Unlinked moves over total moves.
    pub orphan_ratio: f64,
    /// Mean binary entropy of forelink/backlink occupancy, in bits.
    pub entropy: f64,
    /// Share of ideation moves.
    pub ideation_share: f64,
    /// Share of visualization moves.
    pub visualization_share: f64,
    /// Share of materialization moves.
    pub materialization_share: f64,
    /// Normalised Shannon entropy of the phase distribution.
    pub phase_balance: f64,
    /// Detected chunks.
    pub chunk_count: usize,
    /// Detected webs.
    pub web_count: usize,
    /// Detected sawtooth runs.
    pub sawtooth_count: usize,
    /// Orphan moves.
    pub orphan_count: usize,
    /// Runs of consecutive orphans.
    pub struggle_count: usize,
    /// Density jumps.
    pub breakthrough_count: usize,
    /// Indicator in [0, 1].
    pub deep_thinking_engagement: f64,
    /// Indicator in [0, 1].
    pub cognitive_offloading_prevention: f64,
    /// Indicator in [0, 1].
    pub scaffolding_effectiveness: f64,
    /// Indicator in [0, 1].
    pub knowledge_integration: f64,
    /// Indicator in [0, 1].
    pub learning_progression: f64,
    /// Indicator in [0, 1].
    pub metacognitive_awareness: f64,
}

impl LinkographMetrics {
    /// Every metric as `(name, value)` in a fixed order.
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("total_moves", self.total_moves as f64),
            ("total_links", self.total_links as f64),
            ("link_density", self.link_density),
            ("average_link_strength", self.average_link_strength),
            ("critical_move_ratio", self.critical_move_ratio),
            ("forward_critical_ratio", self.forward_critical_ratio),
            ("backward_critical_ratio", self.backward_critical_ratio),
            ("bidirectional_ratio", self.bidirectional_ratio),
            ("orphan_ratio", self.orphan_ratio),
            ("entropy", self.entropy),
            ("ideation_share", self.ideation_share),
            ("visualization_share", self.visualization_share),
            ("materialization_share", self.materialization_share),
            ("phase_balance", self.phase_balance),
            ("chunk_count", self.chunk_count as f64),
            ("web_count", self.web_count as f64),
            ("sawtooth_count", self.sawtooth_count as f64),
            ("orphan_count", self.orphan_count as f64),
            ("struggle_count", self.struggle_count as f64),
            ("breakthrough_count", self.breakthrough_count as f64),
            ("deep_thinking_engagement", self.deep_thinking_engagement),
            (
                "cognitive_offloading_prevention",
                self.cognitive_offloading_prevention,
            ),
            ("scaffolding_effectiveness", self.scaffolding_effectiveness),
            ("knowledge_integration", self.knowledge_integration),
            ("learning_progression", self.learning_progression),
            ("metacognitive_awareness", self.metacognitive_awareness),
        ]
    }

    /// Flat key to float map for CSV/JSON export.
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        self.fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// CSV header: `session_id` followed by the metric names.
    pub fn csv_header() -> String {
        let names: Vec<&str> = Self::empty().fields().into_iter().map(|(k, _)| k).collect();
        format!("session_id,{}", names.join(","))
    }

    /// CSV row matching [`LinkographMetrics::csv_header`].
    pub fn to_csv_row(&self, session_id: &str) -> String {
        let values: Vec<String> = self.fields().into_iter().map(|(_, v)| v.to_string()).collect();
        format!("{},{}", csv_escape(session_id), values.join(","))
    }

    fn empty() -> Self {
        Self {
            total_moves: 0,
            total_links: 0,
            link_density: 0.0,
            average_link_strength: 0.0,
            critical_move_ratio: 0.0,
            forward_critical_ratio: 0.0,
            backward_critical_ratio: 0.0,
            bidirectional_ratio: 0.0,
            orphan_ratio: 0.0,
            entropy: 0.0,
            ideation_share: 0.0,
            visualization_share: 0.0,
            materialization_share: 0.0,
            phase_balance: 0.0,
            chunk_count: 0,
            web_count: 0,
            sawtooth_count: 0,
            orphan_count: 0,
            struggle_count: 0,
            breakthrough_count: 0,
            deep_thinking_engagement: 0.0,
            cognitive_offloading_prevention: 0.0,
            scaffolding_effectiveness: 0.0,
            knowledge_integration: 0.0,
            learning_progression: 0.0,
            metacognitive_awareness: 0.0,
        }
    }
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Normalised indicator inputs, each in [0, 1].
#[derive(Debug, Clone, Default)]
pub struct IndicatorInputs {
    values: BTreeMap<MetricInput, f64>,
}

impl IndicatorInputs {
    /// Value of one input; zero if never set.
    pub fn get(&self, input: MetricInput) -> f64 {
        self.values.get(&input).copied().unwrap_or(0.0)
    }

    fn set(&mut self, input: MetricInput, value: f64) {
        self.values.insert(input, value.clamp(0.0, 1.0));
    }
}

/// Computes [`LinkographMetrics`] from analysis outputs.
#[derive(Debug, Clone)]
pub struct MetricMapper {
    max_link_range: usize,
    breakthrough_window: usize,
    weights: MetricWeights,
}

impl MetricMapper {
    /// Create a mapper
    pub fn new(config: &LinkographConfig, weights: MetricWeights) -> Self {
        Self {
            max_link_range: config.max_link_range,
            breakthrough_window: config.breakthrough_window,
            weights,
        }
    }

    /// Aggregate everything into one metrics record.
    pub fn map(
        &self,
        graph: &Linkograph,
        patterns: &PatternReport,
        critical: &[CriticalMove],
    ) -> LinkographMetrics {
        let n = graph.move_count();
        let total = n.max(1) as f64;
        let links = graph.link_count();

        let kind_count = |kind: CriticalKind| critical.iter().filter(|c| c.kind == kind).count();
        let forward = kind_count(CriticalKind::Forward);
        let backward = kind_count(CriticalKind::Backward);
        let bidirectional = kind_count(CriticalKind::Bidirectional);

        let orphan_count = patterns.count(PatternType::Orphan);
        let phase_shares = phase_shares(graph);

        let link_density = links as f64 / total;
        let average_link_strength = if links == 0 {
            0.0
        } else {
            graph.links().iter().map(|l| l.strength).sum::<f64>() / links as f64
        };
        let critical_move_ratio = critical.len() as f64 / total;
        let orphan_ratio = orphan_count as f64 / total;
        let entropy = link_entropy(graph, self.max_link_range);
        let phase_balance = normalised_entropy(&phase_shares);

        let mut inputs = IndicatorInputs::default();
        let density_norm = link_density / self.weights.density_saturation;
        inputs.set(MetricInput::LinkDensity, density_norm);
        inputs.set(MetricInput::Sparsity, 1.0 - density_norm.min(1.0));
        inputs.set(MetricInput::CriticalMoveRatio, critical_move_ratio);
        inputs.set(
            MetricInput::OpeningRatio,
            (forward + bidirectional) as f64 / total,
        );
        inputs.set(
            MetricInput::ClosingRatio,
            (backward + bidirectional) as f64 / total,
        );
        inputs.set(MetricInput::BidirectionalRatio, bidirectional as f64 / total);
        inputs.set(MetricInput::OrphanRatio, orphan_ratio);
        inputs.set(MetricInput::Entropy, entropy);
        inputs.set(MetricInput::PhaseBalance, phase_balance);
        inputs.set(
            MetricInput::ChunkCoverage,
            pattern_coverage(patterns, PatternType::Chunk, n),
        );
        inputs.set(
            MetricInput::WebCoverage,
            pattern_coverage(patterns, PatternType::Web, n),
        );
        inputs.set(
            MetricInput::SawtoothCoverage,
            pattern_coverage(patterns, PatternType::Sawtooth, n),
        );
        let struggle_moves: usize = patterns.struggles.iter().map(|s| s.len()).sum();
        inputs.set(MetricInput::Steadiness, 1.0 - struggle_moves as f64 / total);
        inputs.set(
            MetricInput::BreakthroughCoverage,
            self.breakthrough_coverage(patterns, n),
        );
        let reflective = graph
            .moves()
            .iter()
            .filter(|m| matches!(m.move_type, MoveType::Reflection | MoveType::Evaluation))
            .count();
        inputs.set(MetricInput::ReflectiveShare, reflective as f64 / total);

        let w = &self.weights;
        let metrics = LinkographMetrics {
            total_moves: n,
            total_links: links,
            link_density,
            average_link_strength,
            critical_move_ratio,
            forward_critical_ratio: forward as f64 / total,
            backward_critical_ratio: backward as f64 / total,
            bidirectional_ratio: bidirectional as f64 / total,
            orphan_ratio,
            entropy,
            ideation_share: phase_shares[0],
            visualization_share: phase_shares[1],
            materialization_share: phase_shares[2],
            phase_balance,
            chunk_count: patterns.count(PatternType::Chunk),
            web_count: patterns.count(PatternType::Web),
            sawtooth_count: patterns.count(PatternType::Sawtooth),
            orphan_count,
            struggle_count: patterns.struggles.len(),
            breakthrough_count: patterns.breakthroughs.len(),
            deep_thinking_engagement: w.deep_thinking_engagement.evaluate(&inputs),
            cognitive_offloading_prevention: w.cognitive_offloading_prevention.evaluate(&inputs),
            scaffolding_effectiveness: w.scaffolding_effectiveness.evaluate(&inputs),
            knowledge_integration: w.knowledge_integration.evaluate(&inputs),
            learning_progression: w.learning_progression.evaluate(&inputs),
            metacognitive_awareness: w.metacognitive_awareness.evaluate(&inputs),
        };

        debug!(
            session_id = %graph.session_id(),
            link_density = metrics.link_density,
            critical_move_ratio = metrics.critical_move_ratio,
            orphan_ratio = metrics.orphan_ratio,
            "Metrics mapped"
        );

        metrics
    }

    /// Fraction of moves inside the later window of some breakthrough.
    fn breakthrough_coverage(&self, patterns: &PatternReport, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let mut covered = vec![false; n];
        for event in &patterns.breakthroughs {
            let end = (event.boundary_index + self.breakthrough_window).min(n);
            for slot in &mut covered[event.boundary_index.min(n)..end] {
                *slot = true;
            }
        }
        covered.iter().filter(|c| **c).count() as f64 / n as f64
    }
}

/// Fraction of moves in at least one pattern of the given type.
fn pattern_coverage(patterns: &PatternReport, pattern_type: PatternType, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let mut covered = vec![false; n];
    for pattern in patterns.of_type(pattern_type) {
        for slot in &mut covered[pattern.start_index..=pattern.end_index.min(n - 1)] {
            *slot = true;
        }
    }
    covered.iter().filter(|c| **c).count() as f64 / n as f64
}

/// Share of moves per phase, in [`DesignPhase::ALL`] order.
fn phase_shares(graph: &Linkograph) -> [f64; 3] {
    let total = graph.move_count().max(1) as f64;
    let mut shares = [0.0; 3];
    for (slot, phase) in shares.iter_mut().zip(DesignPhase::ALL) {
        *slot = graph.moves().iter().filter(|m| m.phase == phase).count() as f64 / total;
    }
    shares
}

/// Shannon entropy of a distribution divided by its maximum.
fn normalised_entropy(shares: &[f64]) -> f64 {
    if shares.len() < 2 {
        return 0.0;
    }
    let h: f64 = shares
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| -p * p.ln())
        .sum();
    h / (shares.len() as f64).ln()
}

fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -p * p.log2() - (1.0 - p) * (1.0 - p).log2()
}

/// Mean binary entropy of forelink and backlink occupancy.
///
/// For each move, occupancy is the fraction of partners within
/// `max_link_range` in that direction that are actually linked.
fn link_entropy(graph: &Linkograph, max_link_range: usize) -> f64 {
    let n = graph.move_count();
    if n < 2 {
        return 0.0;
    }

    let fore = graph.forelink_counts();
    let back = graph.backlink_counts();
    let mut fore_sum = 0.0;
    let mut back_sum = 0.0;

    for i in 0..n {
        let reachable_fore = max_link_range.min(n - 1 - i);
        let reachable_back = max_link_range.min(i);
        if reachable_fore > 0 {
            fore_sum += binary_entropy(fore[i] as f64 / reachable_fore as f64);
        }
        if reachable_back > 0 {
            back_sum += binary_entropy(back[i] as f64 / reachable_back as f64);
        }
    }

    // Exactly n - 1 moves have reachable partners in each direction
    let denom = (n - 1) as f64;
    (fore_sum / denom + back_sum / denom) / 2.0
}
