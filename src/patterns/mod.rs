//! Structural pattern detection over a linkograph.
//!
//! Four pattern families are detected independently:
//! - **Chunk**: a fixed-size window of moves whose internal link density
//!   exceeds `chunk_density_threshold`
//! - **Web**: a move with at least `web_link_threshold` links, together with
//!   every move it links to
//! - **Sawtooth**: a run of moves each linked to its immediate predecessor
//! - **Orphan**: a move with no links at all
//!
//! Two derived signals are reported alongside: struggles (runs of
//! consecutive orphans) and breakthroughs (a window whose link density jumps
//! relative to the window before it).

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod patterns_tests;

use serde::Serialize;
use tracing::debug;

use crate::config::LinkographConfig;
use crate::linkograph::Linkograph;

/// Pattern family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Focused local exploration.
    Chunk,
    /// Highly cross-referenced integration.
    Web,
    /// Systematic forward chaining.
    Sawtooth,
    /// Disconnected move.
    Orphan,
}

impl PatternType {
    /// Get the pattern name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::Chunk => "chunk",
            PatternType::Web => "web",
            PatternType::Sawtooth => "sawtooth",
            PatternType::Orphan => "orphan",
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A labelled region of the linkograph. Patterns may overlap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    /// Pattern family.
    pub pattern_type: PatternType,
    /// Member moves in session order.
    pub move_ids: Vec<String>,
    /// Index of the first member.
    pub start_index: usize,
    /// Index of the last member.
    pub end_index: usize,
    /// Internal link density for chunks and webs, mean link strength for
    /// sawtooths, zero for orphans.
    pub strength: f64,
}

/// A run of consecutive orphan moves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StruggleSignal {
    /// Orphan moves in the run.
    pub move_ids: Vec<String>,
    /// Index of the first orphan.
    pub start_index: usize,
    /// Index of the last orphan.
    pub end_index: usize,
}

impl StruggleSignal {
    /// Number of orphan moves in the run
    pub fn len(&self) -> usize {
        self.move_ids.len()
    }

    /// Always false for detected signals
    pub fn is_empty(&self) -> bool {
        self.move_ids.is_empty()
    }
}

/// A sharp relative rise in local link density.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakthroughEvent {
    /// Index of the first move of the later window.
    pub boundary_index: usize,
    /// Id of that move.
    pub boundary_move_id: String,
    /// Density of the earlier window.
    pub before_density: f64,
    /// Density of the later window.
    pub after_density: f64,
    /// `after / before`; absent when the earlier window has no links.
    pub ratio: Option<f64>,
}

/// Everything the detector found for one linkograph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternReport {
    /// Chunk, web, sawtooth and orphan patterns.
    pub patterns: Vec<Pattern>,
    /// Runs of consecutive orphans.
    pub struggles: Vec<StruggleSignal>,
    /// Density jumps.
    pub breakthroughs: Vec<BreakthroughEvent>,
}

impl PatternReport {
    /// Patterns of one family.
    pub fn of_type(&self, pattern_type: PatternType) -> impl Iterator<Item = &Pattern> {
        self.patterns
            .iter()
            .filter(move |p| p.pattern_type == pattern_type)
    }

    /// Number of patterns of one family.
    pub fn count(&self, pattern_type: PatternType) -> usize {
        self.of_type(pattern_type).count()
    }
}

/// Windowed pattern search.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    config: LinkographConfig,
}

impl PatternDetector {
    /// Create a detector using the thresholds in `config`
    pub fn new(config: LinkographConfig) -> Self {
        Self { config }
    }

    /// Run every detector.
    pub fn detect(&self, graph: &Linkograph) -> PatternReport {
        let mut patterns = self.detect_chunks(graph);
        patterns.extend(self.detect_webs(graph));
        patterns.extend(self.detect_sawtooths(graph));
        patterns.extend(self.detect_orphans(graph));

        let report = PatternReport {
            patterns,
            struggles: self.detect_struggles(graph),
            breakthroughs: self.detect_breakthroughs(graph),
        };

        debug!(
            session_id = %graph.session_id(),
            chunks = report.count(PatternType::Chunk),
            webs = report.count(PatternType::Web),
            sawtooths = report.count(PatternType::Sawtooth),
            orphans = report.count(PatternType::Orphan),
            struggles = report.struggles.len(),
            breakthroughs = report.breakthroughs.len(),
            "Patterns detected"
        );

        report
    }

    /// Dense fixed-size windows.
    ///
    /// Windows never run past the end of the session. After a window
    /// qualifies the search resumes past it, so chunks do not overlap.
    pub fn detect_chunks(&self, graph: &Linkograph) -> Vec<Pattern> {
        let size = self.config.chunk_window_size;
        let n = graph.move_count();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start + size <= n {
            let density = window_density(graph, start, size);
            if density > self.config.chunk_density_threshold {
                chunks.push(Pattern {
                    pattern_type: PatternType::Chunk,
                    move_ids: ids(graph, start..start + size),
                    start_index: start,
                    end_index: start + size - 1,
                    strength: density,
                });
                start += size;
            } else {
                start += 1;
            }
        }
        chunks
    }

    /// Highly linked moves with their direct neighbourhood.
    pub fn detect_webs(&self, graph: &Linkograph) -> Vec<Pattern> {
        let degrees = graph.degrees();
        let mut webs = Vec::new();

        for (hub, &degree) in degrees.iter().enumerate() {
            if degree < self.config.web_link_threshold {
                continue;
            }

            let mut members = vec![false; graph.move_count()];
            members[hub] = true;
            for link in graph.forelinks(hub) {
                members[link.target_index] = true;
            }
            for link in graph.backlinks(hub) {
                members[link.source_index] = true;
            }

            let indices: Vec<usize> = members
                .iter()
                .enumerate()
                .filter_map(|(i, &m)| m.then_some(i))
                .collect();
            let internal = graph
                .links()
                .iter()
                .filter(|l| members[l.source_index] && members[l.target_index])
                .count();

            webs.push(Pattern {
                pattern_type: PatternType::Web,
                move_ids: indices.iter().map(|&i| graph.moves()[i].id.clone()).collect(),
                start_index: indices[0],
                end_index: indices[indices.len() - 1],
                strength: density(internal, indices.len()),
            });
        }
        webs
    }

    /// Runs of moves chained by distance-one links.
    pub fn detect_sawtooths(&self, graph: &Linkograph) -> Vec<Pattern> {
        let n = graph.move_count();
        let mut sawtooths = Vec::new();
        let mut run_start = 0;
        let mut strengths: Vec<f64> = Vec::new();

        for i in 1..=n {
            let chained = if i < n {
                graph.link_between(i - 1, i)
            } else {
                None
            };

            match chained {
                Some(link) => strengths.push(link.strength),
                None => {
                    let run_len = i - run_start;
                    if run_len >= self.config.sawtooth_min_run {
                        sawtooths.push(Pattern {
                            pattern_type: PatternType::Sawtooth,
                            move_ids: ids(graph, run_start..i),
                            start_index: run_start,
                            end_index: i - 1,
                            strength: strengths.iter().sum::<f64>() / strengths.len() as f64,
                        });
                    }
                    run_start = i;
                    strengths.clear();
                }
            }
        }
        sawtooths
    }

    /// One orphan pattern per unlinked move.
    pub fn detect_orphans(&self, graph: &Linkograph) -> Vec<Pattern> {
        graph
            .degrees()
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(i, _)| Pattern {
                pattern_type: PatternType::Orphan,
                move_ids: vec![graph.moves()[i].id.clone()],
                start_index: i,
                end_index: i,
                strength: 0.0,
            })
            .collect()
    }

    /// Runs of at least `orphan_run_threshold` consecutive orphans.
    pub fn detect_struggles(&self, graph: &Linkograph) -> Vec<StruggleSignal> {
        let degrees = graph.degrees();
        let n = degrees.len();
        let mut struggles = Vec::new();
        let mut run_start: Option<usize> = None;

        for i in 0..=n {
            let orphan = i < n && degrees[i] == 0;
            match (orphan, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    if i - start >= self.config.orphan_run_threshold {
                        struggles.push(StruggleSignal {
                            move_ids: ids(graph, start..i),
                            start_index: start,
                            end_index: i - 1,
                        });
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
        struggles
    }

    /// Compare each window of `breakthrough_window` moves with the window
    /// just before it.
    ///
    /// An event is emitted when the later density is positive and exceeds
    /// `breakthrough_ratio` times the earlier one. The scan then skips past
    /// the later window so one burst yields one event; a boundary inside
    /// that span is not examined, even if its own rise is steeper.
    pub fn detect_breakthroughs(&self, graph: &Linkograph) -> Vec<BreakthroughEvent> {
        let k = self.config.breakthrough_window;
        let n = graph.move_count();
        let mut events = Vec::new();

        let mut boundary = k;
        while boundary + k <= n {
            let before = window_density(graph, boundary - k, k);
            let after = window_density(graph, boundary, k);

            if after > 0.0 && after > self.config.breakthrough_ratio * before {
                events.push(BreakthroughEvent {
                    boundary_index: boundary,
                    boundary_move_id: graph.moves()[boundary].id.clone(),
                    before_density: before,
                    after_density: after,
                    ratio: (before > 0.0).then(|| after / before),
                });
                boundary += k;
            } else {
                boundary += 1;
            }
        }
        events
    }
}

/// Links among `size` moves starting at `start`, over possible pairs.
pub(crate) fn window_density(graph: &Linkograph, start: usize, size: usize) -> f64 {
    density(graph.links_within(start, start + size), size)
}

fn density(links: usize, members: usize) -> f64 {
    if members < 2 {
        return 0.0;
    }
    let pairs = members * (members - 1) / 2;
    links as f64 / pairs as f64
}

fn ids(graph: &Linkograph, range: std::ops::Range<usize>) -> Vec<String> {
    graph.moves()[range].iter().map(|m| m.id.clone()).collect()
}
