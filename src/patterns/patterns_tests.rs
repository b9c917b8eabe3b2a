//! Unit tests for the pattern detector.
//!
//! Graphs are built from explicit link lists so each detector can be
//! exercised against an exact structure.

use super::*;
use crate::linkograph::test_support::moves;
use pretty_assertions::assert_eq;

fn graph(n: usize, pairs: &[(usize, usize)]) -> Linkograph {
    let weighted: Vec<(usize, usize, f64)> = pairs.iter().map(|&(s, t)| (s, t, 0.8)).collect();
    Linkograph::from_index_pairs("session-test", moves(n), &weighted, 3)
}

fn detector() -> PatternDetector {
    PatternDetector::new(LinkographConfig::default())
}

// ============================================================================
// Breakthroughs
// ============================================================================

#[test]
fn test_breakthrough_emitted_for_threefold_density_rise() {
    // Earlier window 0..5: 2 of 10 pairs. Later window 5..10: 6 of 10 pairs.
    let g = graph(
        10,
        &[
            (0, 1),
            (2, 3),
            (5, 6),
            (5, 7),
            (6, 7),
            (7, 8),
            (8, 9),
            (6, 9),
        ],
    );
    let events = detector().detect_breakthroughs(&g);

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.boundary_index, 5);
    assert_eq!(event.boundary_move_id, "m-5");
    assert!((event.before_density - 0.2).abs() < 1e-12);
    assert!((event.after_density - 0.6).abs() < 1e-12);
    assert!((event.ratio.unwrap() - 3.0).abs() < 1e-9);
}

#[test]
fn test_no_breakthrough_for_small_rise() {
    // 5 links (0.5) then 6 links (0.6): ratio 1.2
    let g = graph(
        10,
        &[
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 4),
            (0, 4),
            (5, 6),
            (5, 7),
            (6, 7),
            (7, 8),
            (8, 9),
            (6, 9),
        ],
    );
    assert!(detector().detect_breakthroughs(&g).is_empty());
}

#[test]
fn test_breakthrough_from_empty_baseline_has_no_ratio() {
    let g = graph(10, &[(5, 6), (6, 7), (7, 8)]);
    let events = detector().detect_breakthroughs(&g);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].ratio, None);
    assert_eq!(events[0].before_density, 0.0);
}

#[test]
fn test_breakthrough_needs_two_full_windows() {
    let g = graph(9, &[(5, 6), (6, 7), (7, 8)]);
    assert!(detector().detect_breakthroughs(&g).is_empty());
}

#[test]
fn test_first_qualifying_boundary_wins_within_a_window() {
    // Boundary 5: 0.1 -> 0.5. Boundary 6: 0.0 -> 0.7, a steeper rise that
    // falls inside the skipped span and is not reported separately.
    let g = graph(
        11,
        &[
            (0, 1),
            (6, 7),
            (7, 8),
            (8, 9),
            (9, 10),
            (6, 8),
            (7, 9),
            (8, 10),
        ],
    );
    assert!((window_density(&g, 1, 5) - 0.0).abs() < 1e-12);
    assert!((window_density(&g, 6, 5) - 0.7).abs() < 1e-12);

    let events = detector().detect_breakthroughs(&g);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].boundary_index, 5);
    assert!((events[0].after_density - 0.5).abs() < 1e-12);
    assert!((events[0].ratio.unwrap() - 5.0).abs() < 1e-9);
}

// ============================================================================
// Orphans and struggles
// ============================================================================

#[test]
fn test_orphan_run_flags_single_struggle() {
    // Moves 3, 4 and 5 have no links; everything else has at least one.
    let g = graph(10, &[(0, 1), (1, 2), (0, 2), (6, 7), (7, 8), (8, 9)]);
    let d = detector();

    let struggles = d.detect_struggles(&g);
    assert_eq!(struggles.len(), 1);
    assert_eq!(struggles[0].move_ids, vec!["m-3", "m-4", "m-5"]);
    assert_eq!((struggles[0].start_index, struggles[0].end_index), (3, 5));
    assert_eq!(struggles[0].len(), 3);

    let orphans = d.detect_orphans(&g);
    assert_eq!(orphans.len(), 3);
    assert!(orphans.iter().all(|p| p.strength == 0.0));
}

#[test]
fn test_isolated_orphans_are_not_struggles() {
    let g = graph(8, &[(0, 1), (1, 2), (4, 5), (5, 7)]);
    let d = detector();
    assert_eq!(d.detect_orphans(&g).len(), 2); // m-3 and m-6
    assert!(d.detect_struggles(&g).is_empty());
}

#[test]
fn test_trailing_orphan_run_is_flagged() {
    let g = graph(6, &[(0, 1), (1, 2)]);
    let struggles = detector().detect_struggles(&g);
    assert_eq!(struggles.len(), 1);
    assert_eq!((struggles[0].start_index, struggles[0].end_index), (3, 5));
}

// ============================================================================
// Chunks
// ============================================================================

#[test]
fn test_dense_window_forms_one_chunk() {
    let g = graph(10, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
    let chunks = detector().detect_chunks(&g);

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].start_index, 0);
    assert_eq!(chunks[0].end_index, 4);
    assert_eq!(chunks[0].move_ids.len(), 5);
    assert!((chunks[0].strength - 0.4).abs() < 1e-12);
}

#[test]
fn test_chunk_threshold_is_strict() {
    // 3 of 10 pairs is exactly 30%
    let g = graph(5, &[(0, 1), (1, 2), (2, 3)]);
    assert!(detector().detect_chunks(&g).is_empty());
}

#[test]
fn test_short_session_has_no_windowed_patterns() {
    let g = graph(4, &[(0, 1), (1, 2), (0, 2)]);
    let report = detector().detect(&g);

    assert_eq!(report.count(PatternType::Chunk), 0);
    assert!(report.breakthroughs.is_empty());
    assert_eq!(report.count(PatternType::Orphan), 1);
    assert_eq!(report.count(PatternType::Sawtooth), 1);
}

// ============================================================================
// Webs
// ============================================================================

#[test]
fn test_hub_with_five_links_forms_web() {
    let g = graph(8, &[(0, 1), (0, 2), (0, 3), (0, 4), (0, 5), (1, 2)]);
    let webs = detector().detect_webs(&g);

    assert_eq!(webs.len(), 1);
    assert_eq!(webs[0].move_ids, vec!["m-0", "m-1", "m-2", "m-3", "m-4", "m-5"]);
    assert_eq!((webs[0].start_index, webs[0].end_index), (0, 5));
    // 6 internal links over 15 pairs
    assert!((webs[0].strength - 0.4).abs() < 1e-12);
}

#[test]
fn test_web_counts_both_link_directions() {
    let g = graph(8, &[(0, 4), (1, 4), (2, 4), (4, 6), (4, 7)]);
    let webs = detector().detect_webs(&g);
    assert_eq!(webs.len(), 1);
    assert_eq!(webs[0].move_ids.len(), 6);
}

// ============================================================================
// Sawtooth
// ============================================================================

#[test]
fn test_forward_chain_forms_sawtooth() {
    let g = graph(8, &[(0, 1), (1, 2), (2, 3), (5, 6), (0, 3)]);
    let sawtooths = detector().detect_sawtooths(&g);

    assert_eq!(sawtooths.len(), 1);
    assert_eq!(sawtooths[0].move_ids, vec!["m-0", "m-1", "m-2", "m-3"]);
    assert!((sawtooths[0].strength - 0.8).abs() < 1e-12);
}

#[test]
fn test_sawtooth_at_end_of_session() {
    let g = graph(5, &[(2, 3), (3, 4)]);
    let sawtooths = detector().detect_sawtooths(&g);
    assert_eq!(sawtooths.len(), 1);
    assert_eq!((sawtooths[0].start_index, sawtooths[0].end_index), (2, 4));
}

// ============================================================================
// Aggregate report
// ============================================================================

#[test]
fn test_detect_collects_all_families() {
    let g = graph(
        12,
        &[
            (0, 1),
            (1, 2),
            (2, 3),
            (0, 2),
            (1, 3),
            (0, 3),
            (3, 4),
            (3, 5),
        ],
    );
    let report = detector().detect(&g);

    assert_eq!(report.count(PatternType::Chunk), 1);
    assert_eq!(report.count(PatternType::Web), 1);
    assert_eq!(report.count(PatternType::Sawtooth), 1);
    assert_eq!(report.count(PatternType::Orphan), 6);
    assert_eq!(report.struggles.len(), 1);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["patterns"][0]["pattern_type"], "chunk");
}

#[test]
fn test_pattern_type_display() {
    assert_eq!(PatternType::Chunk.to_string(), "chunk");
    assert_eq!(PatternType::Web.as_str(), "web");
    assert_eq!(PatternType::Sawtooth.as_str(), "sawtooth");
    assert_eq!(PatternType::Orphan.as_str(), "orphan");
}
