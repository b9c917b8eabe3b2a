//! Arc-crossing geometry for linkograph rendering.
//!
//! Each link is drawn as the parabola `y = (x - s)(t - x) / (t - s)` above
//! the move timeline, spanning source index `s` to target index `t`. Two
//! links cross when exactly one endpoint of one lies strictly inside the
//! span of the other. Links that share an endpoint only touch there and are
//! not counted.
//!
//! The output is rendering metadata only; nothing else in the crate reads it.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::linkograph::{Linkograph, LinkographLink};

const BISECTION_STEPS: usize = 64;

/// A point in timeline coordinates (x in move indices, y in arc height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Height above the timeline.
    pub y: f64,
}

/// A location where link arcs cross.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntersectionNode {
    /// Mean position of the merged crossings.
    pub position: Point,
    /// Number of link pairs crossing here.
    pub complexity: usize,
    /// Indices into [`Linkograph::links`] of every participating link.
    pub link_indices: Vec<usize>,
    /// Sum of participating link strengths times `ln(1 + complexity)`.
    pub significance: f64,
}

#[derive(Default)]
struct Accumulator {
    sum_x: f64,
    sum_y: f64,
    pairs: usize,
    links: BTreeSet<usize>,
}

impl Accumulator {
    fn centre(&self) -> Point {
        Point {
            x: self.sum_x / self.pairs as f64,
            y: self.sum_y / self.pairs as f64,
        }
    }

    fn distance_to(&self, point: Point) -> f64 {
        let c = self.centre();
        (c.x - point.x).hypot(c.y - point.y)
    }
}

/// Finds and merges arc crossings.
#[derive(Debug, Clone)]
pub struct IntersectionAnalyzer {
    tolerance: f64,
}

impl IntersectionAnalyzer {
    /// A crossing within `tolerance` (Euclidean distance) of an existing
    /// node's centre merges into the nearest such node.
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Compute all intersection nodes, ordered by position.
    pub fn analyze(&self, graph: &Linkograph) -> Vec<IntersectionNode> {
        let links = graph.links();
        let mut clusters: Vec<Accumulator> = Vec::new();

        for (i, a) in links.iter().enumerate() {
            for (j, b) in links.iter().enumerate().skip(i + 1) {
                if !crosses(a, b) {
                    continue;
                }
                let point = crossing_point(a, b);
                let nearest = clusters
                    .iter()
                    .enumerate()
                    .map(|(k, c)| (k, c.distance_to(point)))
                    .filter(|&(_, d)| d <= self.tolerance)
                    .min_by(|x, y| x.1.total_cmp(&y.1))
                    .map(|(k, _)| k);
                let slot = match nearest {
                    Some(k) => k,
                    None => {
                        clusters.push(Accumulator::default());
                        clusters.len() - 1
                    }
                };
                let cell = &mut clusters[slot];
                cell.sum_x += point.x;
                cell.sum_y += point.y;
                cell.pairs += 1;
                cell.links.insert(i);
                cell.links.insert(j);
            }
        }

        let mut nodes: Vec<IntersectionNode> = clusters
            .into_iter()
            .map(|cell| {
                let strength: f64 = cell.links.iter().map(|&i| links[i].strength).sum();
                IntersectionNode {
                    position: cell.centre(),
                    complexity: cell.pairs,
                    link_indices: cell.links.into_iter().collect(),
                    significance: strength * (1.0 + cell.pairs as f64).ln(),
                }
            })
            .collect();

        nodes.sort_by(|a, b| {
            a.position
                .x
                .total_cmp(&b.position.x)
                .then(a.position.y.total_cmp(&b.position.y))
        });

        debug!(
            session_id = %graph.session_id(),
            intersections = nodes.len(),
            "Intersections analyzed"
        );

        nodes
    }
}

/// Whether two links cross rather than nest or sit apart.
pub fn crosses(a: &LinkographLink, b: &LinkographLink) -> bool {
    let shares_endpoint = a.source_index == b.source_index
        || a.source_index == b.target_index
        || a.target_index == b.source_index
        || a.target_index == b.target_index;
    if shares_endpoint {
        return false;
    }

    let inside = |x: usize| a.source_index < x && x < a.target_index;
    inside(b.source_index) != inside(b.target_index)
}

/// Height of a link's arc at `x`.
pub fn arc_height(link: &LinkographLink, x: f64) -> f64 {
    let (s, t) = (link.source_index as f64, link.target_index as f64);
    if x <= s || x >= t {
        return 0.0;
    }
    (x - s) * (t - x) / (t - s)
}

/// Point where two crossing arcs meet.
///
/// Over the overlap of the two spans the height difference changes sign
/// exactly once, so bisection converges on the unique crossing.
fn crossing_point(a: &LinkographLink, b: &LinkographLink) -> Point {
    let lo_x = a.source_index.max(b.source_index) as f64;
    let hi_x = a.target_index.min(b.target_index) as f64;
    let diff = |x: f64| arc_height(a, x) - arc_height(b, x);

    let (mut lo, mut hi) = (lo_x, hi_x);
    let lo_sign = diff(lo).signum();
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if diff(mid).signum() == lo_sign {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let x = 0.5 * (lo + hi);
    Point {
        x,
        y: arc_height(a, x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linkograph::test_support::moves;

    fn graph(n: usize, pairs: &[(usize, usize, f64)]) -> Linkograph {
        Linkograph::from_index_pairs("session-test", moves(n), pairs, 3)
    }

    #[test]
    fn test_crossing_versus_nesting() {
        let g = graph(
            10,
            &[(0, 4, 0.5), (2, 6, 0.5), (1, 3, 0.5), (5, 9, 0.5), (0, 2, 0.5)],
        );
        let l = g.links();
        // links sorted: (0,2) (0,4) (1,3) (2,6) (5,9)
        assert!(crosses(&l[1], &l[3])); // (0,4) x (2,6)
        assert!(!crosses(&l[1], &l[2])); // (1,3) nested in (0,4)
        assert!(!crosses(&l[1], &l[4])); // disjoint
        assert!(!crosses(&l[0], &l[1])); // shared endpoint
        assert!(crosses(&l[0], &l[2])); // (0,2) x (1,3)
    }

    #[test]
    fn test_equal_span_crossing_is_midway() {
        let g = graph(8, &[(0, 4, 0.6), (2, 6, 0.4)]);
        let nodes = IntersectionAnalyzer::new(0.25).analyze(&g);

        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert!((node.position.x - 3.0).abs() < 1e-9);
        // (3 - 0)(4 - 3) / 4
        assert!((node.position.y - 0.75).abs() < 1e-9);
        assert_eq!(node.complexity, 1);
        assert_eq!(node.link_indices, vec![0, 1]);
        assert!((node.significance - 1.0 * 2f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_unequal_spans_meet_on_both_arcs() {
        let g = graph(12, &[(0, 7, 0.5), (3, 11, 0.5)]);
        let nodes = IntersectionAnalyzer::new(0.25).analyze(&g);
        assert_eq!(nodes.len(), 1);
        let p = nodes[0].position;
        let links = g.links();
        assert!(p.x > 3.0 && p.x < 7.0);
        assert!((arc_height(&links[0], p.x) - arc_height(&links[1], p.x)).abs() < 1e-9);
    }

    #[test]
    fn test_nearby_crossings_merge_under_coarse_tolerance() {
        // Pairwise crossings at x = 2.5, 3.0 and 3.5
        let g = graph(10, &[(0, 4, 0.5), (2, 6, 0.5), (1, 5, 0.5)]);
        let nodes = IntersectionAnalyzer::new(0.25).analyze(&g);
        assert_eq!(nodes.len(), 3);
        assert!(nodes.iter().all(|n| n.complexity == 1));
        assert!((nodes[1].position.x - 3.0).abs() < 1e-9);

        let coarse = IntersectionAnalyzer::new(10.0).analyze(&g);
        assert_eq!(coarse.len(), 1);
        assert_eq!(coarse[0].complexity, 3);
        assert_eq!(coarse[0].link_indices.len(), 3);
        assert!((coarse[0].significance - 1.5 * 4f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_close_crossings_merge_across_grid_lines() {
        // (1,3)x(2,4) meets at x = 2.5 and (1,3)x(2,5) at x ~ 2.464, about
        // 0.04 apart; with a 0.05 grid they would fall in different cells.
        let g = graph(6, &[(1, 3, 0.5), (2, 4, 0.5), (2, 5, 0.5)]);
        let nodes = IntersectionAnalyzer::new(0.05).analyze(&g);

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].complexity, 2);
        assert_eq!(nodes[0].link_indices, vec![0, 1, 2]);
        assert!(nodes[0].position.x > 2.46 && nodes[0].position.x < 2.5);

        let fine = IntersectionAnalyzer::new(0.01).analyze(&g);
        assert_eq!(fine.len(), 2);
    }

    #[test]
    fn test_no_links_no_nodes() {
        let g = graph(5, &[]);
        assert!(IntersectionAnalyzer::new(0.25).analyze(&g).is_empty());
    }
}
