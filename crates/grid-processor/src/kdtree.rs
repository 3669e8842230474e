//! 2-D k-d tree over aggregated pixel coordinates.
//!
//! The tree is balanced (median split, alternating axes) and answers
//! single nearest-neighbour queries. Among equidistant points the one with
//! the lowest input index wins, so the result never depends on tree layout.

use std::cmp::Ordering;

/// A balanced 2-D k-d tree.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<[f64; 2]>,
}

#[derive(Debug)]
struct KdNode {
    /// Index into `points`
    point_idx: usize,
    /// Split dimension: 0 = x, 1 = y
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// Result of a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    /// Index of the point in the slice the tree was built from.
    pub index: usize,
    pub distance: f64,
}

impl KdTree {
    /// Build a tree from `xs[i], ys[i]` pairs. Points with a NaN coordinate
    /// are left out and can never be returned.
    pub fn build(xs: &[f64], ys: &[f64]) -> Self {
        let points: Vec<[f64; 2]> = xs.iter().zip(ys).map(|(&x, &y)| [x, y]).collect();
        let mut indices: Vec<usize> = (0..points.len())
            .filter(|&i| !points[i][0].is_nan() && !points[i][1].is_nan())
            .collect();
        let mut nodes = Vec::with_capacity(indices.len());
        if !indices.is_empty() {
            build_recursive(&points, &mut indices, 0, &mut nodes);
        }
        Self { nodes, points }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The nearest indexed point to `(qx, qy)`, `None` for an empty tree.
    pub fn nearest(&self, qx: f64, qy: f64) -> Option<Nearest> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best = (f64::INFINITY, usize::MAX);
        self.nearest_recursive(0, qx, qy, &mut best);
        Some(Nearest {
            index: best.1,
            distance: best.0.sqrt(),
        })
    }

    fn nearest_recursive(&self, node_idx: usize, qx: f64, qy: f64, best: &mut (f64, usize)) {
        let node = &self.nodes[node_idx];
        let p = self.points[node.point_idx];

        let dx = qx - p[0];
        let dy = qy - p[1];
        let dist_sq = dx * dx + dy * dy;

        if dist_sq < best.0 || (dist_sq == best.0 && node.point_idx < best.1) {
            *best = (dist_sq, node.point_idx);
        }

        let diff = if node.split_dim == 0 { dx } else { dy };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.nearest_recursive(child, qx, qy, best);
        }

        // Equal distances must still be visited for the index tie-break.
        if diff * diff <= best.0 {
            if let Some(child) = second {
                self.nearest_recursive(child, qx, qy, best);
            }
        }
    }
}

fn build_recursive(
    points: &[[f64; 2]],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let split_dim = (depth % 2) as u8;
    let axis = split_dim as usize;
    let median = indices.len() / 2;

    indices.select_nth_unstable_by(median, |&a, &b| {
        points[a][axis]
            .partial_cmp(&points[b][axis])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    let (left, rest) = indices.split_at_mut(median);
    let right = &mut rest[1..];
    if !left.is_empty() {
        let child = build_recursive(points, left, depth + 1, nodes);
        nodes[node_idx].left = Some(child);
    }
    if !right.is_empty() {
        let child = build_recursive(points, right, depth + 1, nodes);
        nodes[node_idx].right = Some(child);
    }
    node_idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_points() -> (Vec<f64>, Vec<f64>) {
        (
            vec![2.0, 5.0, 9.0, 4.0, 8.0, 7.0, 1.0, 6.0],
            vec![3.0, 4.0, 6.0, 7.0, 1.0, 2.0, 8.0, 5.0],
        )
    }

    fn brute_force(xs: &[f64], ys: &[f64], qx: f64, qy: f64) -> (usize, f64) {
        let mut best = (usize::MAX, f64::INFINITY);
        for (i, (&x, &y)) in xs.iter().zip(ys).enumerate() {
            let d = ((qx - x).powi(2) + (qy - y).powi(2)).sqrt();
            if d < best.1 {
                best = (i, d);
            }
        }
        best
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&[], &[]);
        assert!(tree.is_empty());
        assert!(tree.nearest(0.0, 0.0).is_none());
    }

    #[test]
    fn test_nearest_exact() {
        let (xs, ys) = sample_points();
        let tree = KdTree::build(&xs, &ys);
        assert_eq!(tree.len(), 8);
        let hit = tree.nearest(5.0, 4.0).unwrap();
        assert_eq!(hit.index, 1);
        assert_eq!(hit.distance, 0.0);
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let xs: Vec<f64> = (0..500).map(|i| ((i * 7 + 13) % 97) as f64 * 1.3).collect();
        let ys: Vec<f64> = (0..500).map(|i| ((i * 11 + 37) % 89) as f64 * 0.7).collect();
        let tree = KdTree::build(&xs, &ys);

        for qx in 0..25 {
            for qy in 0..25 {
                let (qx, qy) = (qx as f64 * 5.1 - 3.0, qy as f64 * 2.7 - 2.0);
                let hit = tree.nearest(qx, qy).unwrap();
                let (_, distance) = brute_force(&xs, &ys, qx, qy);
                assert!((hit.distance - distance).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_ties_resolve_to_lowest_index() {
        // Four points on a regular grid, queried from the centre.
        let xs = vec![1.0, 0.0, 1.0, 0.0];
        let ys = vec![1.0, 1.0, 0.0, 0.0];
        let tree = KdTree::build(&xs, &ys);
        assert_eq!(tree.nearest(0.5, 0.5).unwrap().index, 0);

        // Duplicated coordinates.
        let xs = vec![3.0, 1.0, 1.0, 1.0];
        let ys = vec![3.0, 1.0, 1.0, 1.0];
        let tree = KdTree::build(&xs, &ys);
        assert_eq!(tree.nearest(1.0, 1.0).unwrap().index, 1);
    }

    #[test]
    fn test_nan_points_skipped() {
        let xs = vec![f64::NAN, 10.0];
        let ys = vec![0.0, 10.0];
        let tree = KdTree::build(&xs, &ys);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nearest(0.0, 0.0).unwrap().index, 1);
    }
}
