use std::collections::VecDeque;

use crate::graph::Graph;

/// Neighbourhoods of order `k`: nodes reachable in at most `k` steps (or exactly
/// `k` steps when `include_lower` is false), excluding the node itself.
/// Edge weights of the result are the step counts.
pub fn higher_order(graph: &Graph, k: usize, include_lower: bool) -> Graph {
    let n = graph.node_count();
    let mut depth = vec![usize::MAX; n];
    let mut touched = Vec::new();
    let mut queue = VecDeque::new();

    let (adjacencies, weights): (Vec<_>, Vec<_>) = (0..n)
        .map(|source| {
            depth[source] = 0;
            touched.push(source);
            queue.push_back(source);

            let mut row = Vec::new();
            while let Some(node) = queue.pop_front() {
                if depth[node] == k { continue }
                for next in graph.edges(node) {
                    if depth[next] != usize::MAX { continue }
                    depth[next] = depth[node] + 1;
                    touched.push(next);
                    queue.push_back(next);
                    if include_lower || depth[next] == k {
                        row.push((next as u32, depth[next] as f64));
                    }
                }
            }

            for &node in &touched { depth[node] = usize::MAX }
            touched.clear();

            row.sort_unstable_by_key(|&(node, _)| node);
            row.into_iter().unzip::<u32, f64, Vec<u32>, Vec<f64>>()
        })
        .unzip();

    Graph::new(n, &adjacencies, &weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Path 0 - 1 - 2 - 3 - 4
    fn path() -> Graph {
        Graph::from_adjacencies(&[vec![1], vec![0, 2], vec![1, 3], vec![2, 4], vec![3]])
    }

    #[test]
    fn cumulative_neighbourhoods() {
        let graph = higher_order(&path(), 2, true);
        assert_eq!(graph.edges(0).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(graph.edges(2).collect::<Vec<_>>(), vec![0, 1, 3, 4]);
        assert_eq!(graph.edges_with_weights(0).collect::<Vec<_>>(), vec![(1, 1.0), (2, 2.0)]);
    }

    #[test]
    fn exact_order_neighbourhoods() {
        let graph = higher_order(&path(), 2, false);
        assert_eq!(graph.edges(0).collect::<Vec<_>>(), vec![2]);
        assert_eq!(graph.edges(2).collect::<Vec<_>>(), vec![0, 4]);
    }

    #[test]
    fn order_one_matches_input() {
        let graph = higher_order(&path(), 1, true);
        for n in 0..5 {
            assert_eq!(graph.edges(n).collect::<Vec<_>>(), path().edges(n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn cycles_do_not_shorten_paths() {
        // Square 0-1-2-3-0: node 2 is two steps from 0 either way.
        let ring = Graph::from_adjacencies(&[vec![1, 3], vec![0, 2], vec![1, 3], vec![0, 2]]);
        let graph = higher_order(&ring, 3, true);
        assert_eq!(graph.edges_with_weights(0).collect::<Vec<_>>(), vec![(1, 1.0), (2, 2.0), (3, 1.0)]);
    }
}
