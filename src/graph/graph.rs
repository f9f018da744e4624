/// A weighted, undirected graph in compressed sparse row format.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Graph {
    size: usize,
    offsets: Vec<u32>,
    edges: Vec<u32>,
    edge_weights: Vec<f64>,
}

impl Graph {
    /// Graph over `num_nodes` nodes from per-node neighbour lists and matching weights.
    pub fn new(num_nodes: usize, edges: &[Vec<u32>], edge_weights: &[Vec<f64>]) -> Self {
        assert_eq!(edges.len(), num_nodes, "one neighbour list per node");
        assert_eq!(edge_weights.len(), num_nodes, "one weight list per node");
        for (node, (row, weights)) in edges.iter().zip(edge_weights).enumerate() {
            assert_eq!(row.len(), weights.len(), "node {node}: neighbours and weights differ in length");
        }

        let mut offsets = Vec::with_capacity(num_nodes + 1);
        offsets.push(0u32);
        for row in edges {
            offsets.push(offsets[offsets.len() - 1] + row.len() as u32);
        }

        Self {
            size: num_nodes,
            offsets,
            edges: edges.concat(),
            edge_weights: edge_weights.concat(),
        }
    }

    /// Every edge weighted 1.
    pub fn from_adjacencies(adjacencies: &[Vec<u32>]) -> Self {
        let weights = adjacencies.iter().map(|row| vec![1.0; row.len()]).collect::<Vec<_>>();
        Self::new(adjacencies.len(), adjacencies, &weights)
    }

    #[inline] pub fn node_count(&self) -> usize { self.size }

    /// Directed entries, so each undirected edge counts twice.
    #[inline] pub fn edge_count(&self) -> usize { self.edges.len() }

    #[inline]
    fn range(&self, node: usize) -> std::ops::Range<usize> {
        self.offsets[node] as usize..self.offsets[node + 1] as usize
    }

    #[inline] pub fn degree(&self, node: usize) -> usize { self.range(node).len() }

    /// The `i`-th neighbour of `node`, in insertion order.
    #[inline]
    pub fn edge(&self, node: usize, i: usize) -> Option<usize> {
        self.edges[self.range(node)].get(i).map(|&n| n as usize)
    }

    /// Neighbours of `node`.
    #[inline]
    pub fn edges(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges[self.range(node)].iter().map(|&n| n as usize)
    }

    /// Neighbours of `node` paired with the weight of the connecting edge.
    #[inline]
    pub fn edges_with_weights(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.range(node);
        self.edges[range.clone()].iter().zip(&self.edge_weights[range]).map(|(&n, &w)| (n as usize, w))
    }

    /// Whether `a` and `b` are adjacent.
    #[inline]
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.edges(a).any(|n| n == b)
    }

    /// Per-node adjacency and weight lists.
    pub fn to_lists(&self) -> (Vec<Vec<u32>>, Vec<Vec<f64>>) {
        (0..self.size)
            .map(|n| {
                let r = self.range(n);
                (self.edges[r.clone()].to_vec(), self.edge_weights[r].to_vec())
            })
            .unzip()
    }

    /// Keep only the edges for which `keep(a, b)` holds.
    pub fn filter_edges(&self, mut keep: impl FnMut(usize, usize) -> bool) -> Self {
        let (mut adjacencies, mut weights) = self.to_lists();
        for (a, (row, row_w)) in adjacencies.iter_mut().zip(weights.iter_mut()).enumerate() {
            let kept = row.iter().zip(row_w.iter())
                .filter(|(b, _)| keep(a, **b as usize))
                .map(|(b, w)| (*b, *w))
                .collect::<Vec<_>>();
            (*row, *row_w) = kept.into_iter().unzip();
        }
        Self::new(self.size, &adjacencies, &weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_graph() -> Graph {
        Graph::new(
            4,
            &[
                vec![1, 2],       // 0
                vec![0, 2],       // 1
                vec![0, 1, 3],    // 2
                vec![2],          // 3
            ],
            &[
                vec![1.5, 2.0],
                vec![1.5, 3.5],
                vec![2.0, 3.5, 0.5],
                vec![0.5],
            ],
        )
    }

    #[test]
    fn csr_graph_construction() {
        let graph = make_test_graph();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 8);

        // Offsets are cumulative neighbor counts, len = nodes + 1
        assert_eq!(graph.offsets, vec![0, 2, 4, 7, 8]);
        assert_eq!(graph.edges,        vec![  1,   2,   0,   2,   0,   1,   3,   2]);
        assert_eq!(graph.edge_weights, vec![1.5, 2.0, 1.5, 3.5, 2.0, 3.5, 0.5, 0.5]);

        for window in graph.offsets.windows(2) { assert!(window[0] <= window[1]) }
    }

    #[test]
    fn degree_and_edge_access() {
        let graph = make_test_graph();

        assert_eq!((0..4).map(|n| graph.degree(n)).collect::<Vec<_>>(), vec![2, 2, 3, 1]);
        assert_eq!(graph.edge(2, 2), Some(3));
        assert_eq!(graph.edge(2, 3), None);
        assert!(graph.has_edge(3, 2));
        assert!(!graph.has_edge(3, 0));
    }

    #[test]
    fn edge_iterators() {
        let graph = make_test_graph();

        assert_eq!(graph.edges(2).collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(graph.edges_with_weights(2).collect::<Vec<_>>(), vec![(0, 2.0), (1, 3.5), (3, 0.5)]);
    }

    #[test]
    fn unweighted_graph_has_unit_weights() {
        let graph = Graph::from_adjacencies(&[vec![1], vec![0]]);
        assert_eq!(graph.edges_with_weights(0).collect::<Vec<_>>(), vec![(1, 1.0)]);
    }

    #[test]
    fn filter_edges_keeps_weights_aligned() {
        let graph = make_test_graph().filter_edges(|a, b| !(a.min(b) == 1 && a.max(b) == 2));
        assert_eq!(graph.edges_with_weights(2).collect::<Vec<_>>(), vec![(0, 2.0), (3, 0.5)]);
        assert_eq!(graph.edges(1).collect::<Vec<_>>(), vec![0]);
        assert_eq!(graph.edge_count(), 6);
    }

    #[test]
    fn lists_round_trip() {
        let graph = make_test_graph();
        let (adjacencies, weights) = graph.to_lists();
        assert_eq!(Graph::new(4, &adjacencies, &weights), graph);
    }

    #[test]
    fn empty_graph_is_valid() {
        let graph = Graph::new(0, &[], &[]);

        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.offsets, vec![0]);
    }

    #[test]
    #[should_panic(expected = "one neighbour list per node")]
    fn new_panics_when_edges_len_mismatch() {
        Graph::new(0, &[vec![]], &[]);
    }

    #[test]
    #[should_panic(expected = "node 0: neighbours and weights differ in length")]
    fn new_panics_when_per_node_len_mismatch() {
        let _ = Graph::new(2, &[vec![1], vec![]], &[vec![], vec![]]);
    }

    #[test]
    #[should_panic]
    fn degree_panics_for_out_of_bounds_node() {
        let graph = make_test_graph();
        graph.degree(graph.node_count());
    }
}
