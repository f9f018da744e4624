use crate::graph::Graph;

/// Label connected components, numbering them in order of their lowest node.
/// Returns the number of components and a label per node.
pub fn connected_components(graph: &Graph) -> (usize, Vec<u32>) {
    let labels = subset_components(graph, &vec![true; graph.node_count()]);
    let count = labels.iter().flatten().max().map_or(0, |&m| m as usize + 1);
    (count, labels.into_iter().map(|label| label.unwrap_or(u32::MAX)).collect())
}

/// Label connected components of the subgraph induced by `mask`.
/// Nodes outside the mask get `None`.
pub fn subset_components(graph: &Graph, mask: &[bool]) -> Vec<Option<u32>> {
    assert!(mask.len() == graph.node_count(), "mask.len() must equal node_count");

    let mut labels = vec![None; graph.node_count()];
    let mut next = 0u32;
    let mut stack = Vec::new();

    for start in 0..graph.node_count() {
        if !mask[start] || labels[start].is_some() { continue }

        labels[start] = Some(next);
        stack.push(start);
        while let Some(node) = stack.pop() {
            for neighbor in graph.edges(node) {
                if mask[neighbor] && labels[neighbor].is_none() {
                    labels[neighbor] = Some(next);
                    stack.push(neighbor);
                }
            }
        }
        next += 1;
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_islands() -> Graph {
        // 0 - 1 - 2    3 - 4    5
        Graph::from_adjacencies(&[vec![1], vec![0, 2], vec![1], vec![4], vec![3], vec![]])
    }

    #[test]
    fn components_are_numbered_by_lowest_node() {
        let (count, labels) = connected_components(&two_islands());
        assert_eq!(count, 3);
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 2]);
    }

    #[test]
    fn masked_nodes_split_components() {
        let labels = subset_components(&two_islands(), &[true, false, true, true, true, false]);
        assert_eq!(labels, vec![Some(0), None, Some(1), Some(2), Some(2), None]);
    }
}
