//! Binary adjacency cache for contiguity graphs.
//!
//! Layout (little endian): magic `QADJ`, node count `u32`, then per node its
//! degree `u32` followed by the neighbour ids `u32`. Only topology is kept;
//! loaded graphs weight every edge 1.

use anyhow::{ensure, Context, Result};

use crate::graph::Graph;

const MAGIC: &[u8; 4] = b"QADJ";

impl Graph {
    pub fn to_csr_bytes(&self) -> Result<Vec<u8>> {
        let n = u32::try_from(self.node_count()).context("[graph::io] too many nodes")?;
        let mut out = Vec::with_capacity(8 + 4 * (self.node_count() + self.edge_count()));
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&n.to_le_bytes());
        for node in 0..self.node_count() {
            out.extend_from_slice(&(self.degree(node) as u32).to_le_bytes());
            for next in self.edges(node) {
                out.extend_from_slice(&(next as u32).to_le_bytes());
            }
        }
        Ok(out)
    }

    pub fn from_csr_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.get(..4) == Some(MAGIC.as_slice()), "[graph::io] not an adjacency cache");
        ensure!(bytes.len() % 4 == 0, "[graph::io] truncated data");
        let mut words = bytes[4..].chunks(4).map(|chunk| -> Result<u32> {
            let word: [u8; 4] = chunk.try_into().context("[graph::io] truncated data")?;
            Ok(u32::from_le_bytes(word))
        });
        let mut next = || words.next().unwrap_or_else(|| Err(anyhow::anyhow!("[graph::io] unexpected end of data")));

        let n = next()? as usize;
        let mut adjacencies = Vec::with_capacity(n.min(bytes.len() / 4));
        for node in 0..n {
            let degree = next()? as usize;
            let row = (0..degree).map(|_| next()).collect::<Result<Vec<_>>>()?;
            ensure!(row.iter().all(|&j| (j as usize) < n), "[graph::io] node {node}: neighbour out of range");
            adjacencies.push(row);
        }
        ensure!(next().is_err(), "[graph::io] trailing data after {n} nodes");
        Ok(Graph::from_adjacencies(&adjacencies))
    }
}
