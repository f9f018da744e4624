//! Unsupervised clustering of grid cells on morphometric summaries.

mod kmeans;
mod scale;

pub use kmeans::{KMeans, KMeansFit};
pub use scale::standard_scale;

use anyhow::{Context, Result};
use ndarray::Array2;
use polars::prelude::*;
use tracing::{info, warn};

use crate::{common::f64_column, config::ClusteringConfig};

/// Feature sets clustered independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSet {
    /// Irregular settlement layout.
    Isl,
    /// Small, dense structures.
    Sds,
}

impl FeatureSet {
    pub const ALL: [FeatureSet; 2] = [FeatureSet::Isl, FeatureSet::Sds];

    pub fn prefix(&self) -> &'static str {
        match self {
            FeatureSet::Isl => "isl",
            FeatureSet::Sds => "sds",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            FeatureSet::Isl => &["md_ssbCCD", "md_mtbAli", "md_ltcBuA", "md_mtcWNe", "md_ltcWRB", "sd_stbOri", "sd_stcOri"],
            FeatureSet::Sds => &[
                "md_sdcAre", "md_ssbElo", "md_mtbNDi", "md_ltbIBD", "md_ltcBuA", "md_sdbAre",
                "md_sscERI", "md_sicCAR", "md_mtcWNe", "md_mdcAre", "md_ltcWRB", "sum_sdcAre",
            ],
        }
    }

    /// Name of the label column for `k` clusters, e.g. `isl_c10`.
    pub fn label(&self, k: usize) -> String {
        format!("{}_c{k}", self.prefix())
    }
}

/// Cluster labels appended to the grid table, and the inertia of every run.
#[derive(Debug, Clone)]
pub struct Clustering {
    pub labels: DataFrame,
    pub elbow: DataFrame,
}

/// Scaled feature matrix over the rows where every feature is present.
fn features(table: &DataFrame, set: FeatureSet) -> Result<(Vec<usize>, Array2<f64>)> {
    let columns = set.columns().iter()
        .map(|name| f64_column(table, name).with_context(|| format!("[cluster] {} feature missing", set.prefix())))
        .collect::<Result<Vec<_>>>()?;

    let (rows, flat): (Vec<usize>, Vec<Vec<f64>>) = (0..table.height())
        .filter_map(|r| {
            let row = columns.iter().map(|c| c[r].filter(|v| v.is_finite())).collect::<Option<Vec<_>>>()?;
            Some((r, row))
        })
        .unzip();
    if rows.len() < table.height() {
        warn!(set = set.prefix(), skipped = table.height() - rows.len(), "grid cells with missing features");
    }

    let data = Array2::from_shape_vec((rows.len(), columns.len()), flat.concat())?;
    Ok((rows, standard_scale(&data)))
}

/// Run k-means for every configured `k` on both feature sets.
pub fn cluster_grid(table: &DataFrame, config: &ClusteringConfig) -> Result<Clustering> {
    let mut labels = table.clone();
    let (mut sets, mut ks, mut inertias, mut iterations) = (vec![], vec![], vec![], vec![]);

    for set in FeatureSet::ALL {
        let (rows, data) = features(table, set)?;
        for &k in &config.ks {
            let kmeans = KMeans { k, seed: config.seed, max_iter: config.max_iter, tolerance: config.tolerance };
            let fit = kmeans.fit(&data).with_context(|| format!("[cluster] {}", set.label(k)))?;

            let mut column = vec![None; table.height()];
            for (&r, &label) in rows.iter().zip(&fit.labels) {
                column[r] = Some(label);
            }
            labels.with_column(Column::new(set.label(k).into(), column))?;

            sets.push(set.prefix());
            ks.push(k as u32);
            inertias.push(fit.inertia);
            iterations.push(fit.iterations as u32);
            info!(set = set.prefix(), k, inertia = fit.inertia, "clustered grid cells");
        }
    }

    let elbow = df!("set" => sets, "k" => ks, "inertia" => inertias, "iterations" => iterations)?;
    Ok(Clustering { labels, elbow })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: usize) -> DataFrame {
        let mut columns = vec![Column::new("grid_id".into(), (1..=n as u32).collect::<Vec<_>>())];
        let names = FeatureSet::Isl.columns().iter().chain(FeatureSet::Sds.columns()).collect::<Vec<_>>();
        for (j, name) in names.iter().enumerate() {
            if columns.iter().any(|c| c.name().as_str() == **name) { continue }
            let values = (0..n).map(|i| ((i % 3) * 10 + j) as f64).collect::<Vec<_>>();
            columns.push(Column::new((**name).into(), values));
        }
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn labels_for_every_k_and_set() {
        let config = ClusteringConfig { ks: vec![2, 3], ..Default::default() };
        let clustering = cluster_grid(&table(12), &config).unwrap();

        for name in ["isl_c2", "isl_c3", "sds_c2", "sds_c3"] {
            let column = clustering.labels.column(name).unwrap();
            assert_eq!(column.null_count(), 0, "{name}");
        }
        assert_eq!(clustering.elbow.height(), 4);

        // Three distinct rows repeated: k = 3 recovers them exactly.
        let inertia = f64_column(&clustering.elbow, "inertia").unwrap();
        assert!(inertia[1].unwrap() < 1e-9);
        assert!(inertia[3].unwrap() < 1e-9);
    }

    #[test]
    fn too_few_cells_is_an_error() {
        assert!(cluster_grid(&table(4), &ClusteringConfig::default()).is_err());
    }

    #[test]
    fn label_names() {
        assert_eq!(FeatureSet::Isl.label(10), "isl_c10");
        assert_eq!(FeatureSet::Sds.label(6), "sds_c6");
    }
}
