//! Rule-based indicators over grid cell tables.

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::info;

use crate::{
    cluster::FeatureSet,
    common::{f64_column, opt_u32_column, u32_column},
    config::ModelConfig,
};

/// Number of the two morphological conditions that hold: 0, 1 or 2.
#[inline]
pub fn informality_level(isl: bool, sds: bool) -> u32 {
    isl as u32 + sds as u32
}

/// Road access class: 0 near a paved road, 1 near an unpaved road, 2 when the
/// mean number of buildings in between reaches `threshold`.
#[inline]
pub fn road_access_level(mean_buildings_in_between: Option<f64>, mode_paved: Option<u32>, threshold: f64) -> u32 {
    match mean_buildings_in_between {
        Some(mean) if mean < threshold => if mode_paved == Some(1) { 0 } else { 1 },
        _ => 2,
    }
}

/// `isl`, `sds` and `mi` per grid cell, from the labels of the `config.k` clustering runs.
/// Cells without a label count as not matching.
pub fn morphological_informality(labels: &DataFrame, config: &ModelConfig) -> Result<DataFrame> {
    let matches = |set: FeatureSet, clusters: &[u32]| -> Result<Vec<bool>> {
        let name = set.label(config.k);
        let column = opt_u32_column(labels, &name).with_context(|| format!("[model] no clustering with k = {}", config.k))?;
        Ok(column.into_iter().map(|l| l.is_some_and(|l| clusters.contains(&l))).collect())
    };
    let isl = matches(FeatureSet::Isl, &config.isl_clusters)?;
    let sds = matches(FeatureSet::Sds, &config.sds_clusters)?;
    let mi = isl.iter().zip(&sds).map(|(&a, &b)| informality_level(a, b)).collect::<Vec<_>>();

    let counts = [0, 1, 2].map(|level| mi.iter().filter(|&&m| m == level).count());
    info!(none = counts[0], one = counts[1], both = counts[2], "morphological informality");

    Ok(df!(
        "grid_id" => u32_column(labels, "grid_id")?,
        "isl" => isl.iter().map(|&b| b as u32).collect::<Vec<_>>(),
        "sds" => sds.iter().map(|&b| b as u32).collect::<Vec<_>>(),
        "mi" => mi,
    )?)
}

/// `ra` per grid cell from the road access aggregation.
pub fn road_access_deprivation(stats: &DataFrame, threshold: f64) -> Result<DataFrame> {
    let mean = f64_column(stats, "mean_buildings_in_between")?;
    let paved = opt_u32_column(stats, "mode_paved")?;
    let ra = mean.into_iter().zip(paved)
        .map(|(m, p)| road_access_level(m, p, threshold))
        .collect::<Vec<_>>();
    info!(cells = ra.len(), threshold, "road access deprivation");
    Ok(df!("grid_id" => u32_column(stats, "grid_id")?, "ra" => ra)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informality_counts_conditions() {
        assert_eq!(informality_level(false, false), 0);
        assert_eq!(informality_level(true, false), 1);
        assert_eq!(informality_level(false, true), 1);
        assert_eq!(informality_level(true, true), 2);
    }

    #[test]
    fn informality_from_labels() {
        let labels = df!(
            "grid_id" => [1u32, 2, 3, 4],
            "isl_c10" => [Some(3u32), Some(1), Some(3), None],
            "sds_c10" => [Some(0u32), Some(5), Some(5), Some(5)],
        ).unwrap();
        let config = ModelConfig { k: 10, isl_clusters: vec![3], sds_clusters: vec![5, 7] };
        let out = morphological_informality(&labels, &config).unwrap();
        assert_eq!(u32_column(&out, "mi").unwrap(), vec![1, 1, 2, 1]);
        assert_eq!(u32_column(&out, "isl").unwrap(), vec![1, 0, 1, 0]);

        let config = ModelConfig { k: 8, ..config };
        assert!(morphological_informality(&labels, &config).is_err());
    }

    #[test]
    fn road_access_classes() {
        assert_eq!(road_access_level(Some(0.5), Some(1), 2.0), 0);
        assert_eq!(road_access_level(Some(0.5), Some(0), 2.0), 1);
        assert_eq!(road_access_level(Some(2.0), Some(1), 2.0), 2);
        assert_eq!(road_access_level(None, Some(1), 2.0), 2);

        let stats = df!(
            "grid_id" => [1u32, 2],
            "mean_buildings_in_between" => [1.0, 3.5],
            "mode_paved" => [0u32, 1],
        ).unwrap();
        let out = road_access_deprivation(&stats, 2.0).unwrap();
        assert_eq!(u32_column(&out, "ra").unwrap(), vec![1, 2]);
    }
}
