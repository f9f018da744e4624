use anyhow::{ensure, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use rand::{distr::{weighted::WeightedIndex, Distribution}, rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Seeded k-means: k-means++ seeding followed by Lloyd iterations.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    pub k: usize,
    pub seed: u64,
    pub max_iter: usize,
    /// Convergence threshold on the total squared centroid shift, relative to
    /// the mean variance of the features.
    pub tolerance: f64,
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<u32>,
    pub centroids: Array2<f64>,
    /// Sum of squared distances of samples to their centroid.
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self { k, seed, max_iter: 300, tolerance: 1e-4 }
    }

    /// k-means++: the first centroid uniformly, the rest with probability
    /// proportional to the squared distance to the closest chosen centroid.
    fn init(&self, data: &Array2<f64>, rng: &mut StdRng) -> Array2<f64> {
        let n = data.nrows();
        let mut centroids = Array2::zeros((self.k, data.ncols()));
        let first = rng.random_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));

        let mut closest = data.rows().into_iter()
            .map(|row| squared_distance(row, data.row(first)))
            .collect::<Vec<_>>();

        for c in 1..self.k {
            let next = match WeightedIndex::new(&closest) {
                Ok(dist) => dist.sample(rng),
                // All samples coincide with chosen centroids.
                Err(_) => rng.random_range(0..n),
            };
            centroids.row_mut(c).assign(&data.row(next));
            for (d, row) in closest.iter_mut().zip(data.rows()) {
                *d = d.min(squared_distance(row, data.row(next)));
            }
        }
        centroids
    }

    fn assign(data: &Array2<f64>, centroids: &Array2<f64>, labels: &mut Array1<u32>, distances: &mut Array1<f64>) {
        Zip::from(labels).and(distances).and(data.rows())
            .par_for_each(|label, distance, row| {
                let (best, d) = centroids.rows().into_iter()
                    .map(|c| squared_distance(row, c))
                    .enumerate()
                    .fold((0, f64::INFINITY), |best, (k, d)| if d < best.1 { (k, d) } else { best });
                *label = best as u32;
                *distance = d;
            });
    }

    pub fn fit(&self, data: &Array2<f64>) -> Result<KMeansFit> {
        let n = data.nrows();
        ensure!(self.k >= 1, "[kmeans] k must be at least 1");
        ensure!(n >= self.k, "[kmeans] {n} samples cannot form {} clusters", self.k);
        ensure!(data.iter().all(|v| v.is_finite()), "[kmeans] samples contain non-finite values");

        let variance = data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0);
        let threshold = self.tolerance * variance;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = self.init(data, &mut rng);
        let mut labels = Array1::<u32>::zeros(n);
        let mut distances = Array1::<f64>::zeros(n);

        let mut iterations = 0;
        while iterations < self.max_iter {
            iterations += 1;
            Self::assign(data, &centroids, &mut labels, &mut distances);

            let mut sums = Array2::<f64>::zeros(centroids.raw_dim());
            let mut counts = vec![0usize; self.k];
            for (row, &label) in data.rows().into_iter().zip(&labels) {
                let mut sum = sums.row_mut(label as usize);
                sum += &row;
                counts[label as usize] += 1;
            }

            let mut shift = 0.0;
            for (c, &count) in counts.iter().enumerate() {
                // Empty clusters keep their centroid.
                if count == 0 { continue }
                let updated = sums.row(c).mapv(|v| v / count as f64);
                shift += squared_distance(updated.view(), centroids.row(c));
                centroids.row_mut(c).assign(&updated);
            }
            if shift <= threshold { break }
        }

        // Final assignment against the converged centroids.
        Self::assign(data, &centroids, &mut labels, &mut distances);
        let inertia = distances.sum();
        debug!(k = self.k, iterations, inertia, "k-means converged");

        Ok(KMeansFit { labels: labels.to_vec(), centroids, inertia, iterations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f64> {
        array![
            [0.0, 0.0], [0.1, 0.0], [0.0, 0.1],
            [10.0, 10.0], [10.1, 10.0], [10.0, 10.1],
            [0.0, 20.0], [0.1, 20.0],
        ]
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let fit = KMeans::new(3, 7).fit(&blobs()).unwrap();
        let l = &fit.labels;
        assert_eq!(l[0], l[1]);
        assert_eq!(l[0], l[2]);
        assert_eq!(l[3], l[4]);
        assert_eq!(l[6], l[7]);
        assert_ne!(l[0], l[3]);
        assert_ne!(l[3], l[6]);
        assert_ne!(l[0], l[6]);
        assert!(fit.inertia < 0.1);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let a = KMeans::new(2, 7).fit(&blobs()).unwrap();
        let b = KMeans::new(2, 7).fit(&blobs()).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn inertia_decreases_with_k() {
        let one = KMeans::new(1, 7).fit(&blobs()).unwrap();
        let three = KMeans::new(3, 7).fit(&blobs()).unwrap();
        assert!(three.inertia < one.inertia);
        assert!(KMeans::new(9, 7).fit(&blobs()).is_err());
    }

    #[test]
    fn identical_samples() {
        let data = Array2::from_elem((4, 2), 1.0);
        let fit = KMeans::new(2, 7).fit(&data).unwrap();
        assert_eq!(fit.inertia, 0.0);
    }
}
