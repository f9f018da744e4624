use ndarray::{Array2, Axis};

/// Centre every column on its mean and divide by its population standard
/// deviation. Constant columns are only centred.
pub fn standard_scale(data: &Array2<f64>) -> Array2<f64> {
    let mut scaled = data.clone();
    if data.nrows() == 0 { return scaled }

    for mut column in scaled.axis_iter_mut(Axis(1)) {
        let n = column.len() as f64;
        let mean = column.sum() / n;
        let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let std = if std > 0.0 { std } else { 1.0 };
        column.mapv_inplace(|v| (v - mean) / std);
    }
    scaled
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn columns_have_zero_mean_and_unit_variance() {
        let scaled = standard_scale(&array![[1.0, 5.0], [3.0, 5.0]]);
        assert_eq!(scaled, array![[-1.0, 0.0], [1.0, 0.0]]);
    }
}
