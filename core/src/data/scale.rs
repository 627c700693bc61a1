//! Column standardization (zero mean, unit variance).

use nalgebra::DMatrix;

/// Standardizes every column of `matrix` to zero mean and unit variance,
/// returning a new matrix.
///
/// Constant columns keep their centered value (the unit divisor is skipped
/// rather than dividing by zero), matching the scaler behavior the
/// clustering strategies were tuned against.
pub fn standardize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    let n = matrix.nrows();
    if n == 0 {
        return matrix.clone();
    }
    let mut scaled = matrix.clone();
    for mut column in scaled.column_iter_mut() {
        let mean = column.iter().sum::<f64>() / n as f64;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let sd = variance.sqrt();
        let divisor = if sd > 0.0 { sd } else { 1.0 };
        for v in column.iter_mut() {
            *v = (*v - mean) / divisor;
        }
    }
    scaled
}
