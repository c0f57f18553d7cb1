//! Dense Gaussian statistics over cepstral frames
//!
//! Matrices are row-major `d * d` in `f64`. Symmetric matrices are stored in
//! feature vectors as their packed upper triangle, row by row.

/// Number of values in the packed upper triangle of a `d * d` matrix
pub(crate) fn packed_len(d: usize) -> usize {
    d * (d + 1) / 2
}

/// Mean and unbiased covariance of `frames`, with `regularization` added to the diagonal
pub(crate) fn fit(frames: &[Vec<f32>], d: usize, regularization: f64) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = frames.len();
    if n < 2 {
        return None;
    }

    let mut mean = vec![0.0f64; d];
    for frame in frames {
        for (m, &x) in mean.iter_mut().zip(frame) {
            *m += x as f64;
        }
    }
    for m in &mut mean {
        *m /= n as f64;
    }

    let mut covariance = vec![0.0f64; d * d];
    let mut centered = vec![0.0f64; d];
    for frame in frames {
        for ((c, &x), m) in centered.iter_mut().zip(frame).zip(&mean) {
            *c = x as f64 - m;
        }
        for i in 0..d {
            for j in i..d {
                covariance[i * d + j] += centered[i] * centered[j];
            }
        }
    }

    let denom = (n - 1) as f64;
    for i in 0..d {
        for j in i..d {
            let value = covariance[i * d + j] / denom;
            covariance[i * d + j] = value;
            covariance[j * d + i] = value;
        }
        covariance[i * d + i] += regularization;
    }

    Some((mean, covariance))
}

/// Inverse of a symmetric positive-definite matrix through its Cholesky factor
pub(crate) fn cholesky_inverse(matrix: &[f64], d: usize) -> Option<Vec<f64>> {
    // A = L * L^T
    let mut l = vec![0.0f64; d * d];
    for i in 0..d {
        for j in 0..=i {
            let mut sum = matrix[i * d + j];
            for k in 0..j {
                sum -= l[i * d + k] * l[j * d + k];
            }
            if i == j {
                if !(sum > 0.0) || !sum.is_finite() {
                    return None;
                }
                l[i * d + i] = sum.sqrt();
            } else {
                l[i * d + j] = sum / l[j * d + j];
            }
        }
    }

    // L^-1 by forward substitution
    let mut l_inv = vec![0.0f64; d * d];
    for i in 0..d {
        l_inv[i * d + i] = 1.0 / l[i * d + i];
        for j in 0..i {
            let mut sum = 0.0;
            for k in j..i {
                sum -= l[i * d + k] * l_inv[k * d + j];
            }
            l_inv[i * d + j] = sum / l[i * d + i];
        }
    }

    // A^-1 = L^-T * L^-1
    let mut inverse = vec![0.0f64; d * d];
    for i in 0..d {
        for j in i..d {
            let value: f64 = (j..d).map(|k| l_inv[k * d + i] * l_inv[k * d + j]).sum();
            inverse[i * d + j] = value;
            inverse[j * d + i] = value;
        }
    }

    if inverse.iter().all(|v| v.is_finite()) {
        Some(inverse)
    } else {
        None
    }
}

/// Packed upper triangle of a symmetric `d * d` matrix
pub(crate) fn pack_upper(matrix: &[f64], d: usize) -> Vec<f32> {
    let mut packed = Vec::with_capacity(packed_len(d));
    for i in 0..d {
        for j in i..d {
            packed.push(matrix[i * d + j] as f32);
        }
    }
    packed
}

/// `tr(A * B)` for symmetric `A` and `B` given as packed upper triangles
pub(crate) fn packed_trace_product(a: &[f32], b: &[f32], d: usize) -> f64 {
    let mut diagonal = 0.0f64;
    let mut off_diagonal = 0.0f64;
    let mut idx = 0;
    for i in 0..d {
        for j in i..d {
            let product = a[idx] as f64 * b[idx] as f64;
            if i == j {
                diagonal += product;
            } else {
                off_diagonal += product;
            }
            idx += 1;
        }
    }
    diagonal + 2.0 * off_diagonal
}

/// `x^T * A * x` for symmetric `A` given as a packed upper triangle
pub(crate) fn packed_quadratic_form(a: &[f32], x: &[f64], d: usize) -> f64 {
    let mut diagonal = 0.0f64;
    let mut off_diagonal = 0.0f64;
    let mut idx = 0;
    for i in 0..d {
        for j in i..d {
            let term = a[idx] as f64 * x[i] * x[j];
            if i == j {
                diagonal += term;
            } else {
                off_diagonal += term;
            }
            idx += 1;
        }
    }
    diagonal + 2.0 * off_diagonal
}
