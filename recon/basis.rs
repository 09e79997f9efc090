use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;
use std::f64::consts::PI;
use thiserror::Error;

/// A comprehensive error type for all operations within the basis module.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BasisError {
    #[error("Basis length must be at least 1.")]
    EmptyBasis,

    #[error("At least one measurement is required.")]
    NoMeasurements,

    #[error("Cannot select {requested} measurements from a window of {available} samples.")]
    TooManyMeasurements { requested: usize, available: usize },

    #[error("Expected a vector of length {expected}, but got {found}.")]
    LengthMismatch { expected: usize, found: usize },
}

/// Creates the orthonormal cosine (DCT-II) basis of size `len × len`.
///
/// Row `k` holds the `k`-th cosine atom sampled at the half-integer grid:
/// `psi[k, n] = sqrt(2 / L) · cos(π / L · (n + ½) · k)`, with row 0 scaled by `1/√2`
/// so that `psi · psiᵀ = I`. Coefficients `s` map to a signal via `psiᵀ · s`.
pub fn create_dct_basis(len: usize) -> Result<Array2<f64>, BasisError> {
    if len == 0 {
        return Err(BasisError::EmptyBasis);
    }
    let l = len as f64;
    let scale = (2.0 / l).sqrt();
    let mut psi = Array2::from_shape_fn((len, len), |(k, n)| {
        scale * ((PI / l) * (n as f64 + 0.5) * k as f64).cos()
    });
    psi.row_mut(0).mapv_inplace(|v| v / 2.0_f64.sqrt());
    Ok(psi)
}

/// The random binary row-selection operator `phi`.
///
/// Conceptually an `M × L` matrix formed from the first `M` rows of a randomly
/// permuted identity; stored as the selected sample indices, in permutation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSelection {
    rows: Vec<usize>,
    window_len: usize,
}

impl RowSelection {
    /// Draws a fresh selection of `measurements` distinct samples out of `window_len`.
    pub fn random<R: Rng + ?Sized>(
        window_len: usize,
        measurements: usize,
        rng: &mut R,
    ) -> Result<Self, BasisError> {
        if window_len == 0 {
            return Err(BasisError::EmptyBasis);
        }
        if measurements == 0 {
            return Err(BasisError::NoMeasurements);
        }
        if measurements > window_len {
            return Err(BasisError::TooManyMeasurements {
                requested: measurements,
                available: window_len,
            });
        }
        let mut permutation: Vec<usize> = (0..window_len).collect();
        permutation.shuffle(rng);
        permutation.truncate(measurements);
        Ok(Self {
            rows: permutation,
            window_len,
        })
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn num_measurements(&self) -> usize {
        self.rows.len()
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Dense `M × L` 0/1 matrix form.
    pub fn to_matrix(&self) -> Array2<f64> {
        let mut phi = Array2::zeros((self.rows.len(), self.window_len));
        for (m, &row) in self.rows.iter().enumerate() {
            phi[[m, row]] = 1.0;
        }
        phi
    }

    /// Applies `phi` to a window: `y = phi · window`.
    pub fn measure(&self, window: ArrayView1<f64>) -> Result<Array1<f64>, BasisError> {
        if window.len() != self.window_len {
            return Err(BasisError::LengthMismatch {
                expected: self.window_len,
                found: window.len(),
            });
        }
        Ok(window.select(Axis(0), &self.rows))
    }
}

/// Composes the effective sensing matrix `A = phi · psiᵀ` (shape `M × L`).
///
/// Row `m` of `A` is column `rows[m]` of `psi`, so the product is formed by selection.
pub fn create_sensing_matrix(
    selection: &RowSelection,
    psi: ArrayView2<f64>,
) -> Result<Array2<f64>, BasisError> {
    if psi.nrows() != selection.window_len() || psi.ncols() != selection.window_len() {
        return Err(BasisError::LengthMismatch {
            expected: selection.window_len(),
            found: psi.ncols(),
        });
    }
    Ok(psi.t().select(Axis(0), selection.rows()))
}

/// Everything needed to measure a window and map recovered coefficients back.
#[derive(Debug, Clone)]
pub struct SensingOperator {
    pub basis: Array2<f64>,
    pub selection: RowSelection,
    pub sensing_matrix: Array2<f64>,
}

impl SensingOperator {
    pub fn new<R: Rng + ?Sized>(
        window_len: usize,
        measurements: usize,
        rng: &mut R,
    ) -> Result<Self, BasisError> {
        let basis = create_dct_basis(window_len)?;
        let selection = RowSelection::random(window_len, measurements, rng)?;
        let sensing_matrix = create_sensing_matrix(&selection, basis.view())?;
        log::debug!(
            "Built sensing operator: window {} samples, {} measurements",
            window_len,
            measurements
        );
        Ok(Self {
            basis,
            selection,
            sensing_matrix,
        })
    }

    pub fn window_len(&self) -> usize {
        self.selection.window_len()
    }

    /// Projects coefficients back to signal space: `psiᵀ · s`.
    pub fn synthesize(&self, coefficients: ArrayView1<f64>) -> Result<Array1<f64>, BasisError> {
        if coefficients.len() != self.basis.nrows() {
            return Err(BasisError::LengthMismatch {
                expected: self.basis.nrows(),
                found: coefficients.len(),
            });
        }
        Ok(self.basis.t().dot(&coefficients))
    }
}
