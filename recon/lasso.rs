// recon/lasso.rs

//! # Sparse Recovery via Cyclic Coordinate Descent
//!
//! Solves the L1-penalized least-squares problem
//!
//! ```text
//!     minimize  ½‖y − A·x‖₂² + λ‖x‖₁
//! ```
//!
//! for a single measurement vector `y` (length N) and a dense sensing matrix `A`
//! (N×D). Each pass visits every coordinate in increasing index order and replaces
//! it with the closed-form minimizer of the one-dimensional subproblem, a
//! soft-thresholded correlation against the partial residual.
//!
//! The residual `r = y − A·x` is carried incrementally: a coordinate update adds the
//! feature's old contribution back, reads the correlation, and subtracts the new
//! contribution. The squared column norms are computed once, and columns whose norm
//! is exactly zero are never visited.
//!
//! Passes continue until the largest coordinate change of a pass, relative to the
//! largest coefficient magnitude seen so far, drops below the tolerance. A pass-count
//! bound turns pathological inputs into an explicit `DidNotConverge` error.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the coordinate-descent solver. No partially updated coefficients
/// are ever returned alongside an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LassoError {
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error(
        "Coordinate descent did not converge within {max_passes} passes. Last relative change was {last_ratio:.6e} (tolerance {tolerance:.3e})."
    )]
    DidNotConverge {
        max_passes: usize,
        last_ratio: f64,
        tolerance: f64,
    },
}

/// Caller-tunable solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LassoConfig {
    /// Strength of the L1 penalty. Must be strictly positive.
    pub l1_lambda: f64,
    /// Relative-change threshold: stop once `max_dxi / max_xi < tolerance`.
    pub tolerance: f64,
    /// Safety bound on the number of full passes.
    pub max_passes: usize,
}

impl Default for LassoConfig {
    fn default() -> Self {
        Self {
            l1_lambda: 0.01,
            tolerance: 1.0e-2,
            max_passes: 10_000,
        }
    }
}

impl LassoConfig {
    pub fn validate(&self) -> Result<(), LassoError> {
        check_positive("l1_lambda", self.l1_lambda)?;
        check_positive("tolerance", self.tolerance)?;
        if self.max_passes == 0 {
            return Err(LassoError::InvalidArgument {
                name: "max_passes",
                reason: "at least one pass is required".to_string(),
            });
        }
        Ok(())
    }
}

/// The outcome of a converged solve.
#[derive(Debug, Clone)]
pub struct LassoFit {
    pub coefficients: Array1<f64>,
    /// Number of full passes performed, including the one that met the tolerance.
    pub passes: usize,
    /// `max_dxi / max_xi` of the final pass.
    pub relative_change: f64,
    /// `½‖y − A·x‖² + λ‖x‖₁` at the returned coefficients.
    pub objective: f64,
}

impl LassoFit {
    pub fn num_nonzero(&self) -> usize {
        self.coefficients.iter().filter(|&&c| c != 0.0).count()
    }
}

/// Minimizer of `½(rho − z)² + λ|z|`; `update_coordinate` divides it by the column norm.
///
/// `rho == 0` takes the non-negative branch; the clamp makes the result zero either way.
pub fn soft_threshold(rho: f64, l1_lambda: f64) -> f64 {
    let sign = if rho >= 0.0 { 1.0 } else { -1.0 };
    sign * (rho.abs() - l1_lambda).max(0.0)
}

/// Working state of one solve: coefficients, incremental residual and the column norm cache.
///
/// The inputs are borrowed read-only for the lifetime of the state; every buffer the
/// iteration mutates is owned here, so independent solves never share anything.
pub struct CoordinateDescent<'a> {
    a: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    l1_lambda: f64,
    column_norms: Array1<f64>,
    x: Array1<f64>,
    residual: Array1<f64>,
    max_abs_coefficient: f64,
}

impl<'a> CoordinateDescent<'a> {
    /// Validates shapes and the penalty, then initializes `x` and `r = y − A·x`.
    ///
    /// Without `x0`, coefficients are drawn uniformly from `[0, 1)` using `rng`, except
    /// for zero columns, which start at 0 since they have no influence on the fit.
    pub fn new<R: Rng + ?Sized>(
        y: ArrayView1<'a, f64>,
        a: ArrayView2<'a, f64>,
        x0: Option<ArrayView1<f64>>,
        l1_lambda: f64,
        rng: &mut R,
    ) -> Result<Self, LassoError> {
        check_positive("l1_lambda", l1_lambda)?;

        let (n, d) = a.dim();
        if n == 0 || d == 0 {
            return Err(LassoError::DimensionMismatch(format!(
                "sensing matrix must have at least one row and one column, got {n}x{d}"
            )));
        }
        if y.len() != n {
            return Err(LassoError::DimensionMismatch(format!(
                "measurement vector has length {}, but the sensing matrix has {n} rows",
                y.len()
            )));
        }
        if let Some(x0) = &x0 {
            if x0.len() != d {
                return Err(LassoError::DimensionMismatch(format!(
                    "initial coefficients have length {}, but the sensing matrix has {d} columns",
                    x0.len()
                )));
            }
            check_finite("x0", x0.iter())?;
        }
        check_finite("y", y.iter())?;
        check_finite("A", a.iter())?;

        let column_norms = a.map_axis(Axis(0), |column| column.dot(&column));

        let x = match x0 {
            Some(x0) => x0.to_owned(),
            None => Array1::from_shape_fn(d, |i| {
                let draw: f64 = rng.gen_range(0.0..1.0);
                if column_norms[i] == 0.0 { 0.0 } else { draw }
            }),
        };

        let residual = &y - &a.dot(&x);
        let max_abs_coefficient = x.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));

        Ok(Self {
            a,
            y,
            l1_lambda,
            column_norms,
            x,
            residual,
            max_abs_coefficient,
        })
    }

    /// Replaces coordinate `i` with its soft-thresholded optimum and returns `|Δxᵢ|`.
    ///
    /// Zero columns are left untouched and report no change.
    pub fn update_coordinate(&mut self, i: usize) -> f64 {
        let norm = self.column_norms[i];
        if norm == 0.0 {
            return 0.0;
        }
        let column = self.a.column(i);
        let previous = self.x[i];

        self.residual.scaled_add(previous, &column);
        let rho = column.dot(&self.residual);
        let updated = soft_threshold(rho, self.l1_lambda) / norm;
        self.residual.scaled_add(-updated, &column);

        self.x[i] = updated;
        // Track magnitude so the convergence ratio is sign-independent.
        self.max_abs_coefficient = self.max_abs_coefficient.max(updated.abs());

        (updated - previous).abs()
    }

    /// One full cyclic pass; returns the largest coordinate change.
    pub fn sweep(&mut self) -> f64 {
        let mut max_change = 0.0_f64;
        for i in 0..self.x.len() {
            max_change = max_change.max(self.update_coordinate(i));
        }
        max_change
    }

    /// `max_change / max_xi`, with an all-zero solution counting as converged.
    pub fn relative_change(&self, max_change: f64) -> f64 {
        if max_change == 0.0 || self.max_abs_coefficient == 0.0 {
            0.0
        } else {
            max_change / self.max_abs_coefficient
        }
    }

    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.x.view()
    }

    pub fn residual(&self) -> ArrayView1<'_, f64> {
        self.residual.view()
    }

    pub fn column_norms(&self) -> ArrayView1<'_, f64> {
        self.column_norms.view()
    }

    pub fn max_abs_coefficient(&self) -> f64 {
        self.max_abs_coefficient
    }

    /// Current value of `½‖r‖² + λ‖x‖₁`.
    pub fn objective(&self) -> f64 {
        penalized_objective(self.residual.view(), self.x.view(), self.l1_lambda)
    }

    /// Recomputes `y − A·x` from scratch, bypassing the incremental residual.
    pub fn recompute_residual(&self) -> Array1<f64> {
        &self.y - &self.a.dot(&self.x)
    }

    fn finish(self, passes: usize, relative_change: f64) -> LassoFit {
        let objective = self.objective();
        LassoFit {
            coefficients: self.x,
            passes,
            relative_change,
            objective,
        }
    }
}

/// `½‖residual‖² + λ‖x‖₁`.
pub fn penalized_objective(residual: ArrayView1<f64>, x: ArrayView1<f64>, l1_lambda: f64) -> f64 {
    0.5 * residual.dot(&residual) + l1_lambda * x.iter().map(|v| v.abs()).sum::<f64>()
}

/// Runs coordinate descent to convergence.
///
/// `rng` is only consulted when `x0` is `None`, to draw the random default start.
pub fn solve<'a, R: Rng + ?Sized>(
    y: ArrayView1<'a, f64>,
    a: ArrayView2<'a, f64>,
    x0: Option<ArrayView1<f64>>,
    config: &LassoConfig,
    rng: &mut R,
) -> Result<LassoFit, LassoError> {
    config.validate()?;
    let mut state = CoordinateDescent::new(y, a, x0, config.l1_lambda, rng)?;

    let mut last_ratio = f64::INFINITY;
    for pass in 1..=config.max_passes {
        let max_change = state.sweep();
        let ratio = state.relative_change(max_change);
        log::trace!(
            "[CD] pass {pass}: max |dx| = {max_change:.3e}, max |x| = {:.3e}, ratio = {ratio:.3e}",
            state.max_abs_coefficient()
        );
        if ratio < config.tolerance {
            log::debug!("[CD] converged after {pass} passes (ratio {ratio:.3e})");
            return Ok(state.finish(pass, ratio));
        }
        last_ratio = ratio;
    }

    log::warn!(
        "Coordinate descent FAILED to converge after {} passes (last ratio {:.3e}).",
        config.max_passes,
        last_ratio
    );
    Err(LassoError::DidNotConverge {
        max_passes: config.max_passes,
        last_ratio,
        tolerance: config.tolerance,
    })
}

/// [`solve`] with a freshly seeded generator for the random default start.
pub fn solve_seeded<'a>(
    y: ArrayView1<'a, f64>,
    a: ArrayView2<'a, f64>,
    x0: Option<ArrayView1<f64>>,
    config: &LassoConfig,
    seed: u64,
) -> Result<LassoFit, LassoError> {
    let mut rng = StdRng::seed_from_u64(seed);
    solve(y, a, x0, config, &mut rng)
}

fn check_positive(name: &'static str, value: f64) -> Result<(), LassoError> {
    // Written as a negation so NaN is rejected too.
    if !(value > 0.0) || !value.is_finite() {
        return Err(LassoError::InvalidArgument {
            name,
            reason: format!("must be a finite, strictly positive number, got {value}"),
        });
    }
    Ok(())
}

fn check_finite<'v>(
    name: &'static str,
    mut values: impl Iterator<Item = &'v f64>,
) -> Result<(), LassoError> {
    if values.any(|v| !v.is_finite()) {
        return Err(LassoError::InvalidArgument {
            name,
            reason: "contains non-finite entries".to_string(),
        });
    }
    Ok(())
}
