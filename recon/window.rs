// recon/window.rs

//! Sliding-window reconstruction.
//!
//! The signal is cut into windows of `L` samples advancing by `L/2`. Every window is
//! measured with the same sensing operator, its sparse cosine coefficients are
//! recovered, and the middle half `[L/4, 3L/4)` of the synthesized window is written
//! into the output. Neighbouring windows therefore tile the interior exactly; the
//! outer `L/4` samples at either end are never covered.

use crate::basis::{BasisError, SensingOperator};
use crate::lasso::{self, LassoConfig, LassoError, LassoFit};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ndarray::{Array1, ArrayView1, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Window length must be a positive multiple of 4, but was {0}.")]
    InvalidWindowLength(usize),

    #[error("Signal has {signal_len} samples, fewer than one window of {window_len}.")]
    SignalTooShort {
        signal_len: usize,
        window_len: usize,
    },

    #[error("Sensing operator covers {operator_len} samples, but the window plan uses {window_len}.")]
    OperatorMismatch {
        operator_len: usize,
        window_len: usize,
    },

    #[error("Measurement or synthesis failed: {0}")]
    Basis(#[from] BasisError),

    #[error("Sparse recovery failed in window {window} (starting at sample {start}): {source}")]
    Solver {
        window: usize,
        start: usize,
        #[source]
        source: LassoError,
    },
}

/// How each window's solver is initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WarmStart {
    /// Every window starts from the solver's random default; windows run in parallel.
    #[default]
    Cold,
    /// Every window after the first starts from its predecessor's coefficients.
    Previous,
}

/// Geometry of the sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlan {
    window_len: usize,
}

impl WindowPlan {
    pub fn new(window_len: usize) -> Result<Self, WindowError> {
        if window_len == 0 || window_len % 4 != 0 {
            return Err(WindowError::InvalidWindowLength(window_len));
        }
        Ok(Self { window_len })
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn hop(&self) -> usize {
        self.window_len / 2
    }

    /// Portion of each window that is kept when stitching.
    pub fn keep_range(&self) -> Range<usize> {
        self.window_len / 4..3 * self.window_len / 4
    }

    /// Start offsets of every complete window in a signal of `signal_len` samples.
    pub fn starts(&self, signal_len: usize) -> Vec<usize> {
        if signal_len < self.window_len {
            return Vec::new();
        }
        (0..=signal_len - self.window_len)
            .step_by(self.hop())
            .collect()
    }

    /// Samples of the output that receive reconstructed values.
    pub fn covered_range(&self, signal_len: usize) -> Range<usize> {
        let keep = self.keep_range();
        match self.starts(signal_len).last() {
            Some(&last) => keep.start..last + keep.end,
            None => 0..0,
        }
    }

    /// Copies the kept middle of `window` into `output` at its stitched position.
    pub fn stitch(&self, output: &mut Array1<f64>, start: usize, window: ArrayView1<f64>) {
        let keep = self.keep_range();
        output
            .slice_mut(s![start + keep.start..start + keep.end])
            .assign(&window.slice(s![keep.start..keep.end]));
    }
}

/// Per-window solver statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub start: usize,
    pub passes: usize,
    pub nonzero: usize,
    pub objective: f64,
}

/// The stitched output of a windowed reconstruction.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub values: Array1<f64>,
    pub covered: Range<usize>,
    pub windows: Vec<WindowSummary>,
}

struct WindowSolution {
    start: usize,
    fit: LassoFit,
    samples: Array1<f64>,
}

/// Seed for window `index`, so parallel cold starts are reproducible.
pub fn window_seed(seed: u64, index: usize) -> u64 {
    seed.wrapping_add((index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

fn solve_window(
    signal: ArrayView1<f64>,
    operator: &SensingOperator,
    solver: &LassoConfig,
    index: usize,
    start: usize,
    x0: Option<ArrayView1<f64>>,
    rng: &mut StdRng,
) -> Result<WindowSolution, WindowError> {
    let window = signal.slice(s![start..start + operator.window_len()]);
    let measurements = operator.selection.measure(window)?;
    let fit = lasso::solve(
        measurements.view(),
        operator.sensing_matrix.view(),
        x0,
        solver,
        rng,
    )
    .map_err(|source| WindowError::Solver {
        window: index,
        start,
        source,
    })?;
    let samples = operator.synthesize(fit.coefficients.view())?;
    log::debug!(
        "Window {index} @ {start}: {} passes, {} nonzero coefficients",
        fit.passes,
        fit.num_nonzero()
    );
    Ok(WindowSolution {
        start,
        fit,
        samples,
    })
}

/// Reconstructs `signal` window by window and stitches the results.
pub fn reconstruct(
    signal: ArrayView1<f64>,
    operator: &SensingOperator,
    solver: &LassoConfig,
    warm_start: WarmStart,
    seed: u64,
) -> Result<Reconstruction, WindowError> {
    let plan = WindowPlan::new(operator.window_len())?;
    if signal.len() < plan.window_len() {
        return Err(WindowError::SignalTooShort {
            signal_len: signal.len(),
            window_len: plan.window_len(),
        });
    }
    if operator.sensing_matrix.ncols() != plan.window_len() {
        return Err(WindowError::OperatorMismatch {
            operator_len: operator.sensing_matrix.ncols(),
            window_len: plan.window_len(),
        });
    }

    let starts = plan.starts(signal.len());
    log::info!(
        "Reconstructing {} windows of {} samples ({} measurements each, {:?} start)",
        starts.len(),
        plan.window_len(),
        operator.selection.num_measurements(),
        warm_start
    );
    let pb = create_progress_bar(starts.len() as u64, "Solving windows");

    let solutions: Vec<WindowSolution> = match warm_start {
        WarmStart::Cold => starts
            .par_iter()
            .enumerate()
            .map(|(index, &start)| {
                let mut rng = StdRng::seed_from_u64(window_seed(seed, index));
                let solution =
                    solve_window(signal, operator, solver, index, start, None, &mut rng);
                pb.inc(1);
                solution
            })
            .collect::<Result<Vec<_>, _>>()?,
        WarmStart::Previous => {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut solutions: Vec<WindowSolution> = Vec::with_capacity(starts.len());
            for (index, &start) in starts.iter().enumerate() {
                let x0 = solutions.last().map(|prev| prev.fit.coefficients.view());
                let solution =
                    solve_window(signal, operator, solver, index, start, x0, &mut rng)?;
                solutions.push(solution);
                pb.inc(1);
            }
            solutions
        }
    };
    pb.finish_and_clear();

    let mut values = Array1::zeros(signal.len());
    let mut windows = Vec::with_capacity(solutions.len());
    for solution in &solutions {
        plan.stitch(&mut values, solution.start, solution.samples.view());
        windows.push(WindowSummary {
            start: solution.start,
            passes: solution.fit.passes,
            nonzero: solution.fit.num_nonzero(),
            objective: solution.fit.objective,
        });
    }

    Ok(Reconstruction {
        values,
        covered: plan.covered_range(signal.len()),
        windows,
    })
}
