// recon/simulate.rs

//! End-to-end compressive-sensing run: synthesize a signal, build one sensing
//! operator shared by every window, reconstruct window by window, and score the
//! stitched result against the original over the covered interior.

use crate::basis::{BasisError, SensingOperator};
use crate::config::{ConfigError, SimulationConfig};
use crate::signal::{SignalError, SyntheticSignal, generate_signal};
use crate::window::{self, Reconstruction, WindowError};
use ndarray::{ArrayView1, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Signal generation failed: {0}")]
    Signal(#[from] SignalError),
    #[error("Sensing operator construction failed: {0}")]
    Basis(#[from] BasisError),
    #[error("Windowed reconstruction failed: {0}")]
    Window(#[from] WindowError),
    #[error("Invalid solver settings: {0}")]
    Solver(#[from] crate::lasso::LassoError),
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub signal: SyntheticSignal,
    pub reconstruction: Reconstruction,
    /// Pearson correlation between original and reconstruction over the covered samples.
    pub correlation: f64,
    pub window_len: usize,
    pub num_measurements: usize,
}

impl SimulationReport {
    pub fn total_passes(&self) -> usize {
        self.reconstruction.windows.iter().map(|w| w.passes).sum()
    }

    pub fn mean_nonzero(&self) -> f64 {
        let windows = &self.reconstruction.windows;
        if windows.is_empty() {
            return 0.0;
        }
        windows.iter().map(|w| w.nonzero as f64).sum::<f64>() / windows.len() as f64
    }

    /// Writes `time`, `original`, `reconstructed` as a tab-separated table.
    ///
    /// Samples outside the covered range are written with an empty reconstruction.
    pub fn write_tsv(&self, path: &Path) -> Result<(), SimulationError> {
        let mut writer = BufWriter::new(fs::File::create(path)?);
        writeln!(writer, "time\toriginal\treconstructed")?;
        let covered = &self.reconstruction.covered;
        for (i, (&t, &original)) in self
            .signal
            .times
            .iter()
            .zip(self.signal.values.iter())
            .enumerate()
        {
            if covered.contains(&i) {
                writeln!(
                    writer,
                    "{t}\t{original}\t{}",
                    self.reconstruction.values[i]
                )?;
            } else {
                writeln!(writer, "{t}\t{original}\t")?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

/// Pearson correlation coefficient. Returns NaN when either input has zero variance
/// or the lengths differ.
pub fn pearson_correlation(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return f64::NAN;
    }
    let n = a.len() as f64;
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Runs the full simulation described by `config`.
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationReport, SimulationError> {
    let start_time = Instant::now();
    config.signal.validate()?;
    config.validate_windows()?;
    config.solver.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let signal = generate_signal(&config.signal, &mut rng)?;

    let window_len = config.window_len();
    let num_measurements = config.num_measurements();
    let operator = SensingOperator::new(window_len, num_measurements, &mut rng)?;

    let reconstruction = window::reconstruct(
        signal.values.view(),
        &operator,
        &config.solver,
        config.warm_start,
        config.seed,
    )?;

    let covered = reconstruction.covered.clone();
    let correlation = pearson_correlation(
        signal.values.slice(s![covered.clone()]),
        reconstruction.values.slice(s![covered]),
    );

    log::info!(
        "Reconstruction finished in {:.2?}: {} windows, correlation {:.4}",
        start_time.elapsed(),
        reconstruction.windows.len(),
        correlation
    );

    Ok(SimulationReport {
        signal,
        reconstruction,
        correlation,
        window_len,
        num_measurements,
    })
}
