use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Signal parameter `{name}` must be a finite, strictly positive number, got {value}.")]
    NonPositive { name: &'static str, value: f64 },

    #[error("Noise level and amplitude jitter must be finite and non-negative (sigma={sigma}, jitter={jitter}).")]
    NegativeSpread { sigma: f64, jitter: f64 },

    #[error("A duration of {duration_secs} s at {sample_rate_hz} Hz yields no samples.")]
    NoSamples {
        duration_secs: f64,
        sample_rate_hz: f64,
    },
}

/// Parameters of the synthetic quasi-periodic test signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub duration_secs: f64,
    pub sample_rate_hz: f64,
    /// Frequency of the underlying sinusoid.
    pub tone_hz: f64,
    /// Standard deviation of the additive Gaussian noise.
    pub noise_sigma: f64,
    /// Per-sample amplitude is drawn from `1 + U[0, 1) · amplitude_jitter`.
    pub amplitude_jitter: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            duration_secs: 600.0,
            sample_rate_hz: 4.0,
            tone_hz: 1.0,
            noise_sigma: 0.1,
            amplitude_jitter: 0.4,
        }
    }
}

impl SignalConfig {
    pub fn num_samples(&self) -> usize {
        (self.duration_secs * self.sample_rate_hz).round() as usize
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        for (name, value) in [
            ("duration_secs", self.duration_secs),
            ("sample_rate_hz", self.sample_rate_hz),
            ("tone_hz", self.tone_hz),
        ] {
            if !(value > 0.0) || !value.is_finite() {
                return Err(SignalError::NonPositive { name, value });
            }
        }
        let spreads_ok = [self.noise_sigma, self.amplitude_jitter]
            .iter()
            .all(|v| *v >= 0.0 && v.is_finite());
        if !spreads_ok {
            return Err(SignalError::NegativeSpread {
                sigma: self.noise_sigma,
                jitter: self.amplitude_jitter,
            });
        }
        if self.num_samples() == 0 {
            return Err(SignalError::NoSamples {
                duration_secs: self.duration_secs,
                sample_rate_hz: self.sample_rate_hz,
            });
        }
        Ok(())
    }
}

/// A sampled signal with its sample times in seconds.
#[derive(Debug, Clone)]
pub struct SyntheticSignal {
    pub times: Array1<f64>,
    pub values: Array1<f64>,
}

impl SyntheticSignal {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Generates `amp_j · (sin(2π·f·t_j − b0) + ε_j)` on the grid `t_j = (j + 1) / fs`.
///
/// The phase `b0` is uniform on `[0, 2π)`, `amp_j = 1 + U[0, 1) · jitter` and
/// `ε_j ~ N(0, σ²)`; all draws come from `rng`.
pub fn generate_signal<R: Rng + ?Sized>(
    config: &SignalConfig,
    rng: &mut R,
) -> Result<SyntheticSignal, SignalError> {
    config.validate()?;
    let n = config.num_samples();
    let period = 1.0 / config.sample_rate_hz;

    let noise = Normal::new(0.0, config.noise_sigma).map_err(|_| SignalError::NegativeSpread {
        sigma: config.noise_sigma,
        jitter: config.amplitude_jitter,
    })?;

    let times = Array1::from_shape_fn(n, |j| (j + 1) as f64 * period);
    let phase = rng.gen_range(0.0..2.0 * PI);

    let mut values = Array1::zeros(n);
    for (value, &t) in values.iter_mut().zip(times.iter()) {
        let amplitude = 1.0 + rng.gen_range(0.0..1.0) * config.amplitude_jitter;
        let clean = (2.0 * PI * config.tone_hz * t - phase).sin();
        *value = amplitude * (clean + noise.sample(rng));
    }

    log::info!(
        "Generated {} samples over {} s (tone {} Hz, sigma {}, jitter {})",
        n,
        config.duration_secs,
        config.tone_hz,
        config.noise_sigma,
        config.amplitude_jitter
    );

    Ok(SyntheticSignal { times, values })
}
