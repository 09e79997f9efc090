use crate::lasso::LassoConfig;
use crate::signal::SignalConfig;
use crate::window::WarmStart;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the human-readable format of a simulation run when
// serialized to a TOML file.

/// Window geometry, expressed in the signal's own units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window length in seconds. Must divide the signal duration exactly.
    pub window_secs: f64,
    /// Samples per measurement: `M = L / compression_ratio`.
    pub compression_ratio: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_secs: 60.0,
            compression_ratio: 12,
        }
    }
}

/// The complete blueprint of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seeds every random draw: signal, measurement rows and solver start.
    pub seed: u64,
    pub warm_start: WarmStart,
    pub signal: SignalConfig,
    pub window: WindowConfig,
    pub solver: LassoConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            warm_start: WarmStart::Cold,
            signal: SignalConfig::default(),
            window: WindowConfig::default(),
            solver: LassoConfig::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error(
        "Window of {window_secs} s does not divide the {duration_secs} s signal into complete windows."
    )]
    IncompleteWindows {
        window_secs: f64,
        duration_secs: f64,
    },
    #[error("Window of {window_secs} s at {sample_rate_hz} Hz is {samples} samples; it must be a positive multiple of 4.")]
    InvalidWindowSamples {
        window_secs: f64,
        sample_rate_hz: f64,
        samples: usize,
    },
    #[error("Compression ratio {ratio} leaves no measurements in a window of {samples} samples.")]
    InvalidCompression { ratio: usize, samples: usize },
}

impl SimulationConfig {
    /// Samples per window, `L`.
    pub fn window_len(&self) -> usize {
        (self.window.window_secs * self.signal.sample_rate_hz).round() as usize
    }

    /// Measurements per window, `M`.
    pub fn num_measurements(&self) -> usize {
        if self.window.compression_ratio == 0 {
            0
        } else {
            self.window_len() / self.window.compression_ratio
        }
    }

    /// Checks the window geometry against the signal. Signal and solver parameters
    /// are validated by their owning modules.
    pub fn validate_windows(&self) -> Result<(), ConfigError> {
        let duration = self.signal.duration_secs;
        let window_secs = self.window.window_secs;
        let windows = duration / window_secs;
        if !(window_secs > 0.0) || !windows.is_finite() || (windows - windows.round()).abs() > 1e-9
        {
            return Err(ConfigError::IncompleteWindows {
                window_secs,
                duration_secs: duration,
            });
        }

        let samples = self.window_len();
        if samples == 0 || samples % 4 != 0 {
            return Err(ConfigError::InvalidWindowSamples {
                window_secs,
                sample_rate_hz: self.signal.sample_rate_hz,
                samples,
            });
        }
        if self.num_measurements() == 0 {
            return Err(ConfigError::InvalidCompression {
                ratio: self.window.compression_ratio,
                samples,
            });
        }
        Ok(())
    }

    /// Saves the configuration to a file in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a configuration from a TOML file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_geometry_matches_reference_scenario() {
        let config = SimulationConfig::default();
        assert_eq!(config.window_len(), 240);
        assert_eq!(config.num_measurements(), 20);
        assert!(config.validate_windows().is_ok());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("simulation.toml");
        let config = SimulationConfig {
            seed: 1234,
            warm_start: WarmStart::Previous,
            solver: LassoConfig {
                l1_lambda: 0.05,
                tolerance: 1e-4,
                max_passes: 500,
            },
            ..SimulationConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "seed = 9\n\n[solver]\nl1_lambda = 0.5\n").unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        assert_eq!(loaded.seed, 9);
        assert_eq!(loaded.solver.l1_lambda, 0.5);
        assert_eq!(loaded.solver.tolerance, LassoConfig::default().tolerance);
        assert_eq!(loaded.signal, SignalConfig::default());
    }

    #[test]
    fn test_rejects_incomplete_windows() {
        let mut config = SimulationConfig::default();
        config.window.window_secs = 70.0;
        assert!(matches!(
            config.validate_windows(),
            Err(ConfigError::IncompleteWindows { .. })
        ));

        let mut config = SimulationConfig::default();
        config.window.window_secs = 1.5; // 6 samples
        config.signal.duration_secs = 600.0;
        assert!(matches!(
            config.validate_windows(),
            Err(ConfigError::InvalidWindowSamples { samples: 6, .. })
        ));

        let mut config = SimulationConfig::default();
        config.window.compression_ratio = 500;
        assert!(matches!(
            config.validate_windows(),
            Err(ConfigError::InvalidCompression { .. })
        ));
    }

    #[test]
    fn test_malformed_toml_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "seed = \"not a number\"").unwrap();
        assert!(matches!(
            SimulationConfig::load(&path),
            Err(ConfigError::TomlParseError(_))
        ));
    }
}
