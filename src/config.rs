// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the MIND project (Machine Intelligence Native Design).

//! Runtime configuration loaded from `MindLazy.toml`.
//!
//! ```toml
//! [backend]
//! default_device_type = "cpu"
//! devices = ["cpu:0", "cpu:1"]
//! rng_seed = 42
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Every field is optional. `MIND_LAZY_DEVICE_TYPE` overrides
//! `backend.default_device_type` when set.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::runtime::device::BackendDevice;
use crate::runtime::types::RuntimeError;

/// Environment variable overriding the default device type.
pub const DEVICE_TYPE_ENV: &str = "MIND_LAZY_DEVICE_TYPE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub backend: BackendSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
    /// Kind that `lazy:N` devices resolve to. Falls back to the backend's
    /// own default when unset.
    pub default_device_type: Option<String>,
    /// Concrete devices in `kind:ordinal` form.
    pub devices: Vec<String>,
    pub rng_seed: Option<u64>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            default_device_type: None,
            devices: vec!["cpu:0".to_string()],
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// `compact`, `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Applies environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(std::env::var(DEVICE_TYPE_ENV).ok());
    }

    fn apply_overrides(&mut self, device_type: Option<String>) {
        if let Some(kind) = device_type.filter(|kind| !kind.trim().is_empty()) {
            tracing::debug!(kind = %kind, "default device type overridden from {DEVICE_TYPE_ENV}");
            self.backend.default_device_type = Some(kind.trim().to_string());
        }
    }

    /// Parsed device list; an empty list means `cpu:0`.
    pub fn devices(&self) -> Result<Vec<BackendDevice>, RuntimeError> {
        if self.backend.devices.is_empty() {
            return Ok(vec![BackendDevice::cpu(0)]);
        }
        self.backend.devices.iter().map(|device| device.parse()).collect()
    }

    /// Builds the host interpreter configured by this file.
    #[cfg(feature = "cpu-exec")]
    pub fn build_cpu_backend(&self) -> Result<crate::exec::CpuBackend, RuntimeError> {
        use crate::runtime::backend::Backend;

        let backend = crate::exec::CpuBackend::with_devices(self.devices()?)?;
        if let Some(kind) = &self.backend.default_device_type {
            backend.set_default_device_type(kind)?;
        }
        if let Some(seed) = self.backend.rng_seed {
            backend.set_rng_seed(seed);
        }
        Ok(backend)
    }
}
