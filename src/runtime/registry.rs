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

//! Holder for the single active backend.
//!
//! A registry is created once at process start, receives exactly one backend,
//! and is passed explicitly to whatever executes graphs. There is no hidden
//! global: a test can build several registries, each with its own backend.
//!
//! # Example
//!
//! ```
//! use mind_lazy::runtime::registry::BackendRegistry;
//!
//! let registry = BackendRegistry::new();
//! assert!(registry.get().is_err());
//! ```

use std::sync::{Arc, OnceLock};

use crate::runtime::backend::Backend;
use crate::runtime::types::RuntimeError;

#[derive(Default)]
pub struct BackendRegistry {
    active: OnceLock<Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self { active: OnceLock::new() }
    }

    /// Installs `backend`. The first registration wins; later attempts are
    /// rejected and the active backend is left in place.
    pub fn register(&self, backend: Arc<dyn Backend>) -> Result<(), RuntimeError> {
        let name = backend.name().to_string();
        match self.active.set(backend) {
            Ok(()) => {
                tracing::info!(backend = %name, "registered lazy tensor backend");
                Ok(())
            }
            Err(_) => {
                let active = self.active.get().map(|b| b.name().to_string()).unwrap_or_default();
                tracing::warn!(active = %active, rejected = %name, "backend already registered");
                Err(RuntimeError::AlreadyRegistered { active, rejected: name })
            }
        }
    }

    /// The active backend, or [`RuntimeError::NoBackend`].
    pub fn get(&self) -> Result<Arc<dyn Backend>, RuntimeError> {
        self.active.get().cloned().ok_or(RuntimeError::NoBackend)
    }

    pub fn is_registered(&self) -> bool {
        self.active.get().is_some()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("active", &self.active.get().map(|b| b.name().to_string()))
            .finish()
    }
}
