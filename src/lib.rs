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

//! Pluggable backend core for the MIND lazy tensor runtime.
//!
//! The frontend records tensor operations as graph nodes ([`ir`]) and hands
//! post-ordered slices of that graph to whichever [`runtime::Backend`] is
//! registered in a [`runtime::BackendRegistry`]. The backend lowers, compiles
//! and executes them on its devices. [`pipeline::LazyGraphExecutor`] drives
//! that sequence and caches compiled computations by content hash.
//!
//! With the default `cpu-exec` feature, [`exec::CpuBackend`] provides a host
//! interpreter implementing the whole contract.

pub mod config;
#[cfg(feature = "cpu-exec")]
pub mod exec;
pub mod hash;
pub mod ir;
pub mod logging;
pub mod pipeline;
pub mod runtime;
pub mod types;

pub use hash::ContentHash;
pub use runtime::{Backend, BackendDevice, BackendRegistry, DataHandle, DeviceKind, RuntimeError, VirtualDevice};
