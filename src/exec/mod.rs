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

//! Host interpreter backend.
//!
//! | Module         | Role                                            |
//! |----------------|-------------------------------------------------|
//! | `backend.rs`   | [`CpuBackend`], the `Backend` implementation    |
//! | `lowering.rs`  | Node-by-node lowering into interpreter programs |
//! | `program.rs`   | Straight-line programs and constant folding     |
//! | `cpu.rs`       | Elementwise host kernels                        |
//! | `data.rs`      | Host buffers with placeholder support           |

pub mod backend;
pub mod cpu;
pub mod data;
pub mod lowering;
pub mod program;

pub use backend::CpuBackend;
pub use cpu::ExecError;
pub use data::CpuData;
pub use program::CpuComputation;
