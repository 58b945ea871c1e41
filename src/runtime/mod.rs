//! Backend contract for the lazy tensor runtime.
//!
//! This module hosts the interface a backend implements (devices, data
//! transfer, lowering, compilation, execution) and the registry that holds
//! the active backend. Concrete backends live elsewhere; the reference host
//! interpreter is in [`crate::exec`].

pub mod backend;
pub mod computation;
pub mod data;
pub mod device;
pub mod lowering;
pub mod registry;
pub mod types;

pub use backend::Backend;
pub use computation::{check_arguments, Computation, ComputationRef};
pub use data::{BackendData, DataHandle, HostTensor, Residency};
pub use device::{BackendDevice, DeviceKind, VirtualDevice};
pub use lowering::LoweringContext;
pub use registry::BackendRegistry;
pub use types::{ErrorKind, RuntimeError};
