//! Host-memory data handles for the interpreter backend.

use std::any::Any;
use std::sync::{Arc, PoisonError, RwLock};

use crate::runtime::data::{BackendData, DataHandle, HostTensor};
use crate::runtime::device::BackendDevice;
use crate::runtime::types::RuntimeError;
use crate::types::Shape;

/// A buffer slot on an interpreter device; empty while a placeholder.
#[derive(Debug)]
pub struct CpuData {
    device: BackendDevice,
    shape: Shape,
    buffer: RwLock<Option<Arc<HostTensor>>>,
}

impl CpuData {
    pub fn materialized(device: BackendDevice, tensor: HostTensor) -> Self {
        Self {
            device,
            shape: tensor.shape().clone(),
            buffer: RwLock::new(Some(Arc::new(tensor))),
        }
    }

    pub fn placeholder(device: BackendDevice, shape: Shape) -> Self {
        Self {
            device,
            shape,
            buffer: RwLock::new(None),
        }
    }

    /// The current buffer; fails while this is still a placeholder.
    pub fn read(&self) -> Result<Arc<HostTensor>, RuntimeError> {
        self.buffer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| RuntimeError::UnmaterializedData {
                shape: self.shape.to_string(),
                device: self.device.to_string(),
            })
    }
}

impl BackendData for CpuData {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn device(&self) -> &BackendDevice {
        &self.device
    }

    fn has_value(&self) -> bool {
        self.buffer.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn assign(&self, other: &dyn BackendData) -> Result<(), RuntimeError> {
        let source = other
            .as_any()
            .downcast_ref::<CpuData>()
            .ok_or_else(|| RuntimeError::execution("cannot assign data owned by another backend"))?;
        if source.shape != self.shape {
            return Err(RuntimeError::shape_mismatch(&self.shape, &source.shape));
        }
        let tensor = source.read()?;
        *self.buffer.write().unwrap_or_else(PoisonError::into_inner) = Some(tensor);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Recovers the interpreter's data type from a handle.
pub fn downcast(handle: &DataHandle) -> Result<&CpuData, RuntimeError> {
    handle.as_any().downcast_ref::<CpuData>().ok_or_else(|| {
        RuntimeError::execution(format!(
            "data for {} on {} was not produced by the interpreter backend",
            handle.shape(),
            handle.device()
        ))
    })
}
