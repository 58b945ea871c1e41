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

//! Device identities seen by the frontend and by backends.
//!
//! The frontend addresses tensors through [`VirtualDevice`]s. A `lazy:N`
//! device is virtual: the active backend decides which concrete
//! [`BackendDevice`] it stands for, using its default device kind. A concrete
//! device string such as `cpu:1` maps to itself when the backend owns it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::runtime::types::RuntimeError;

/// Physical device family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Gpu,
    Tpu,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Gpu => "gpu",
            DeviceKind::Tpu => "tpu",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceKind::Cpu),
            "gpu" | "cuda" => Ok(DeviceKind::Gpu),
            "tpu" => Ok(DeviceKind::Tpu),
            other => Err(RuntimeError::configuration(format!(
                "unknown device kind '{other}'"
            ))),
        }
    }
}

/// A concrete device a backend can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendDevice {
    kind: DeviceKind,
    ordinal: usize,
}

impl BackendDevice {
    pub fn new(kind: DeviceKind, ordinal: usize) -> Self {
        Self { kind, ordinal }
    }

    pub fn cpu(ordinal: usize) -> Self {
        Self::new(DeviceKind::Cpu, ordinal)
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl fmt::Display for BackendDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.ordinal)
    }
}

impl FromStr for BackendDevice {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, ordinal) = split_device(s)?;
        Ok(BackendDevice::new(kind.parse()?, ordinal))
    }
}

/// A device as named by the frontend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VirtualDevice {
    /// Backend-chosen device kind, addressed by ordinal.
    Lazy(usize),
    /// A concrete device; maps to itself.
    Concrete(BackendDevice),
}

impl fmt::Display for VirtualDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VirtualDevice::Lazy(ordinal) => write!(f, "lazy:{ordinal}"),
            VirtualDevice::Concrete(device) => write!(f, "{device}"),
        }
    }
}

impl From<BackendDevice> for VirtualDevice {
    fn from(device: BackendDevice) -> Self {
        VirtualDevice::Concrete(device)
    }
}

impl FromStr for VirtualDevice {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, ordinal) = split_device(s)?;
        if kind.eq_ignore_ascii_case("lazy") {
            return Ok(VirtualDevice::Lazy(ordinal));
        }
        Ok(VirtualDevice::Concrete(BackendDevice::new(kind.parse()?, ordinal)))
    }
}

/// Splits `kind[:ordinal]`; a missing ordinal means 0.
fn split_device(s: &str) -> Result<(&str, usize), RuntimeError> {
    let s = s.trim();
    match s.split_once(':') {
        None if !s.is_empty() => Ok((s, 0)),
        None => Err(RuntimeError::configuration("empty device string")),
        Some((kind, ordinal)) => {
            let ordinal = ordinal.parse::<usize>().map_err(|_| {
                RuntimeError::configuration(format!("invalid device ordinal in '{s}'"))
            })?;
            Ok((kind, ordinal))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::types::ErrorKind;

    #[test]
    fn backend_device_round_trips_through_display() {
        let device = BackendDevice::new(DeviceKind::Gpu, 3);
        assert_eq!(device.to_string(), "gpu:3");
        assert_eq!("gpu:3".parse::<BackendDevice>().unwrap(), device);
        assert_eq!("CUDA:3".parse::<BackendDevice>().unwrap(), device);
    }

    #[test]
    fn missing_ordinal_defaults_to_zero() {
        assert_eq!("cpu".parse::<BackendDevice>().unwrap(), BackendDevice::cpu(0));
        assert_eq!("lazy".parse::<VirtualDevice>().unwrap(), VirtualDevice::Lazy(0));
    }

    #[test]
    fn virtual_device_parses_lazy_and_concrete() {
        assert_eq!("lazy:2".parse::<VirtualDevice>().unwrap(), VirtualDevice::Lazy(2));
        assert_eq!(
            "tpu:1".parse::<VirtualDevice>().unwrap(),
            VirtualDevice::Concrete(BackendDevice::new(DeviceKind::Tpu, 1))
        );
    }

    #[test]
    fn unknown_kind_is_configuration_error() {
        let err = "npu:0".parse::<VirtualDevice>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = "cpu:x".parse::<BackendDevice>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!("".parse::<BackendDevice>().is_err());
    }

    #[test]
    fn devices_order_by_kind_then_ordinal() {
        let mut devices = vec![
            BackendDevice::new(DeviceKind::Gpu, 0),
            BackendDevice::cpu(1),
            BackendDevice::cpu(0),
        ];
        devices.sort();
        assert_eq!(
            devices,
            vec![
                BackendDevice::cpu(0),
                BackendDevice::cpu(1),
                BackendDevice::new(DeviceKind::Gpu, 0)
            ]
        );
    }
}
