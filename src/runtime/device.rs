//! Execution device selection.

use candle_core::Device;
use serde::Serialize;
use std::fmt;

use crate::error::{QaError, Result};

/// Device the network is bound to for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "ordinal")]
pub enum DeviceKind {
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            DeviceKind::Metal(ordinal) => write!(f, "metal:{}", ordinal),
        }
    }
}

/// Pick CUDA, then Metal, then CPU. `use_gpu = false` forces the CPU.
pub fn select_device(use_gpu: bool) -> Result<(Device, DeviceKind)> {
    if use_gpu && candle_core::utils::cuda_is_available() {
        let device = Device::new_cuda(0)
            .map_err(|e| QaError::Load(format!("Failed to initialize CUDA device: {}", e)))?;
        return Ok((device, DeviceKind::Cuda(0)));
    }

    if use_gpu && candle_core::utils::metal_is_available() {
        let device = Device::new_metal(0)
            .map_err(|e| QaError::Load(format!("Failed to initialize Metal device: {}", e)))?;
        return Ok((device, DeviceKind::Metal(0)));
    }

    if use_gpu {
        tracing::warn!("No GPU available, running on CPU");
    }
    Ok((Device::Cpu, DeviceKind::Cpu))
}
