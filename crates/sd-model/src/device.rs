use std::fmt;
use std::str::FromStr;

use sd_tensor::Location;

use crate::error::ModelError;

/// Backend a compiled model was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
    Vulkan,
    Metal,
}

impl Device {
    /// Where inputs must live before the model can consume them.
    ///
    /// CPU models read host memory directly; every accelerator backend takes
    /// device-resident buffers.
    pub fn input_location(&self) -> Location {
        match self {
            Device::Cpu => Location::Host,
            Device::Cuda | Device::Vulkan | Device::Metal => Location::Device,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Vulkan => "vulkan",
            Device::Metal => "metal",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda),
            "vulkan" => Ok(Device::Vulkan),
            "metal" => Ok(Device::Metal),
            other => Err(ModelError::UnknownDevice(other.to_string())),
        }
    }
}
