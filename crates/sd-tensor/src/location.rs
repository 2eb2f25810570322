use std::fmt;

/// Where a tensor's elements currently live.
///
/// Compiled models running on an accelerator hand back `Device` tensors when
/// asked to keep their output on device. Host code may only read the
/// elements of `Host` tensors; everything else must be relocated first with
/// [`Tensor::to_location`](crate::Tensor::to_location).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Location {
    #[default]
    Host,
    Device,
}

impl Location {
    pub fn is_host(&self) -> bool {
        matches!(self, Location::Host)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Host => write!(f, "host"),
            Location::Device => write!(f, "device"),
        }
    }
}
