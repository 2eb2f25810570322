use std::fmt;
use std::str::FromStr;

use sd_tensor::{DType, Shape};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Spatial downsampling factor between decoded pixels and latents.
pub const VAE_SCALE_FACTOR: usize = 8;
/// Number of latent channels produced by the image autoencoder.
pub const LATENT_CHANNELS: usize = 4;
/// Token sequence length every supported text encoder was compiled for.
pub const MAX_TOKEN_LENGTH: usize = 77;

/// Supported model releases.
///
/// The release fixes the output resolution and the text embedding width
/// the compiled sub-models were traced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelVersion {
    #[serde(rename = "v1.4")]
    V1_4,
    #[default]
    #[serde(rename = "v2.1base")]
    V2_1Base,
    #[serde(rename = "v2.1")]
    V2_1,
}

impl ModelVersion {
    /// Output image size as (height, width).
    pub fn resolution(&self) -> (usize, usize) {
        match self {
            ModelVersion::V1_4 | ModelVersion::V2_1Base => (512, 512),
            ModelVersion::V2_1 => (768, 768),
        }
    }

    /// Latent grid as (height, width): 64x64 for 512 images, 96x96 for 768.
    pub fn latent_size(&self) -> (usize, usize) {
        let (h, w) = self.resolution();
        (h / VAE_SCALE_FACTOR, w / VAE_SCALE_FACTOR)
    }

    /// Shape of the initial noise latent for a single image.
    pub fn latent_shape(&self) -> Shape {
        let (h, w) = self.latent_size();
        Shape::new(vec![1, LATENT_CHANNELS, h, w])
    }

    /// Width of one text-encoder output embedding.
    pub fn embedding_dim(&self) -> usize {
        match self {
            ModelVersion::V1_4 => 768,
            ModelVersion::V2_1Base | ModelVersion::V2_1 => 1024,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVersion::V1_4 => "v1.4",
            ModelVersion::V2_1Base => "v2.1base",
            ModelVersion::V2_1 => "v2.1",
        }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVersion {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v1.4" | "v1_4" => Ok(ModelVersion::V1_4),
            "v2.1base" | "v2_1base" => Ok(ModelVersion::V2_1Base),
            "v2.1" | "v2_1" => Ok(ModelVersion::V2_1),
            other => Err(ModelError::UnknownVersion(other.to_string())),
        }
    }
}

/// Numeric precision the sub-models were compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Precision {
    #[default]
    #[serde(rename = "fp32")]
    Full,
    #[serde(rename = "fp16")]
    Half,
}

impl Precision {
    /// Element type of floating point model inputs at this precision.
    pub fn dtype(&self) -> DType {
        match self {
            Precision::Full => DType::F32,
            Precision::Half => DType::F16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Full => "fp32",
            Precision::Half => "fp16",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precision {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fp32" | "full" => Ok(Precision::Full),
            "fp16" | "half" => Ok(Precision::Half),
            other => Err(ModelError::UnknownPrecision(other.to_string())),
        }
    }
}
