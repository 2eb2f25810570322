use sd_tensor::{Tensor, TensorError};

/// Decoded image in interleaved (height, width, channel) byte layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixels: Vec<u8>,
}

impl Image {
    /// Convert a host decoder output of shape `[1, C, H, W]` or `[C, H, W]`.
    ///
    /// Values are cast straight to bytes, saturating at 0 and 255; the
    /// decoder is expected to emit values already in pixel range.
    pub fn from_tensor(tensor: &Tensor) -> Result<Self, TensorError> {
        let dims = tensor.shape().dims();
        let (channels, height, width) = match *dims {
            [1, c, h, w] | [c, h, w] => (c, h, w),
            _ => {
                return Err(TensorError::Other(format!(
                    "expected a [1, C, H, W] image tensor, got {}",
                    tensor.shape()
                )))
            }
        };
        if !matches!(channels, 1 | 3 | 4) {
            return Err(TensorError::Other(format!(
                "unsupported channel count {}",
                channels
            )));
        }

        let data = tensor.to_f32_vec()?;
        let plane = height * width;
        let mut pixels = Vec::with_capacity(data.len());
        for i in 0..plane {
            for c in 0..channels {
                pixels.push(data[c * plane + i] as u8);
            }
        }

        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Channel values of the pixel at column `x`, row `y`, or `None` outside
    /// the image.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * self.channels;
        self.pixels.get(start..start + self.channels)
    }
}
