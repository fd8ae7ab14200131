//! Image to tensor preprocessing
//!
//! Turns one decoded image into the `[1, 3, 224, 224]` float tensor the
//! classifier expects:
//!
//! 1. RGB blob in HWC order, tensor `[H, W, 3]`
//! 2. permute to `[3, H, W]`
//! 3. scale to `[0, 1]`
//! 4. normalize with the ImageNet mean / std
//! 5. center-crop to `[3, S, S]` with `S = min(W, H)`
//! 6. unsqueeze to `[1, 3, S, S]`
//! 7. bilinear resize to `[1, 3, 224, 224]`
//!
//! Each stage is a single candle call; the shape is checked after every stage.

use crate::image_input::InputImage;
use crate::tensor::{expect_dims, TensorResultExt};
use candle_core::{DType, Device, Tensor};
use charid_core::{Error, ImageDims, Result};
use tracing::debug;

/// Per-channel mean used for normalization
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation used for normalization
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Spatial side of the tensor fed to the model
pub const INPUT_SIZE: usize = 224;

/// Number of color channels
pub const CHANNELS: usize = 3;

/// Build an `[H, W, 3]` `u8` tensor from an RGB blob
pub fn blob_to_tensor(blob: Vec<u8>, dims: ImageDims, device: &Device) -> Result<Tensor> {
    if !dims.is_valid() {
        return Err(Error::image(format!("image must not be empty, got {}", dims)));
    }
    if blob.len() != dims.rgb_len() {
        return Err(Error::image(format!(
            "RGB blob for a {} image must be {} bytes, got {}",
            dims,
            dims.rgb_len(),
            blob.len()
        )));
    }

    let (h, w) = (dims.height as usize, dims.width as usize);
    Tensor::from_vec(blob, (h, w, CHANNELS), device).op("from_blob")
}

/// `[H, W, C]` to `[C, H, W]`
pub fn to_channels_first(tensor: &Tensor) -> Result<Tensor> {
    tensor.permute((2, 0, 1)).op("permute")
}

/// Convert to `f32` and divide every element by 255
pub fn scale_unit(tensor: &Tensor) -> Result<Tensor> {
    tensor
        .to_dtype(DType::F32)
        .op("to_dtype")?
        .affine(1.0 / 255.0, 0.0)
        .op("div")
}

/// `(x - mean[c]) / std[c]` for a `[3, H, W]` tensor
pub fn normalize(tensor: &Tensor) -> Result<Tensor> {
    let device = tensor.device();
    let mean = Tensor::new(&IMAGENET_MEAN, device)
        .and_then(|t| t.reshape((CHANNELS, 1, 1)))
        .op("normalize")?;
    let std = Tensor::new(&IMAGENET_STD, device)
        .and_then(|t| t.reshape((CHANNELS, 1, 1)))
        .op("normalize")?;

    tensor
        .broadcast_sub(&mean)
        .and_then(|t| t.broadcast_div(&std))
        .op("normalize")
}

/// Crop the spatial dims of a `[C, H, W]` tensor to a centered `size x size` square.
///
/// The top/left offset is `floor((dim - size) / 2)`.
pub fn center_crop(tensor: &Tensor, size: usize) -> Result<Tensor> {
    let (_, h, w) = tensor.dims3().op("center_crop")?;
    if size == 0 || size > h || size > w {
        return Err(Error::image(format!(
            "cannot center-crop a {}x{} tensor to {}",
            w, h, size
        )));
    }

    let top = (h - size) / 2;
    let left = (w - size) / 2;

    tensor
        .narrow(1, top, size)
        .and_then(|t| t.narrow(2, left, size))
        .op("center_crop")
}

/// Insert the leading batch dimension
pub fn add_batch_dim(tensor: &Tensor) -> Result<Tensor> {
    tensor.unsqueeze(0).op("unsqueeze")
}

/// Row-stochastic `[out, in]` matrix resampling one axis with a triangle filter.
///
/// This is bilinear interpolation with half-pixel centers. When shrinking the
/// filter widens to the scale factor so every source pixel contributes, the
/// same behavior as `image::imageops::FilterType::Triangle`.
fn triangle_weights(in_size: usize, out_size: usize) -> Vec<f32> {
    let scale = in_size as f32 / out_size as f32;
    let support = scale.max(1.0);
    let mut weights = vec![0.0f32; out_size * in_size];

    for (d, row) in weights.chunks_mut(in_size).enumerate() {
        let center = (d as f32 + 0.5) * scale;
        let first = (center - support).floor().max(0.0) as usize;
        let last = ((center + support).ceil() as usize).min(in_size);

        let mut sum = 0.0;
        for (j, w) in row.iter_mut().enumerate().take(last).skip(first) {
            let dist = ((j as f32 + 0.5) - center).abs() / support;
            *w = (1.0 - dist).max(0.0);
            sum += *w;
        }
        if sum > 0.0 {
            row.iter_mut().for_each(|w| *w /= sum);
        }
    }

    weights
}

/// Resize the spatial dims of a `[N, C, H, W]` tensor to `INPUT_SIZE x INPUT_SIZE`
/// with bilinear (triangle) filtering.
///
/// Computed as `Wy · X · Wxᵀ`; resampling is linear per channel, so it
/// commutes with the normalization applied earlier.
pub fn resize(tensor: &Tensor) -> Result<Tensor> {
    let (n, c, h, w) = tensor.dims4().op("resize")?;
    let device = tensor.device();

    let rows = Tensor::from_vec(triangle_weights(h, INPUT_SIZE), (INPUT_SIZE, h), device)
        .and_then(|t| t.broadcast_as((n, c, INPUT_SIZE, h)))
        .and_then(|t| t.contiguous())
        .op("resize")?;
    let cols = Tensor::from_vec(triangle_weights(w, INPUT_SIZE), (INPUT_SIZE, w), device)
        .and_then(|t| t.t())
        .and_then(|t| t.broadcast_as((n, c, w, INPUT_SIZE)))
        .and_then(|t| t.contiguous())
        .op("resize")?;

    tensor
        .contiguous()
        .and_then(|t| rows.matmul(&t))
        .and_then(|t| t.matmul(&cols))
        .op("resize")
}

/// Runs the fixed preprocessing chain on the device the model lives on
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    device: Device,
}

impl ImagePreprocessor {
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Convert an image into the model input tensor `[1, 3, 224, 224]`
    pub fn process<I: InputImage + ?Sized>(&self, image: &I) -> Result<Tensor> {
        let dims = ImageDims::new(image.width(), image.height());
        if !dims.is_valid() {
            return Err(Error::image(format!("image must not be empty, got {}", dims)));
        }
        let (h, w) = (dims.height as usize, dims.width as usize);
        let side = dims.square_side() as usize;

        let tensor = blob_to_tensor(image.to_rgb_blob(), dims, &self.device)?;
        expect_dims(&tensor, &[h, w, CHANNELS], "from_blob")?;

        let tensor = to_channels_first(&tensor)?;
        expect_dims(&tensor, &[CHANNELS, h, w], "permute")?;

        let tensor = normalize(&scale_unit(&tensor)?)?;
        expect_dims(&tensor, &[CHANNELS, h, w], "normalize")?;

        let tensor = center_crop(&tensor, side)?;
        expect_dims(&tensor, &[CHANNELS, side, side], "center_crop")?;

        let tensor = add_batch_dim(&tensor)?;
        expect_dims(&tensor, &[1, CHANNELS, side, side], "unsqueeze")?;

        let tensor = resize(&tensor)?;
        expect_dims(&tensor, &[1, CHANNELS, INPUT_SIZE, INPUT_SIZE], "resize")?;

        debug!(input = %dims, crop = side, "Preprocessed image to {:?}", tensor.dims());
        Ok(tensor)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(Device::Cpu)
    }
}
