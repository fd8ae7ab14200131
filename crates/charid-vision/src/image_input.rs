//! Decoded input images

use charid_core::{Error, Result};
use image::{DynamicImage, GenericImageView, RgbImage};
use std::path::Path;

/// A decoded image the pipeline can read.
///
/// The pipeline only needs the dimensions and an RGB byte blob in
/// height-width-channel order (`width * height * 3` bytes, values 0-255).
pub trait InputImage {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Pixel bytes in HWC order with 3 channels
    fn to_rgb_blob(&self) -> Vec<u8>;
}

impl InputImage for RgbImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn to_rgb_blob(&self) -> Vec<u8> {
        self.as_raw().clone()
    }
}

impl InputImage for DynamicImage {
    fn width(&self) -> u32 {
        GenericImageView::width(self)
    }

    fn height(&self) -> u32 {
        GenericImageView::height(self)
    }

    fn to_rgb_blob(&self) -> Vec<u8> {
        // Alpha is dropped and grayscale expanded
        self.to_rgb8().into_raw()
    }
}

/// Decode an image file from disk
pub fn open_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    image::open(path)
        .map_err(|e| Error::image(format!("Failed to decode {}: {}", path.display(), e)))
}
