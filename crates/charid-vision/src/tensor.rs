//! Tensor helpers: backend error mapping and shape validation

use candle_core::Tensor;
use charid_core::{Error, Result};

/// Attach the name of the failing operation to a candle result
pub trait TensorResultExt<T> {
    fn op(self, name: &'static str) -> Result<T>;
}

impl<T> TensorResultExt<T> for candle_core::Result<T> {
    fn op(self, name: &'static str) -> Result<T> {
        self.map_err(|e| Error::tensor(name, e))
    }
}

/// Check that a tensor has exactly the expected dimensions
pub fn expect_dims(tensor: &Tensor, expected: &[usize], stage: &str) -> Result<()> {
    let actual = tensor.dims();
    if actual != expected {
        return Err(Error::inference(format!(
            "unexpected tensor shape after {}: expected {:?}, got {:?}",
            stage, expected, actual
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_expect_dims() {
        let t = Tensor::zeros((1, 3, 4, 4), DType::F32, &Device::Cpu).unwrap();
        assert!(expect_dims(&t, &[1, 3, 4, 4], "resize").is_ok());

        let err = expect_dims(&t, &[1, 3, 224, 224], "resize").unwrap_err();
        assert!(err.to_string().contains("after resize"));
    }

    #[test]
    fn test_op_maps_backend_error() {
        let t = Tensor::zeros((2, 2), DType::F32, &Device::Cpu).unwrap();
        let err = t.narrow(0, 1, 5).op("center_crop").unwrap_err();
        assert!(matches!(err, Error::Tensor { op: "center_crop", .. }));
    }
}
