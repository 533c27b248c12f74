//! Channel splitter and joiner used by the worker's fan-out path.

use ndarray::{stack, Array2, ArrayView2, Axis};

use crate::error::{Result, TransformError};
use crate::image::Image;

/// Split an image into owned single-channel planes, in channel order.
pub fn split(image: &Image) -> Vec<Array2<f32>> {
    (0..image.channels())
        .map(|c| image.channel(c).to_owned())
        .collect()
}

/// Stack planes back into one image, inverse of [`split`].
///
/// Every plane must have the shape of the first one.
pub fn join(planes: Vec<Array2<f32>>) -> Result<Image> {
    let expected = match planes.first() {
        Some(first) => first.dim(),
        None => return Err(TransformError::InvalidImage("no channels to join".into())),
    };

    for (index, plane) in planes.iter().enumerate().skip(1) {
        if plane.dim() != expected {
            return Err(TransformError::ShapeMismatch {
                index,
                expected,
                found: plane.dim(),
            });
        }
    }

    let views: Vec<ArrayView2<f32>> = planes.iter().map(|p| p.view()).collect();
    let data = stack(Axis(2), &views).map_err(|e| TransformError::InvalidImage(e.to_string()))?;
    Image::new(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn gradient(height: usize, width: usize, channels: usize) -> Image {
        let data = Array3::from_shape_fn((height, width, channels), |(y, x, c)| {
            ((y * width + x) * channels + c) as f32 / (height * width * channels) as f32
        });
        Image::new(data).unwrap()
    }

    #[test]
    fn test_roundtrip_rgb() {
        let image = gradient(4, 5, 3);
        let planes = split(&image);

        assert_eq!(planes.len(), 3);
        assert_eq!(join(planes).unwrap(), image);
    }

    #[test]
    fn test_roundtrip_grayscale() {
        let image = gradient(3, 2, 1);
        let planes = split(&image);

        assert_eq!(planes.len(), 1);
        assert_eq!(join(planes).unwrap(), image);
    }

    #[test]
    fn test_split_preserves_order() {
        let mut data = Array3::<f32>::zeros((2, 2, 3));
        for c in 0..3 {
            data.index_axis_mut(Axis(2), c).fill(0.25 * (c + 1) as f32);
        }
        let planes = split(&Image::new(data).unwrap());

        assert_eq!(planes[0][[1, 1]], 0.25);
        assert_eq!(planes[1][[1, 1]], 0.5);
        assert_eq!(planes[2][[1, 1]], 0.75);
    }

    #[test]
    fn test_join_shape_mismatch() {
        let planes = vec![
            Array2::<f32>::zeros((2, 2)),
            Array2::<f32>::zeros((2, 2)),
            Array2::<f32>::zeros((3, 2)),
        ];

        match join(planes) {
            Err(TransformError::ShapeMismatch { index, expected, found }) => {
                assert_eq!(index, 2);
                assert_eq!(expected, (2, 2));
                assert_eq!(found, (3, 2));
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_join_empty() {
        assert!(join(Vec::new()).is_err());
    }
}
