//! Decoded grayscale image and display-size geometry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("image is empty")]
    Empty,
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("invalid frame buffer: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// A decoded grayscale image, the unit the detector and recognizer consume.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, FrameError> {
        let expected = (width as usize) * (height as usize);
        if expected == 0 {
            return Err(FrameError::Empty);
        }
        if data.len() != expected {
            return Err(FrameError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    /// Decode an encoded image (JPEG, PNG, ...) into grayscale.
    ///
    /// The container format is sniffed from the content, not from a file name.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.is_empty() {
            return Err(FrameError::Empty);
        }
        let gray = image::load_from_memory(bytes)?.to_luma8();
        let (width, height) = gray.dimensions();
        Self::new(gray.into_raw(), width, height)
    }

    /// Display size of this frame inside a `max_width` x `max_height` box.
    pub fn fit_within(&self, max_width: u32, max_height: u32) -> DisplaySize {
        fit_within(self.width, self.height, max_width, max_height)
    }

    /// Resize with bilinear interpolation to `new_width` x `new_height`.
    pub fn resize_bilinear(&self, new_width: usize, new_height: usize) -> Vec<u8> {
        let width = self.width as usize;
        let height = self.height as usize;
        let mut resized = vec![0u8; new_width * new_height];
        if new_width == 0 || new_height == 0 {
            return resized;
        }

        let inv_scale_x = width as f32 / new_width as f32;
        let inv_scale_y = height as f32 / new_height as f32;

        for y in 0..new_height {
            let src_y = (y as f32 + 0.5) * inv_scale_y - 0.5;
            let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
            let y1 = (y0 + 1).min(height - 1);
            let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

            for x in 0..new_width {
                let src_x = (x as f32 + 0.5) * inv_scale_x - 0.5;
                let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
                let x1 = (x0 + 1).min(width - 1);
                let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                let tl = self.data[y0 * width + x0] as f32;
                let tr = self.data[y0 * width + x1] as f32;
                let bl = self.data[y1 * width + x0] as f32;
                let br = self.data[y1 * width + x1] as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                resized[y * new_width + x] = val.round().clamp(0.0, 255.0) as u8;
            }
        }

        resized
    }
}

/// Size at which a submitted image is previewed, and the factor mapping
/// image coordinates onto it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

/// Scale `src` to fit a `max_width` x `max_height` box, preserving aspect ratio.
///
/// Small images are scaled up as well, so the longer relative side always
/// touches the box.
pub fn fit_within(src_width: u32, src_height: u32, max_width: u32, max_height: u32) -> DisplaySize {
    if src_width == 0 || src_height == 0 {
        return DisplaySize {
            width: 0.0,
            height: 0.0,
            scale: 0.0,
        };
    }
    let ratio = (max_width as f32 / src_width as f32).min(max_height as f32 / src_height as f32);
    DisplaySize {
        width: src_width as f32 * ratio,
        height: src_height as f32 * ratio,
        scale: ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Cursor;

    fn encode_png(img: &GrayImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_fit_within_landscape() {
        let size = fit_within(600, 400, 300, 300);
        assert_eq!(size.width, 300.0);
        assert_eq!(size.height, 200.0);
        assert_eq!(size.scale, 0.5);
    }

    #[test]
    fn test_fit_within_portrait() {
        let size = fit_within(400, 800, 300, 300);
        assert_eq!(size.width, 150.0);
        assert_eq!(size.height, 300.0);
    }

    #[test]
    fn test_fit_within_scales_up_small_images() {
        let size = fit_within(100, 50, 300, 300);
        assert_eq!(size.width, 300.0);
        assert_eq!(size.height, 150.0);
        assert_eq!(size.scale, 3.0);
    }

    #[test]
    fn test_fit_within_zero_dimension() {
        let size = fit_within(0, 50, 300, 300);
        assert_eq!(size.scale, 0.0);
    }

    #[test]
    fn test_decode_png_to_grayscale() {
        let img = GrayImage::from_pixel(4, 3, Luma([77]));
        let frame = Frame::decode(&encode_png(&img)).unwrap();
        assert_eq!((frame.width, frame.height), (4, 3));
        assert!(frame.data.iter().all(|&p| p == 77));
    }

    #[test]
    fn test_decode_rejects_empty_and_garbage() {
        assert!(matches!(Frame::decode(&[]), Err(FrameError::Empty)));
        assert!(matches!(
            Frame::decode(b"definitely not an image"),
            Err(FrameError::Decode(_))
        ));
    }

    #[test]
    fn test_new_checks_buffer_length() {
        let err = Frame::new(vec![0; 5], 2, 2).unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidLength {
                expected: 4,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_bilinear_resize_uniform() {
        let frame = Frame::new(vec![128u8; 100 * 100], 100, 100).unwrap();
        let resized = frame.resize_bilinear(200, 150);
        assert_eq!(resized.len(), 200 * 150);
        assert!(resized.iter().all(|&p| p == 128), "uniform resize should stay uniform");
    }
}
