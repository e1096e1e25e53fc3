use crate::config::DEFAULT_INPUT_SIZE;
use crate::processing::post::TransformParams;
use common::span;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::RgbImage;
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;

pub struct PreProcessor {
    pub input_size: u32,
    rgb_buffer: Vec<u8>,
    letterboxed_buffer: Vec<u8>,
}

impl PreProcessor {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size,
            rgb_buffer: Vec::new(),
            letterboxed_buffer: vec![LETTERBOX_COLOR; (input_size * input_size * 3) as usize],
        }
    }

    /// Letterbox `image` onto a square `input_size` canvas and convert it to a
    /// `[1, 3, S, S]` tensor scaled to `[0, 1]`.
    pub fn preprocess(
        &mut self,
        image: &RgbImage,
    ) -> anyhow::Result<(Array<f32, IxDyn>, TransformParams)> {
        let _s = span!("preprocess_image");

        if self.input_size == 0 {
            anyhow::bail!("Model input size must be greater than 0");
        }

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        tracing::trace!(width, height, "Preprocessing image dimensions");

        self.rgb_buffer.clear();
        self.rgb_buffer.extend_from_slice(image.as_raw());

        let (scale, offset_x, offset_y, letterboxed) = self.resize_and_letterbox(width, height)?;

        let input = Self::normalize(&letterboxed)?;

        let transform = TransformParams {
            orig_width: width,
            orig_height: height,
            scale,
            offset_x,
            offset_y,
        };

        Ok((input, transform))
    }

    fn resize_and_letterbox(
        &mut self,
        width: u32,
        height: u32,
    ) -> anyhow::Result<(f32, f32, f32, Image<'_>)> {
        let _s = span!("resize_and_letterbox");

        let size = self.input_size;
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

        let offset_x = (size - new_width) / 2;
        let offset_y = (size - new_height) / 2;

        let src = Image::from_slice_u8(width, height, &mut self.rgb_buffer, PixelType::U8x3)?;

        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = size * 3;
        let row_bytes = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            self.letterboxed_buffer[dst_row..dst_row + row_bytes]
                .copy_from_slice(&resized_data[src_row..src_row + row_bytes]);
        }

        let final_img =
            Image::from_slice_u8(size, size, &mut self.letterboxed_buffer, PixelType::U8x3)?;

        Ok((scale, offset_x as f32, offset_y as f32, final_img))
    }

    fn normalize(image: &Image) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let width = image.width() as usize;
        let height = image.height() as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];
        let buf = image.buffer();

        for (i, px) in buf.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(
            IxDyn(&[1, 3, height, width]),
            output,
        )?)
    }
}

impl Default for PreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_output_shape_is_square_input() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));

        let mut preprocessor = PreProcessor::default();
        let (output, _) = preprocessor.preprocess(&img).unwrap();

        assert_eq!(output.shape(), &[1, 3, 640, 640]);
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = RgbImage::new(0, 0);
        let mut preprocessor = PreProcessor::default();
        let err = preprocessor.preprocess(&img).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_zero_input_size_is_an_error() {
        let img = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let mut preprocessor = PreProcessor::new(0);
        let err = preprocessor.preprocess(&img).unwrap_err();
        assert!(err.to_string().contains("input size"));
    }

    /// Test letterboxing preserves aspect ratio
    #[test]
    fn test_letterboxing_preserves_aspect_ratio() {
        // 800x600 image (4:3 aspect ratio)
        let img = RgbImage::from_pixel(800, 600, Rgb([128, 128, 128]));

        let mut preprocessor = PreProcessor::new(640);
        let (output, transform) = preprocessor.preprocess(&img).unwrap();

        // Scale = min(640/800, 640/600) = 0.8
        assert!((transform.scale - 0.8).abs() < 1e-6);

        // Resized: 640x480, offset Y = (640 - 480) / 2 = 80
        assert_eq!(transform.offset_x, 0.0, "X offset should be 0 for wide image");
        assert_eq!(transform.offset_y, 80.0, "Y offset should center vertically");
        assert_eq!(transform.orig_width, 800);
        assert_eq!(transform.orig_height, 600);

        assert_eq!(output.shape(), &[1, 3, 640, 640]);
    }

    #[test]
    fn test_padding_and_content_values() {
        let img = RgbImage::from_pixel(800, 600, Rgb([255, 0, 0]));

        let mut preprocessor = PreProcessor::new(640);
        let (output, _) = preprocessor.preprocess(&img).unwrap();

        // Padding band (top rows) uses the letterbox grey
        let pad = LETTERBOX_COLOR as f32 / 255.0;
        assert!((output[[0, 0, 10, 320]] - pad).abs() < 1e-6);
        assert!((output[[0, 2, 10, 320]] - pad).abs() < 1e-6);

        // Image content in the middle keeps its colour, scaled to [0, 1]
        assert!((output[[0, 0, 320, 320]] - 1.0).abs() < 0.01);
        assert!(output[[0, 1, 320, 320]].abs() < 0.01);
        assert!(output[[0, 2, 320, 320]].abs() < 0.01);
    }

    #[test]
    fn test_small_image_is_upscaled() {
        let img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));

        let mut preprocessor = PreProcessor::new(640);
        let (_, transform) = preprocessor.preprocess(&img).unwrap();

        assert!((transform.scale - 64.0).abs() < 1e-6);
        assert_eq!(transform.offset_x, 0.0);
        assert_eq!(transform.offset_y, 0.0);
    }

    #[test]
    fn test_extreme_aspect_ratio_keeps_one_pixel() {
        let img = RgbImage::from_pixel(1, 2000, Rgb([10, 20, 30]));

        let mut preprocessor = PreProcessor::new(640);
        let (output, transform) = preprocessor.preprocess(&img).unwrap();

        assert_eq!(output.shape(), &[1, 3, 640, 640]);
        assert!(transform.offset_x <= 320.0);
    }
}
