use ab_glyph::{FontArc, PxScale};
use common::span;
use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use inference::{Detection, LabelMap};

const FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");
const JPEG_QUALITY: u8 = 90;
const LABEL_PADDING: u32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const PALETTE: [Rgb<u8>; 10] = [
    Rgb([255, 56, 56]),
    Rgb([255, 157, 151]),
    Rgb([255, 112, 31]),
    Rgb([255, 178, 29]),
    Rgb([207, 210, 49]),
    Rgb([72, 249, 10]),
    Rgb([26, 147, 52]),
    Rgb([0, 212, 187]),
    Rgb([0, 194, 255]),
    Rgb([52, 69, 147]),
];

/// Draws detection boxes and `<class> <confidence>` labels onto a copy of an image.
pub struct Renderer {
    font: FontArc,
}

impl Renderer {
    pub fn new() -> anyhow::Result<Self> {
        let font = FontArc::try_from_slice(FONT_BYTES)
            .map_err(|e| anyhow::anyhow!("Failed to load embedded label font: {}", e))?;
        Ok(Self { font })
    }

    pub fn render(&self, image: &RgbImage, detections: &[Detection], labels: &LabelMap) -> RgbImage {
        let _s = span!("render_detections");

        let mut canvas = image.clone();
        let (width, height) = canvas.dimensions();
        let thickness = line_thickness(width, height);
        let scale = label_scale(thickness);

        for det in detections {
            let color = PALETTE[det.class_id as usize % PALETTE.len()];
            let [x1, y1, x2, y2] = det.bbox;
            let x = x1.floor() as i32;
            let y = y1.floor() as i32;
            let w = ((x2 - x1).round() as u32).max(1);
            let h = ((y2 - y1).round() as u32).max(1);

            for t in 0..thickness {
                let inset = 2 * t;
                if inset >= w || inset >= h {
                    break;
                }
                let rect = Rect::at(x + t as i32, y + t as i32).of_size(w - inset, h - inset);
                draw_hollow_rect_mut(&mut canvas, rect, color);
            }

            let text = label_text(labels, det);
            let (label_w, label_h) = self.label_size(scale, &text);
            let label_y = label_origin_y(y, label_h);

            draw_filled_rect_mut(
                &mut canvas,
                Rect::at(x, label_y).of_size(label_w, label_h),
                color,
            );
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                x + LABEL_PADDING as i32,
                label_y + LABEL_PADDING as i32,
                scale,
                &self.font,
                &text,
            );
        }

        canvas
    }

    /// Filled label background size, padding included.
    fn label_size(&self, scale: PxScale, text: &str) -> (u32, u32) {
        let (text_w, text_h) = text_size(scale, &self.font, text);
        (text_w + 2 * LABEL_PADDING, text_h + 2 * LABEL_PADDING)
    }
}

/// `<class name> <confidence>` with two decimals.
pub fn label_text(labels: &LabelMap, detection: &Detection) -> String {
    format!("{} {:.2}", labels.name(detection.class_id), detection.confidence)
}

/// Above the box when it fits, otherwise just inside the top edge.
fn label_origin_y(box_y: i32, label_h: u32) -> i32 {
    if box_y >= label_h as i32 {
        box_y - label_h as i32
    } else {
        box_y
    }
}

fn label_scale(thickness: u32) -> PxScale {
    PxScale::from((10 + 4 * thickness) as f32)
}

/// Box outline width: 0.3% of the mean side, at least one pixel.
pub fn line_thickness(width: u32, height: u32) -> u32 {
    (((width + height) as f32 / 2.0 * 0.003).round() as u32).max(1)
}

pub fn encode_jpeg(image: &RgbImage) -> anyhow::Result<Vec<u8>> {
    let _s = span!("encode_jpeg");

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(image)?;
    Ok(jpeg)
}
