use std::io::Cursor;

use ab_glyph::{FontRef, PxScale};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::classes::{CLASS_CONFIGS, class_config};
use crate::report::LabeledDetection;

static FONT_BYTES: &[u8] = include_bytes!("../assets/font.ttf");

const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_HEIGHT: i32 = 22;
// Average glyph width used to size label backgrounds (rough estimate).
const LABEL_CHAR_WIDTH: f32 = 9.0;
const TITLE: &str = "LUMBAR SPINE DAMAGE DETECTION";
const TITLE_BAR_HEIGHT: i32 = 30;
const LEGEND_ROW_HEIGHT: i32 = 24;
const LEGEND_WIDTH: i32 = 220;
const PANEL_COLOR: Rgb<u8> = Rgb([20, 20, 20]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error("Font load error: {0}")]
    Font(String),
    #[error("Image encode error: {0}")]
    Encode(#[from] image::ImageError),
}

/// Draws boxes, labels, a legend and a title bar onto a copy of the input.
/// Output dimensions always equal input dimensions.
#[derive(Clone)]
pub struct Annotator {
    font: FontRef<'static>,
}

impl Annotator {
    pub fn new() -> Result<Self, AnnotateError> {
        let font =
            FontRef::try_from_slice(FONT_BYTES).map_err(|e| AnnotateError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    pub fn annotate(&self, image: &RgbImage, detections: &[LabeledDetection]) -> RgbImage {
        let mut vis = image.clone();
        for labeled in detections {
            self.draw_detection(&mut vis, labeled);
        }
        self.draw_legend(&mut vis);
        self.draw_title_bar(&mut vis);
        vis
    }

    fn draw_detection(&self, vis: &mut RgbImage, labeled: &LabeledDetection) {
        let (w, h) = (vis.width() as i32, vis.height() as i32);
        let det = &labeled.detection;
        let cfg = class_config(det.class_id);
        let color = Rgb(cfg.color);

        let x1 = det.x1.clamp(0, w - 1);
        let y1 = det.y1.clamp(0, h - 1);
        let x2 = det.x2.clamp(0, w - 1);
        let y2 = det.y2.clamp(0, h - 1);
        if x1 >= x2 || y1 >= y2 {
            return;
        }

        // 2px border
        for t in 0..2 {
            let bx1 = x1 + t;
            let by1 = y1 + t;
            let bx2 = (x2 - t).max(bx1 + 1);
            let by2 = (y2 - t).max(by1 + 1);
            draw_hollow_rect_mut(
                vis,
                Rect::at(bx1, by1).of_size((bx2 - bx1) as u32, (by2 - by1) as u32),
                color,
            );
        }

        let label = format!("{} | {} {:.2}", labeled.disc_level, cfg.name, det.confidence);
        let text_width = (label.len() as f32 * LABEL_CHAR_WIDTH) as i32;
        let label_y = (y1 - LABEL_TEXT_HEIGHT).max(0);
        let label_width = text_width.min(w - x1);
        if label_width <= 0 {
            return;
        }
        draw_filled_rect_mut(
            vis,
            Rect::at(x1, label_y).of_size(label_width as u32, LABEL_TEXT_HEIGHT as u32),
            color,
        );
        draw_text_mut(
            vis,
            TEXT_COLOR,
            x1 + 4,
            label_y + 2,
            PxScale::from(LABEL_FONT_SIZE),
            &self.font,
            &label,
        );
    }

    fn draw_legend(&self, vis: &mut RgbImage) {
        let (w, h) = (vis.width() as i32, vis.height() as i32);
        let panel_h = CLASS_CONFIGS.len() as i32 * LEGEND_ROW_HEIGHT + 30;
        let panel_y = h - panel_h - 10;
        // Skip the legend entirely when the image cannot host it.
        if panel_y <= TITLE_BAR_HEIGHT || w < LEGEND_WIDTH + 10 {
            return;
        }

        draw_filled_rect_mut(
            vis,
            Rect::at(5, panel_y).of_size(LEGEND_WIDTH as u32, panel_h as u32),
            PANEL_COLOR,
        );
        draw_text_mut(
            vis,
            TEXT_COLOR,
            10,
            panel_y + 4,
            PxScale::from(16.0),
            &self.font,
            "LEGEND",
        );
        for (i, cfg) in CLASS_CONFIGS.iter().enumerate() {
            let y = panel_y + 26 + i as i32 * LEGEND_ROW_HEIGHT;
            draw_filled_rect_mut(vis, Rect::at(10, y).of_size(16, 16), Rgb(cfg.color));
            draw_text_mut(
                vis,
                Rgb([220, 220, 220]),
                34,
                y,
                PxScale::from(16.0),
                &self.font,
                cfg.name,
            );
        }
    }

    fn draw_title_bar(&self, vis: &mut RgbImage) {
        let (w, h) = (vis.width() as i32, vis.height() as i32);
        let bar_h = TITLE_BAR_HEIGHT.min(h);
        if bar_h <= 0 || w <= 0 {
            return;
        }
        draw_filled_rect_mut(
            vis,
            Rect::at(0, 0).of_size(w as u32, bar_h as u32),
            PANEL_COLOR,
        );
        if bar_h == TITLE_BAR_HEIGHT {
            draw_text_mut(
                vis,
                TEXT_COLOR,
                10,
                6,
                PxScale::from(20.0),
                &self.font,
                TITLE,
            );
        }
    }
}

pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, AnnotateError> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone()).write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

pub fn to_data_uri(jpeg_bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::model::Detection;

    fn labeled(level: &str, class_id: usize, x1: i32, y1: i32, x2: i32, y2: i32) -> LabeledDetection {
        LabeledDetection {
            disc_level: level.to_string(),
            detection: Detection { class_id, confidence: 0.91, x1, y1, x2, y2 },
        }
    }

    #[test]
    fn annotation_preserves_dimensions() {
        let annotator = Annotator::new().unwrap();
        let image = RgbImage::from_pixel(320, 480, Rgb([12, 12, 12]));
        let dets = vec![
            labeled("L1-L2", 2, 40, 100, 200, 160),
            labeled("L2-L3", 0, 40, 200, 200, 260),
        ];
        let vis = annotator.annotate(&image, &dets);
        assert_eq!((vis.width(), vis.height()), (320, 480));
    }

    #[test]
    fn title_bar_is_drawn_over_the_top_of_the_image() {
        let annotator = Annotator::new().unwrap();
        let image = RgbImage::from_pixel(400, 400, Rgb([90, 90, 90]));
        let vis = annotator.annotate(&image, &[]);
        assert_eq!(*vis.get_pixel(2, 2), PANEL_COLOR);
        // Below the bar the image is untouched.
        assert_eq!(*vis.get_pixel(200, 200), Rgb([90, 90, 90]));
    }

    #[test]
    fn tiny_image_and_out_of_bounds_box_do_not_panic() {
        let annotator = Annotator::new().unwrap();
        let image = RgbImage::from_pixel(16, 12, Rgb([0, 0, 0]));
        let dets = vec![labeled("L1-L2", 1, -50, -50, 500, 500)];
        let vis = annotator.annotate(&image, &dets);
        assert_eq!((vis.width(), vis.height()), (16, 12));
    }

    #[test]
    fn unknown_class_still_draws_with_fallback_color() {
        let annotator = Annotator::new().unwrap();
        let image = RgbImage::from_pixel(320, 480, Rgb([12, 12, 12]));
        let vis = annotator.annotate(&image, &[labeled("Disc-6", 9, 40, 100, 200, 160)]);
        assert_eq!((vis.width(), vis.height()), (320, 480));
    }

    #[test]
    fn data_uri_has_jpeg_prefix() {
        let image = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let jpeg = encode_jpeg(&image).unwrap();
        let uri = to_data_uri(&jpeg);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert!(uri.len() > "data:image/jpeg;base64,".len());
    }
}
