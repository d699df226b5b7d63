use crate::utils::config::Config;
use crate::utils::logging::*;
use ab_glyph::{FontVec, PxScale};
use common::mpn::detection::{BoundingBox, Detection};
use common::mpn::measurement::Measurement;
use common::mpn::pattern_resolver::PositiveLabel;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tokio::fs;

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStyle {
    pub border_width: u32,
    pub font_size: f32,
    pub positive_color: Rgb<u8>,
    pub negative_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
}

impl AnnotationStyle {
    pub fn new(config: &Config) -> Self {
        Self {
            border_width: config.border_width,
            font_size: config.font_size,
            positive_color: Rgb(config.positive_color),
            negative_color: Rgb(config.negative_color),
            text_color: Rgb(config.text_color),
        }
    }
}

pub struct Annotator {
    style: AnnotationStyle,
    font: Option<FontVec>,
    positive_label: PositiveLabel,
}

impl Annotator {
    pub fn new(style: AnnotationStyle, font: Option<FontVec>, positive_label: PositiveLabel) -> Self {
        Self {
            style,
            font,
            positive_label,
        }
    }

    pub async fn from_config(config: &Config) -> Self {
        let font = match fs::read(&config.font_path).await {
            Ok(font_data) => match FontVec::try_from_vec(font_data) {
                Ok(font) => Some(font),
                Err(err) => {
                    logging_warning!(SystemEntry::FontUnavailable(err.to_string()));
                    None
                }
            },
            Err(err) => {
                logging_warning!(SystemEntry::FontUnavailable(format!("{}: {err}", config.font_path)));
                None
            }
        };
        Self::new(AnnotationStyle::new(config), font, PositiveLabel::new(config.positive_label.clone()))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn draw(&self, image: &mut RgbImage, measurement: &Measurement) {
        for detection in &measurement.detections {
            self.draw_detection(image, detection);
        }
        if let Some(font) = &self.font {
            let banner = format!("Total Tubes: {}", measurement.total_tubes);
            let scale = PxScale::from(self.style.font_size * 1.5);
            draw_text_mut(image, self.style.text_color, 10, 10, scale, font, &banner);
        }
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
        let color = if self.positive_label.matches(detection) {
            self.style.positive_color
        } else {
            self.style.negative_color
        };
        let Some(base_rectangle) = clip_to_image(&detection.bbox, image.width(), image.height()) else {
            return;
        };
        for i in 0..self.style.border_width {
            let inset = i32::try_from(i).unwrap_or(i32::MAX);
            let grown = i.saturating_mul(2);
            let offset_rect = Rect::at(base_rectangle.left().saturating_sub(inset), base_rectangle.top().saturating_sub(inset))
                .of_size(base_rectangle.width().saturating_add(grown), base_rectangle.height().saturating_add(grown));
            draw_hollow_rect_mut(image, offset_rect, color);
        }
        if let Some(font) = &self.font {
            let text = format!("{label}: {confidence:.2}", label = detection.label, confidence = detection.confidence);
            let position_x = base_rectangle.left();
            let border = i32::try_from(self.style.border_width).unwrap_or(i32::MAX);
            let position_y = base_rectangle.top().saturating_sub(border).saturating_sub(self.style.font_size as i32).max(0);
            draw_text_mut(image, color, position_x, position_y, PxScale::from(self.style.font_size), font, &text);
        }
    }
}

/// Pixel rectangle of the part of `bbox` inside a `width` x `height` image.
/// Boxes with no visible part, or with non-finite coordinates, yield `None`.
fn clip_to_image(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    if !(bbox.x.is_finite() && bbox.y.is_finite()) || bbox.width.is_nan() || bbox.height.is_nan() || width == 0 || height == 0 {
        return None;
    }
    let (max_x, max_y) = (width as f32, height as f32);
    if bbox.x >= max_x || bbox.y >= max_y {
        return None;
    }
    let right = (bbox.x + bbox.width.max(0.0)).min(max_x);
    let bottom = (bbox.y + bbox.height.max(0.0)).min(max_y);
    if right < 0.0 || bottom < 0.0 {
        return None;
    }
    let left = bbox.x.max(0.0);
    let top = bbox.y.max(0.0);
    let rect_width = ((right - left) as u32).max(1);
    let rect_height = ((bottom - top) as u32).max(1);
    Some(Rect::at(left as i32, top as i32).of_size(rect_width, rect_height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use common::mpn::measurement::MeasurementAssembler;
    use common::mpn::pattern_resolver::PatternResolver;
    use common::mpn::reference_table::ReferenceTable;

    fn annotator() -> Annotator {
        let style = AnnotationStyle {
            border_width: 2,
            font_size: 12.0,
            positive_color: Rgb([255, 0, 0]),
            negative_color: Rgb([0, 255, 0]),
            text_color: Rgb([255, 255, 255]),
        };
        Annotator::new(style, None, PositiveLabel::default())
    }

    fn measurement(detections: Vec<Detection>) -> Measurement {
        let assembler = MeasurementAssembler::new(PatternResolver::new(ReferenceTable::instance(), PositiveLabel::default()));
        assembler.assemble(detections, Local::now()).unwrap()
    }

    #[test]
    fn outlines_use_the_call_colour() {
        let mut image = RgbImage::new(100, 60);
        let detections = vec![
            Detection::new("Positive", 0.9, BoundingBox::new(10.0, 10.0, 20.0, 30.0)),
            Detection::new("Negative", 0.8, BoundingBox::new(50.0, 10.0, 20.0, 30.0)),
        ];
        annotator().draw(&mut image, &measurement(detections));
        assert_eq!(image.get_pixel(10, 10), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(9, 9), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(50, 20), &Rgb([0, 255, 0]));
        assert_eq!(image.get_pixel(20, 20), &Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_outside_the_frame_are_clipped() {
        let mut image = RgbImage::new(20, 20);
        let detections = vec![Detection::new("Positive", 0.9, BoundingBox::new(15.0, -5.0, 40.0, 0.0))];
        annotator().draw(&mut image, &measurement(detections));
        assert_eq!(image.dimensions(), (20, 20));
    }

    #[test]
    fn extreme_boxes_are_clamped_or_skipped() {
        let mut image = RgbImage::new(40, 30);
        let detections = vec![
            Detection::new("Positive", 0.9, BoundingBox::new(-1e30, -1e30, f32::MAX, f32::MAX)),
            Detection::new("Negative", 0.8, BoundingBox::new(1e30, 5.0, 10.0, 10.0)),
            Detection::new("Negative", 0.7, BoundingBox::new(5.0, 5.0, f32::INFINITY, -20.0)),
        ];
        let mut annotator = annotator();
        annotator.style.border_width = 3;
        annotator.draw(&mut image, &measurement(detections));
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(image.get_pixel(39, 29), &Rgb([255, 0, 0]));
    }

    #[test]
    fn clipping_keeps_the_visible_part() {
        let rect = clip_to_image(&BoundingBox::new(-10.0, 5.0, 30.0, 1e20), 40, 30).unwrap();
        assert_eq!((rect.left(), rect.top(), rect.width(), rect.height()), (0, 5, 20, 25));
        assert!(clip_to_image(&BoundingBox::new(-50.0, 0.0, 10.0, 10.0), 40, 30).is_none());
        assert!(clip_to_image(&BoundingBox::new(0.0, 30.0, 10.0, 10.0), 40, 30).is_none());
        assert!(clip_to_image(&BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0), 40, 30).is_none());
    }

    #[tokio::test]
    async fn missing_font_disables_captions() {
        let mut config = crate::utils::config::tests::sample();
        config.font_path = "./no-such-font.ttf".to_string();
        let annotator = Annotator::from_config(&config).await;
        assert!(!annotator.has_font());
    }
}
