use image::imageops;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Clockwise rotation applied to captured frames.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Default)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::None),
            90 => Ok(Rotation::Quarter),
            180 => Ok(Rotation::Half),
            270 => Ok(Rotation::ThreeQuarter),
            other => Err(format!("Rotation must be 0, 90, 180 or 270 degrees, got {other}")),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        match rotation {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }
}

/// Rotates first, then mirrors around the vertical axis.
pub fn apply_transform(image: RgbImage, rotation: Rotation, flip: bool) -> RgbImage {
    let rotated = match rotation {
        Rotation::None => image,
        Rotation::Quarter => imageops::rotate90(&image),
        Rotation::Half => imageops::rotate180(&image),
        Rotation::ThreeQuarter => imageops::rotate270(&image),
    };
    if flip {
        imageops::flip_horizontal(&rotated)
    } else {
        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn marked() -> RgbImage {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let rotated = apply_transform(marked(), Rotation::Quarter, false);
        assert_eq!(rotated.dimensions(), (2, 4));
        assert_eq!(rotated.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn flip_mirrors_after_rotation() {
        let flipped = apply_transform(marked(), Rotation::None, true);
        assert_eq!(flipped.get_pixel(3, 0), &Rgb([255, 0, 0]));
        let both = apply_transform(marked(), Rotation::Half, true);
        assert_eq!(both.get_pixel(0, 1), &Rgb([255, 0, 0]));
    }

    #[test]
    fn only_right_angles_are_accepted() {
        assert_eq!(Rotation::try_from(270), Ok(Rotation::ThreeQuarter));
        assert!(Rotation::try_from(45).is_err());
        assert_eq!(u16::from(Rotation::Half), 180);
    }
}
