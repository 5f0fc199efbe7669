use palette::color_difference::Ciede2000;
use palette::{IntoColor, Lab, Srgb};

/// Perceptual distance between two sRGB colors.
///
/// Both colors are converted to CIE Lab and compared with the CIEDE2000
/// formula, which corrects plain Euclidean distance for hue, chroma and
/// lightness non-uniformity. Symmetric; 0 for identical colors.
pub fn color_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    let lab_a: Lab = Srgb::new(a[0], a[1], a[2]).into_format::<f32>().into_color();
    let lab_b: Lab = Srgb::new(b[0], b[1], b[2]).into_format::<f32>().into_color();
    lab_a.difference(lab_b) as f64
}
