//! Skin-tone face localization.
//!
//! Pixels are mapped to log-opponent color coordinates; anything outside the
//! skin hue band is suppressed together with its neighborhood, and the
//! remaining bright area defines the crop. Two passes are run (coarse, then
//! refine) before the crop is normalized to the canonical face size.
//!
//! This is a fixed heuristic and works best under controlled lighting.

use crate::config::LocalizerConfig;
use crate::types::{unpack_rgb, FaceRegion, RawImage};

const BLACK: u32 = 0x000000;

/// Log-opponent color coordinates of one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpponentColor {
    pub intensity: f64,
    pub red_green: f64,
    pub blue_yellow: f64,
}

impl OpponentColor {
    pub fn from_rgb(rgb: u32) -> Self {
        let (r, g, b) = unpack_rgb(rgb);
        let (lr, lg, lb) = (f64::from(r).ln(), f64::from(g).ln(), f64::from(b).ln());
        Self {
            intensity: (lr + lg + lb) / 3.0,
            red_green: lr - lg,
            blue_yellow: lb - (lb + lr) / 2.0,
        }
    }

    /// Hue angle in degrees. NaN when a channel is zero.
    pub fn hue(&self) -> f64 {
        self.red_green.atan2(self.blue_yellow).to_degrees()
    }
}

/// Half-open pixel rectangle `[left, right) × [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    /// Zero-area box at the image center.
    pub fn centered(width: u32, height: u32) -> Self {
        Self {
            left: width / 2,
            top: height / 2,
            right: width / 2,
            bottom: height / 2,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.left = self.left.min(x);
        self.right = self.right.max(x + 1);
        self.top = self.top.min(y);
        self.bottom = self.bottom.max(y + 1);
    }

    fn clamp_to(self, width: u32, height: u32) -> Self {
        Self {
            left: self.left.min(width),
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Crops and normalizes raw photos down to canonical face regions.
#[derive(Debug, Clone, Default)]
pub struct FaceLocalizer {
    config: LocalizerConfig,
}

impl FaceLocalizer {
    pub fn new(config: LocalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LocalizerConfig {
        &self.config
    }

    /// Full localization: coarse pass, refine pass, then normalization.
    ///
    /// Never fails; a featureless image yields the resized original frame.
    pub fn localize(&self, image: &RawImage) -> FaceRegion {
        let coarse = self.refine_pass(image);
        let refined = self.refine_pass(&coarse);
        tracing::debug!(
            from = ?(image.width(), image.height()),
            coarse = ?(coarse.width(), coarse.height()),
            refined = ?(refined.width(), refined.height()),
            "face localized"
        );
        self.normalize(&refined)
    }

    /// Grayscale conversion and fill-resize to the canonical size, no cropping.
    pub fn normalize(&self, image: &RawImage) -> FaceRegion {
        let (out_w, out_h) = (self.config.face_width.max(1), self.config.face_height.max(1));
        let gray = image.grayscale();
        let pixels = resize_fill(
            &gray,
            image.width() as usize,
            image.height() as usize,
            out_w as usize,
            out_h as usize,
        );
        FaceRegion::from_parts(out_w, out_h, pixels)
    }

    /// One detect-then-crop pass over `image`.
    pub fn refine_pass(&self, image: &RawImage) -> RawImage {
        let processed = self.suppress_non_skin(image);
        let bounds = self.bounding_box(&processed, image.width(), image.height());
        let scale = (image.width() + image.height())
            .checked_div(self.config.scale_factor)
            .unwrap_or(0);
        tracing::trace!(?bounds, scale, "localizer pass");
        crop(image, bounds)
    }

    /// Copy of the image with every non-skin pixel's neighborhood blacked out.
    ///
    /// The scan is column-major and each skin pixel is written back when it
    /// is visited, so only neighborhoods of non-skin pixels visited later
    /// stay black. The result depends on that order.
    pub fn suppress_non_skin(&self, image: &RawImage) -> Vec<u32> {
        let (w, h) = (image.width(), image.height());
        let margin = self.config.border_margin;
        let mut processed = image.pixels().to_vec();
        if w <= 2 * margin || h <= 2 * margin {
            return processed;
        }

        for x in margin..w - margin {
            for y in margin..h - margin {
                let rgb = image.rgb_at(x, y);
                let hue = OpponentColor::from_rgb(rgb).hue();
                if self.is_skin_hue(hue) {
                    processed[(y * w + x) as usize] = rgb;
                } else {
                    for nx in x - margin..=x + margin {
                        for ny in y - margin..=y + margin {
                            processed[(ny * w + nx) as usize] = BLACK;
                        }
                    }
                }
            }
        }
        processed
    }

    /// NaN hues are never skin.
    pub fn is_skin_hue(&self, hue: f64) -> bool {
        hue >= self.config.hue_min && hue <= self.config.hue_max
    }

    /// Grow a box from the image center over every pixel above the black threshold.
    pub fn bounding_box(&self, processed: &[u32], width: u32, height: u32) -> CropBox {
        let mut bounds = CropBox::centered(width, height);
        for y in 0..height {
            for x in 0..width {
                if processed[(y * width + x) as usize] > BLACK + self.config.black_threshold {
                    bounds.include(x, y);
                }
            }
        }
        bounds
    }
}

/// Crop to `bounds` clamped to the image. A zero-area box returns the image unchanged.
pub fn crop(image: &RawImage, bounds: CropBox) -> RawImage {
    let bounds = bounds.clamp_to(image.width(), image.height());
    if bounds.is_empty() {
        return image.clone();
    }
    let mut pixels = Vec::with_capacity(bounds.width() as usize * bounds.height() as usize);
    for y in bounds.top..bounds.bottom {
        for x in bounds.left..bounds.right {
            pixels.push(image.rgb_at(x, y));
        }
    }
    RawImage::from_parts(bounds.width(), bounds.height(), pixels)
}

/// Bilinear resize scaled by the larger of the two axis ratios, drawn from
/// the top-left corner onto a black `out_w × out_h` canvas. The frame is
/// always filled; overflow on the other axis is clipped.
pub fn resize_fill(
    gray: &[u8],
    width: usize,
    height: usize,
    out_w: usize,
    out_h: usize,
) -> Vec<u8> {
    let mut out = vec![0u8; out_w * out_h];
    if width == 0 || height == 0 {
        return out;
    }

    let ratio = (out_w as f32 / width as f32).max(out_h as f32 / height as f32);
    let new_w = ((width as f32 * ratio).round() as usize).max(1);
    let new_h = ((height as f32 * ratio).round() as usize).max(1);
    let inv_x = width as f32 / new_w as f32;
    let inv_y = height as f32 / new_h as f32;

    for y in 0..out_h.min(new_h) {
        let src_y = (y as f32 + 0.5) * inv_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, height as i32 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..out_w.min(new_w) {
            let src_x = (x as f32 + 0.5) * inv_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, width as i32 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = gray[y0 * width + x0] as f32;
            let tr = gray[y0 * width + x1] as f32;
            let bl = gray[y1 * width + x0] as f32;
            let br = gray[y1 * width + x1] as f32;

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            out[y * out_w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{pack_rgb, FACE_HEIGHT, FACE_WIDTH};

    /// Hue ~136°: red well above green, blue lowest.
    const SKIN: u32 = 0xE0A070;
    /// Saturated blue, far outside the band.
    const BACKGROUND: u32 = 0x2040F0;

    fn uniform(width: u32, height: u32, rgb: u32) -> RawImage {
        RawImage::new(width, height, vec![rgb; (width * height) as usize]).unwrap()
    }

    /// Background image with a skin rectangle `[x0, x1) × [y0, y1)`.
    fn with_patch(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> RawImage {
        let pixels = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| {
                    if x >= x0 && x < x1 && y >= y0 && y < y1 {
                        SKIN
                    } else {
                        BACKGROUND
                    }
                })
            })
            .collect();
        RawImage::new(width, height, pixels).unwrap()
    }

    #[test]
    fn test_skin_color_falls_in_band() {
        let localizer = FaceLocalizer::default();
        let hue = OpponentColor::from_rgb(SKIN).hue();
        assert!(localizer.is_skin_hue(hue), "skin hue {hue}");
        let hue = OpponentColor::from_rgb(BACKGROUND).hue();
        assert!(!localizer.is_skin_hue(hue), "background hue {hue}");
    }

    #[test]
    fn test_zero_channel_is_not_skin() {
        let localizer = FaceLocalizer::default();
        let hue = OpponentColor::from_rgb(pack_rgb(200, 0, 100)).hue();
        assert!(!localizer.is_skin_hue(hue));
    }

    #[test]
    fn test_opponent_intensity_is_log_mean() {
        let c = OpponentColor::from_rgb(pack_rgb(1, 1, 1));
        assert_eq!(c.intensity, 0.0);
        assert_eq!(c.red_green, 0.0);
    }

    #[test]
    fn test_all_black_box_stays_degenerate() {
        let localizer = FaceLocalizer::default();
        let img = uniform(20, 10, 0);
        let processed = localizer.suppress_non_skin(&img);
        let bounds = localizer.bounding_box(&processed, 20, 10);
        assert_eq!(bounds, CropBox::centered(20, 10));
        assert!(bounds.is_empty());
        assert_eq!(localizer.refine_pass(&img), img);
    }

    #[test]
    fn test_featureless_image_yields_resized_frame() {
        let localizer = FaceLocalizer::default();
        let img = uniform(96, 128, pack_rgb(90, 90, 90));
        // Gray has red_green = 0 and blue_yellow = 0, so hue = 0: not skin.
        let region = localizer.localize(&img);
        assert_eq!(region.width(), FACE_WIDTH);
        assert_eq!(region.height(), FACE_HEIGHT);
        assert!(region.pixels().iter().all(|&p| p == 90));
    }

    #[test]
    fn test_crop_finds_skin_patch() {
        let localizer = FaceLocalizer::default();
        let img = with_patch(60, 60, 10, 20, 40, 50);
        let cropped = localizer.refine_pass(&img);
        // Left column survives; right, top and bottom strips are eaten.
        assert_eq!(cropped.width(), 28);
        assert_eq!(cropped.height(), 26);
        assert!(cropped.pixels().iter().all(|&p| p == SKIN));
    }

    #[test]
    fn test_skin_pixels_restored_in_scan_order() {
        let localizer = FaceLocalizer::default();
        let img = with_patch(60, 60, 10, 20, 40, 50);
        let processed = localizer.suppress_non_skin(&img);
        // Blacked by column 9, then written back when column 10 is visited.
        assert_eq!(processed[30 * 60 + 10], SKIN);
        // Blacked by column 40, which is visited after column 38.
        assert_eq!(processed[30 * 60 + 38], BLACK);
        // Rows 20 and 21 are blacked again by the row-19 pixels of later columns.
        assert_eq!(processed[21 * 60 + 20], BLACK);
        assert_eq!(
            localizer.bounding_box(&processed, 60, 60),
            CropBox {
                left: 10,
                top: 22,
                right: 38,
                bottom: 48,
            }
        );
    }

    #[test]
    fn test_second_pass_is_stable_on_uniform_skin() {
        let localizer = FaceLocalizer::default();
        let img = with_patch(60, 60, 10, 20, 40, 50);
        let once = localizer.refine_pass(&img);
        let twice = localizer.refine_pass(&once);
        // Uniform skin keeps every pixel, so the box spans the whole crop.
        assert_eq!(twice, once);
    }

    #[test]
    fn test_crop_clamps_to_image() {
        let img = uniform(4, 4, SKIN);
        let bounds = CropBox {
            left: 2,
            top: 1,
            right: 10,
            bottom: 3,
        };
        let cropped = crop(&img, bounds);
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
    }

    #[test]
    fn test_resize_fill_fills_frame() {
        // Wide 8x2 source scaled by max ratio fills a 4x4 target with no black bars.
        let gray = vec![200u8; 16];
        let out = resize_fill(&gray, 8, 2, 4, 4);
        assert!(out.iter().all(|&p| p == 200));
    }

    #[test]
    fn test_resize_fill_identity() {
        let gray: Vec<u8> = (0..12).map(|v| v * 10).collect();
        let out = resize_fill(&gray, 3, 4, 3, 4);
        assert_eq!(out, gray);
    }

    #[test]
    fn test_small_image_skips_suppression() {
        let localizer = FaceLocalizer::default();
        let img = uniform(3, 3, BACKGROUND);
        assert_eq!(localizer.suppress_non_skin(&img), img.pixels().to_vec());
    }
}
