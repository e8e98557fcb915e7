//! Image preprocessing for the InsightFace model family

use std::io::Cursor;

use anyhow::Result;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;

/// Input size of the recognition model
pub const RECOGNIZER_INPUT_SIZE: u32 = 112;

/// Input size of the gender/age model
pub const GENDER_AGE_INPUT_SIZE: u32 = 96;

/// Reference landmark positions of a 112x112 aligned face
const ARCFACE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Pixel normalization applied when building an input tensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelNorm {
    /// `(x - 127.5) / 128`
    Centered,
    /// Raw `0..=255` values
    Raw,
}

impl PixelNorm {
    fn apply(self, value: u8) -> f32 {
        match self {
            PixelNorm::Centered => (value as f32 - 127.5) / 128.0,
            PixelNorm::Raw => value as f32,
        }
    }
}

/// Decode image bytes, applying any EXIF orientation
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(data)?;
    Ok(apply_exif_orientation(data, image))
}

fn apply_exif_orientation(data: &[u8], image: DynamicImage) -> DynamicImage {
    let orientation = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .unwrap_or(1);

    // https://exiftool.org/TagNames/EXIF.html (Orientation)
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Convert an RGB image to a `1x3xHxW` tensor
pub fn to_nchw(image: &RgbImage, norm: PixelNorm) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = norm.apply(pixel[c]);
        }
    }
    tensor
}

/// Scale applied when fitting an image into the detector canvas.
///
/// The resized image sits in the top-left corner of the canvas, so mapping
/// back to the original only divides by the scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub original_width: u32,
    pub original_height: u32,
}

impl Letterbox {
    pub fn new(original: (u32, u32), target: (u32, u32)) -> Self {
        let (orig_w, orig_h) = original;
        let (target_w, target_h) = target;
        let scale = f32::min(
            target_w as f32 / orig_w.max(1) as f32,
            target_h as f32 / orig_h.max(1) as f32,
        );
        Self {
            scale,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Resize `image` into a zero-padded canvas of `target` size
    pub fn apply(&self, image: &DynamicImage, target: (u32, u32)) -> RgbImage {
        let new_w = ((self.original_width as f32 * self.scale) as u32).clamp(1, target.0);
        let new_h = ((self.original_height as f32 * self.scale) as u32).clamp(1, target.1);
        let resized = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();

        let mut canvas = ImageBuffer::from_pixel(target.0, target.1, Rgb([0u8, 0, 0]));
        image::imageops::replace(&mut canvas, &resized, 0, 0);
        canvas
    }

    /// Map a canvas point back to original image coordinates
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        (x / self.scale, y / self.scale)
    }
}

/// Square crop around a face box, enlarged by `expand`, resized to `size`
pub fn crop_face(
    image: &DynamicImage,
    corners: (f32, f32, f32, f32),
    expand: f32,
    size: u32,
) -> RgbImage {
    let (img_w, img_h) = image.dimensions();
    let (x1, y1, x2, y2) = corners;

    let cx = (x1 + x2) / 2.0;
    let cy = (y1 + y2) / 2.0;
    let half = (x2 - x1).max(y2 - y1).max(1.0) * expand / 2.0;

    let left = ((cx - half).max(0.0) as u32).min(img_w.saturating_sub(1));
    let top = ((cy - half).max(0.0) as u32).min(img_h.saturating_sub(1));
    let right = ((cx + half).min(img_w as f32) as u32).max(left + 1).min(img_w);
    let bottom = ((cy + half).min(img_h as f32) as u32).max(top + 1).min(img_h);

    image
        .crop_imm(left, top, right.saturating_sub(left).max(1), bottom.saturating_sub(top).max(1))
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8()
}

/// 2x3 similarity transform `dst = s * R * src + t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    pub matrix: [[f32; 3]; 2],
}

impl SimilarityTransform {
    /// Least-squares fit (Umeyama) mapping `src` onto `dst`
    pub fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Self {
        let n = src.len() as f32;
        let centroid = |pts: &[(f32, f32); 5]| {
            let (sx, sy) = pts.iter().fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
            (sx / n, sy / n)
        };
        let (scx, scy) = centroid(src);
        let (dcx, dcy) = centroid(dst);

        // Covariance of centered dst against centered src
        let mut var_src = 0.0f32;
        let (mut a, mut b, mut c, mut d) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
            let (sx, sy) = (sx - scx, sy - scy);
            let (dx, dy) = (dx - dcx, dy - dcy);
            var_src += sx * sx + sy * sy;
            a += dx * sx;
            b += dx * sy;
            c += dy * sx;
            d += dy * sy;
        }
        var_src /= n;
        let (a, b, c, d) = (a / n, b / n, c / n, d / n);

        // Closed-form 2x2 SVD
        let e = (a + d) / 2.0;
        let f = (a - d) / 2.0;
        let g = (c + b) / 2.0;
        let h = (c - b) / 2.0;
        let q = (e * e + h * h).sqrt();
        let r = (f * f + g * g).sqrt();
        let (s1, s2) = (q + r, (q - r).abs());
        let a1 = h.atan2(e);
        let a2 = g.atan2(f);
        let theta = (a2 - a1) / 2.0;
        let phi = (a2 + a1) / 2.0;

        let reflect = a * d - b * c < 0.0;
        let (r00, r01, r10, r11, trace) = if reflect {
            let angle = phi + theta;
            (angle.cos(), angle.sin(), angle.sin(), -angle.cos(), s1 - s2)
        } else {
            let angle = phi - theta;
            (angle.cos(), -angle.sin(), angle.sin(), angle.cos(), s1 + s2)
        };

        let scale = if var_src > 1e-10 { trace / var_src } else { 1.0 };
        let tx = dcx - scale * (r00 * scx + r01 * scy);
        let ty = dcy - scale * (r10 * scx + r11 * scy);

        Self {
            matrix: [
                [scale * r00, scale * r01, tx],
                [scale * r10, scale * r11, ty],
            ],
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.matrix;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    /// Backward-map `image` through the transform with bilinear sampling
    pub fn warp(&self, image: &RgbImage, out_width: u32, out_height: u32) -> RgbImage {
        let m = &self.matrix;
        let mut output = ImageBuffer::from_pixel(out_width, out_height, Rgb([0u8, 0, 0]));

        let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
        if det.abs() < f32::EPSILON || image.width() < 2 || image.height() < 2 {
            return output;
        }
        let inv = [
            [m[1][1] / det, -m[0][1] / det],
            [-m[1][0] / det, m[0][0] / det],
        ];
        let max_x = (image.width() - 1) as f32;
        let max_y = (image.height() - 1) as f32;

        for (x, y, out) in output.enumerate_pixels_mut() {
            let dx = x as f32 - m[0][2];
            let dy = y as f32 - m[1][2];
            let src_x = inv[0][0] * dx + inv[0][1] * dy;
            let src_y = inv[1][0] * dx + inv[1][1] * dy;

            if !(0.0..max_x).contains(&src_x) || !(0.0..max_y).contains(&src_y) {
                continue;
            }

            let (x0, y0) = (src_x as u32, src_y as u32);
            let (fx, fy) = (src_x - x0 as f32, src_y - y0 as f32);
            let p00 = image.get_pixel(x0, y0);
            let p10 = image.get_pixel(x0 + 1, y0);
            let p01 = image.get_pixel(x0, y0 + 1);
            let p11 = image.get_pixel(x0 + 1, y0 + 1);

            for ch in 0..3 {
                let v = p00[ch] as f32 * (1.0 - fx) * (1.0 - fy)
                    + p10[ch] as f32 * fx * (1.0 - fy)
                    + p01[ch] as f32 * (1.0 - fx) * fy
                    + p11[ch] as f32 * fx * fy;
                out[ch] = v.clamp(0.0, 255.0) as u8;
            }
        }
        output
    }
}

/// Align a face on its five landmarks into the 112x112 recognizer frame
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    SimilarityTransform::estimate(landmarks, &ARCFACE_LANDMARKS).warp(
        image,
        RECOGNIZER_INPUT_SIZE,
        RECOGNIZER_INPUT_SIZE,
    )
}
