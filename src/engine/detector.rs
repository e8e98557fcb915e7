//! SCRFD face detector
//!
//! Decodes the multi-stride SCRFD heads shipped with InsightFace model packs
//! into face boxes with 5-point landmarks.

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use openvino::InferRequest;
use tracing::{debug, warn};

use super::pool::{ModelPool, ModelType};
use super::preprocess::{to_nchw, Letterbox, PixelNorm};
use super::tensor;

/// Face box in original image coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    pub fn corners(&self) -> (f32, f32, f32, f32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union
    pub fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Head layout, derived from the number of model outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeadLayout {
    strides: &'static [u32],
    with_landmarks: bool,
    anchors_per_cell: usize,
}

impl HeadLayout {
    fn from_output_count(count: usize) -> Self {
        const THREE: &[u32] = &[8, 16, 32];
        const FIVE: &[u32] = &[8, 16, 32, 64, 128];
        match count {
            6 => Self { strides: THREE, with_landmarks: false, anchors_per_cell: 2 },
            9 => Self { strides: THREE, with_landmarks: true, anchors_per_cell: 2 },
            10 => Self { strides: FIVE, with_landmarks: false, anchors_per_cell: 1 },
            15 => Self { strides: FIVE, with_landmarks: true, anchors_per_cell: 1 },
            _ => {
                warn!("Unknown SCRFD output count: {}, assuming 3 strides with landmarks", count);
                Self { strides: THREE, with_landmarks: true, anchors_per_cell: 2 }
            }
        }
    }
}

/// Raw head outputs for one stride
struct StrideOutput<'a> {
    stride: u32,
    scores: &'a [f32],
    boxes: &'a [f32],
    landmarks: Option<&'a [f32]>,
}

/// SCRFD face detector
pub struct FaceDetector<'a> {
    pool: &'a ModelPool,
    input_size: (u32, u32),
    score_threshold: f32,
    nms_threshold: f32,
}

impl<'a> FaceDetector<'a> {
    pub fn new(pool: &'a ModelPool, input_size: (u32, u32)) -> Self {
        Self {
            pool,
            input_size,
            score_threshold: 0.5,
            nms_threshold: 0.4,
        }
    }

    /// Detect faces in a decoded image
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let letterbox = Letterbox::new(image.dimensions(), self.input_size);
        let canvas = letterbox.apply(image, self.input_size);
        let input = to_nchw(&canvas, PixelNorm::Centered);

        let model = self
            .pool
            .get_model(ModelType::Detector)
            .context("detector model not loaded")?;
        let request = tensor::infer(model, &input)?;

        let candidates = self.decode(&request, &letterbox)?;
        debug!("{} face candidates before NMS", candidates.len());

        let faces = nms(candidates, self.nms_threshold);
        debug!("Detected {} faces", faces.len());
        Ok(faces)
    }

    fn decode(&self, request: &InferRequest, letterbox: &Letterbox) -> Result<Vec<FaceBox>> {
        let layout = HeadLayout::from_output_count(tensor::output_count(request));
        let heads = layout.strides.len();

        let mut outputs = Vec::with_capacity(heads * 3);
        for i in 0..heads * if layout.with_landmarks { 3 } else { 2 } {
            outputs.push(tensor::read_f32(&request.get_output_tensor_by_index(i)?)?);
        }

        let mut faces = Vec::new();
        for (idx, &stride) in layout.strides.iter().enumerate() {
            let head = StrideOutput {
                stride,
                scores: &outputs[idx],
                boxes: &outputs[idx + heads],
                landmarks: layout.with_landmarks.then(|| outputs[idx + heads * 2].as_slice()),
            };
            self.decode_stride(&head, layout.anchors_per_cell, letterbox, &mut faces);
        }
        Ok(faces)
    }

    fn decode_stride(
        &self,
        head: &StrideOutput<'_>,
        anchors_per_cell: usize,
        letterbox: &Letterbox,
        faces: &mut Vec<FaceBox>,
    ) {
        let stride = head.stride as f32;
        let feat_w = self.input_size.0 / head.stride;
        let feat_h = self.input_size.1 / head.stride;
        let max_w = letterbox.original_width as f32;
        let max_h = letterbox.original_height as f32;

        let anchors = (0..feat_h)
            .flat_map(|y| (0..feat_w).map(move |x| (x as f32 * stride, y as f32 * stride)))
            .flat_map(|center| std::iter::repeat(center).take(anchors_per_cell));

        for (i, (cx, cy)) in anchors.enumerate() {
            let Some(&score) = head.scores.get(i) else {
                break;
            };
            if score < self.score_threshold {
                continue;
            }
            let Some(dist) = head.boxes.get(i * 4..i * 4 + 4) else {
                continue;
            };

            // Distances to the left, top, right and bottom edges
            let (x1, y1) = letterbox.to_original(cx - dist[0] * stride, cy - dist[1] * stride);
            let (x2, y2) = letterbox.to_original(cx + dist[2] * stride, cy + dist[3] * stride);

            let landmarks = head
                .landmarks
                .and_then(|kps| kps.get(i * 10..i * 10 + 10))
                .map(|kps| {
                    std::array::from_fn(|j| {
                        letterbox.to_original(cx + kps[j * 2] * stride, cy + kps[j * 2 + 1] * stride)
                    })
                });

            faces.push(FaceBox {
                x1: x1.clamp(0.0, max_w),
                y1: y1.clamp(0.0, max_h),
                x2: x2.clamp(0.0, max_w),
                y2: y2.clamp(0.0, max_h),
                score,
                landmarks,
            });
        }
    }
}

/// Greedy non-maximum suppression, highest score first
pub fn nms(mut boxes: Vec<FaceBox>, threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<FaceBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if keep.iter().all(|kept| kept.iou(&candidate) <= threshold) {
            keep.push(candidate);
        }
    }
    keep
}
