//! Adapter around the pretrained image classifier.
//!
//! The model is opaque to the rest of the service: handlers only see the
//! [`ImageClassifier`] trait and the `(label, score)` pairs it returns.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use serde::Deserialize;
use thiserror::Error;
use tract_onnx::prelude::*;

use crate::models::ClassificationResult;

const MODEL_FILE: &str = "model.onnx";
const LABELS_FILE: &str = "config.json";
const PREPROCESSOR_FILE: &str = "preprocessor_config.json";

// ImageNet statistics, used when the model ships no preprocessor config.
const DEFAULT_SIZE: u32 = 224;
const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub trait ImageClassifier: Send + Sync {
    /// Scores an RGB image against every class the model knows.
    fn classify(&self, image: &RgbImage) -> Result<Vec<ClassificationResult>, ClassifierError>;

    fn device(&self) -> &str;
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("model file not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("failed to load model: {0:#}")]
    Load(#[source] anyhow::Error),

    #[error("inference failed: {0:#}")]
    Inference(#[source] anyhow::Error),

    #[error("model returned no scores")]
    EmptyOutput,

    #[error("inference task was canceled")]
    Canceled,
}

/// How an RGB image is turned into the model's NCHW input tensor.
///
/// `width` and `height` are the final input size. With `shortest_edge` set,
/// the image is first scaled so its short side matches it (keeping aspect
/// ratio) and then center-cropped to the input size.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessing {
    pub width: u32,
    pub height: u32,
    pub shortest_edge: Option<u32>,
    pub rescale_factor: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub filter: FilterType,
}

impl Default for Preprocessing {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            shortest_edge: None,
            rescale_factor: 1.0 / 255.0,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
            filter: FilterType::Triangle,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SizeConfig {
    Square(u32),
    HeightWidth { height: u32, width: u32 },
    ShortestEdge { shortest_edge: u32 },
}

#[derive(Debug, Default, Deserialize)]
struct PreprocessorConfig {
    do_normalize: Option<bool>,
    image_mean: Option<[f32; 3]>,
    image_std: Option<[f32; 3]>,
    rescale_factor: Option<f32>,
    resample: Option<u32>,
    size: Option<SizeConfig>,
    crop_size: Option<SizeConfig>,
}

impl Preprocessing {
    /// Reads `preprocessor_config.json` from the model directory, falling back
    /// to defaults for the file or any missing key.
    pub fn from_dir(dir: &Path) -> Result<Self, ClassifierError> {
        let path = dir.join(PREPROCESSOR_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))
            .map_err(ClassifierError::Load)?;
        Self::from_json(&raw)
            .with_context(|| format!("parsing {}", path.display()))
            .map_err(ClassifierError::Load)
    }

    fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: PreprocessorConfig = serde_json::from_str(raw)?;
        let defaults = Self::default();

        let (width, height, shortest_edge) = match config.size {
            Some(SizeConfig::Square(edge)) => (edge, edge, None),
            Some(SizeConfig::HeightWidth { height, width }) => (width, height, None),
            Some(SizeConfig::ShortestEdge { shortest_edge }) => {
                let (width, height) = match config.crop_size {
                    Some(SizeConfig::Square(edge)) => (edge, edge),
                    Some(SizeConfig::HeightWidth { height, width }) => (width, height),
                    Some(SizeConfig::ShortestEdge { .. }) | None => (shortest_edge, shortest_edge),
                };
                (width, height, Some(shortest_edge))
            }
            None => (defaults.width, defaults.height, None),
        };
        anyhow::ensure!(width > 0 && height > 0, "input size must be non-zero");
        anyhow::ensure!(shortest_edge != Some(0), "shortest_edge must be non-zero");

        let (mean, std) = if config.do_normalize.unwrap_or(true) {
            (
                config.image_mean.unwrap_or(defaults.mean),
                config.image_std.unwrap_or(defaults.std),
            )
        } else {
            ([0.0; 3], [1.0; 3])
        };
        anyhow::ensure!(std.iter().all(|s| *s != 0.0), "image_std must be non-zero");

        Ok(Self {
            width,
            height,
            shortest_edge,
            rescale_factor: config.rescale_factor.unwrap_or(defaults.rescale_factor),
            mean,
            std,
            filter: resample_filter(config.resample),
        })
    }

    pub fn to_tensor(&self, image: &RgbImage) -> Array4<f32> {
        let resized = match self.shortest_edge {
            Some(edge) => self.resize_and_crop(image, edge),
            None => imageops::resize(image, self.width, self.height, self.filter),
        };

        Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, c, y, x)| {
                let value = resized.get_pixel(x as u32, y as u32)[c] as f32 * self.rescale_factor;
                (value - self.mean[c]) / self.std[c]
            },
        )
    }

    fn resize_and_crop(&self, image: &RgbImage, edge: u32) -> RgbImage {
        let (width, height) = image.dimensions();
        let (scaled_width, scaled_height) = if width <= height {
            (edge, scale_long_side(height, width, edge))
        } else {
            (scale_long_side(width, height, edge), edge)
        };
        let scaled = imageops::resize(image, scaled_width, scaled_height, self.filter);

        let crop_width = self.width.min(scaled_width);
        let crop_height = self.height.min(scaled_height);
        let cropped = imageops::crop_imm(
            &scaled,
            (scaled_width - crop_width) / 2,
            (scaled_height - crop_height) / 2,
            crop_width,
            crop_height,
        )
        .to_image();

        // crop_size wider or taller than the scaled image
        if (crop_width, crop_height) == (self.width, self.height) {
            cropped
        } else {
            imageops::resize(&cropped, self.width, self.height, self.filter)
        }
    }
}

fn scale_long_side(long: u32, short: u32, edge: u32) -> u32 {
    ((u64::from(long) * u64::from(edge)) / u64::from(short.max(1))).max(1) as u32
}

// PIL resampling codes as stored in preprocessor configs.
fn resample_filter(code: Option<u32>) -> FilterType {
    match code {
        Some(0) => FilterType::Nearest,
        Some(1) => FilterType::Lanczos3,
        Some(3) => FilterType::CatmullRom,
        _ => FilterType::Triangle,
    }
}

#[derive(Debug, Deserialize)]
struct LabelConfig {
    #[serde(default)]
    id2label: BTreeMap<String, String>,
}

/// Class names ordered by output index, from the model's `config.json`.
fn read_labels(dir: &Path) -> Result<Vec<String>, ClassifierError> {
    let path = dir.join(LABELS_FILE);
    if !path.is_file() {
        return Ok(Vec::new());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))
        .map_err(ClassifierError::Load)?;
    parse_labels(&raw)
        .with_context(|| format!("parsing {}", path.display()))
        .map_err(ClassifierError::Load)
}

fn parse_labels(raw: &str) -> anyhow::Result<Vec<String>> {
    let config: LabelConfig = serde_json::from_str(raw)?;

    let mut indexed = config
        .id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|index| (index, label))
                .with_context(|| format!("invalid class id '{id}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    indexed.sort_by_key(|(index, _)| *index);

    let mut labels = Vec::with_capacity(indexed.len());
    for (index, label) in indexed {
        while labels.len() < index {
            labels.push(default_label(labels.len()));
        }
        labels.push(label);
    }
    Ok(labels)
}

fn default_label(index: usize) -> String {
    format!("LABEL_{index}")
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

/// ONNX image classifier run on CPU through tract.
pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
    labels: Vec<String>,
    preprocessing: Preprocessing,
}

impl OnnxClassifier {
    /// Loads `<model_dir>/<model_name>/model.onnx` along with its optional
    /// label and preprocessor configs.
    pub fn load(model_dir: &Path, model_name: &str) -> Result<Self, ClassifierError> {
        let root = model_path(model_dir, model_name);
        let model_file = root.join(MODEL_FILE);
        if !model_file.is_file() {
            return Err(ClassifierError::ModelNotFound(model_file));
        }

        let preprocessing = Preprocessing::from_dir(&root)?;
        let labels = read_labels(&root)?;

        let input_shape = [
            1,
            3,
            preprocessing.height as usize,
            preprocessing.width as usize,
        ];
        let plan = tract_onnx::onnx()
            .model_for_path(&model_file)
            .and_then(|model| model.with_input_fact(0, f32::fact(input_shape).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(ClassifierError::Load)?;

        tracing::debug!(
            labels = ?labels,
            width = preprocessing.width,
            height = preprocessing.height,
            "model graph ready"
        );

        Ok(Self {
            plan,
            labels,
            preprocessing,
        })
    }

    fn label_for(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| default_label(index))
    }
}

impl ImageClassifier for OnnxClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<ClassificationResult>, ClassifierError> {
        let input: Tensor = self.preprocessing.to_tensor(image).into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(ClassifierError::Inference)?;
        let logits: Vec<f32> = outputs
            .first()
            .ok_or(ClassifierError::EmptyOutput)?
            .to_array_view::<f32>()
            .map_err(ClassifierError::Inference)?
            .iter()
            .copied()
            .collect();
        if logits.is_empty() {
            return Err(ClassifierError::EmptyOutput);
        }

        Ok(softmax(&logits)
            .into_iter()
            .enumerate()
            .map(|(index, score)| ClassificationResult::new(self.label_for(index), score))
            .collect())
    }

    fn device(&self) -> &str {
        "cpu"
    }
}

pub fn model_path(model_dir: &Path, model_name: &str) -> PathBuf {
    model_dir.join(model_name)
}
