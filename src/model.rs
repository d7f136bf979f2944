//! Data carried through a submission: the staged file and the projected result.

use std::io;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

/// A file picked by the user, before any validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk, keeping only its final path component as the name.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Path has no usable file name: {}", path.display()),
                )
            })?
            .to_string();
        let content = std::fs::read(path)?;
        Ok(Self { name, content })
    }
}

/// A validated file ready to be uploaded.
///
/// Only [`crate::intake::FileIntake`] creates these, so the name always ends in
/// `.csv`. The content is shared so an attempt worker can hold it cheaply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadCandidate {
    name: String,
    size_bytes: u64,
    content: Arc<[u8]>,
}

impl UploadCandidate {
    pub(crate) fn new(name: String, content: Vec<u8>) -> Self {
        Self {
            name,
            size_bytes: content.len() as u64,
            content: content.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Scalar fit metrics reported by the service.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub r2: f64,
    pub rmse: f64,
}

/// Reference to a rendered visualization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ImageRef {
    /// Path or absolute URL the presentation layer fetches separately.
    Url { value: String },
    /// Base64 image bytes embedded in the analyze response.
    InlineBase64 {
        #[serde(rename = "mediaType")]
        media_type: String,
        value: String,
    },
}

impl ImageRef {
    pub fn url(value: impl Into<String>) -> Self {
        Self::Url {
            value: value.into(),
        }
    }

    pub fn inline(media_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InlineBase64 {
            media_type: media_type.into(),
            value: value.into(),
        }
    }
}

/// The two visualizations the service may render.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResultImages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap: Option<ImageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<ImageRef>,
}

impl ResultImages {
    pub fn is_empty(&self) -> bool {
        self.heatmap.is_none() && self.prediction.is_none()
    }
}

/// Correlation between one categorical method and the target variable.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CorrelationPoint {
    pub method: String,
    pub correlation: f64,
}

/// Paired actual/predicted values, optionally keyed by year.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictionSeries {
    actual: Vec<f64>,
    predicted: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    years: Option<Vec<f64>>,
}

impl PredictionSeries {
    /// Build a series, rejecting arrays that do not pair up.
    pub fn try_new(actual: Vec<f64>, predicted: Vec<f64>, years: Option<Vec<f64>>) -> Option<Self> {
        if actual.len() != predicted.len() {
            return None;
        }
        if years.as_ref().is_some_and(|years| years.len() != actual.len()) {
            return None;
        }
        Some(Self {
            actual,
            predicted,
            years,
        })
    }

    pub fn actual(&self) -> &[f64] {
        &self.actual
    }

    pub fn predicted(&self) -> &[f64] {
        &self.predicted
    }

    pub fn years(&self) -> Option<&[f64]> {
        self.years.as_deref()
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }

    /// Chart-ready `(actual, predicted)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.actual.iter().copied().zip(self.predicted.iter().copied())
    }
}

/// Canonical view of a successful analysis.
///
/// At least one of the fields is populated; the projector refuses to build an
/// empty result.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ResultImages>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_series: Option<Vec<CorrelationPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_series: Option<PredictionSeries>,
}

impl AnalysisResult {
    /// Whether any recognized section is present.
    pub fn has_content(&self) -> bool {
        self.metrics.is_some()
            || self.images.is_some()
            || self.correlation_series.is_some()
            || self.prediction_series.is_some()
    }
}
