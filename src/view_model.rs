//! Display-ready text derived from submission state and results.

use std::fmt;

use time::OffsetDateTime;
use url::Url;

use crate::controller::SubmissionState;
use crate::http_client;
use crate::model::{AnalysisResult, ImageRef, PredictionSeries};

/// Metric text with exactly three decimals.
pub fn format_metric(value: f64) -> String {
    format!("{value:.3}")
}

/// Current time as a cache-busting token for image URLs.
pub fn cache_bust_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Resolve an image reference to something a renderer can load.
///
/// Relative URL paths are appended to `base`, keeping any path prefix the
/// service is mounted under; absolute URLs are kept. When
/// `cache_bust` is set, a `t` query parameter is appended so refreshed plots
/// are not served from cache. Inline images become `data:` URIs.
pub fn image_source(image: &ImageRef, base: &Url, cache_bust: Option<i64>) -> String {
    match image {
        ImageRef::InlineBase64 { media_type, value } => {
            format!("data:{media_type};base64,{value}")
        }
        ImageRef::Url { value } => {
            let resolved =
                Url::parse(value).or_else(|_| Url::parse(&http_client::endpoint(base, value)));
            match resolved {
                Ok(mut url) => {
                    if let Some(stamp) = cache_bust {
                        url.query_pairs_mut().append_pair("t", &stamp.to_string());
                    }
                    url.to_string()
                }
                Err(_) => value.clone(),
            }
        }
    }
}

/// One-line description of where the pipeline is.
pub fn status_text(state: &SubmissionState) -> String {
    match state {
        SubmissionState::Idle => "Select a CSV file to analyze".to_string(),
        SubmissionState::Validating => "Checking file...".to_string(),
        SubmissionState::CheckingHealth => "Contacting analysis service...".to_string(),
        SubmissionState::Uploading { progress } => format!("Analyzing... {progress}%"),
        SubmissionState::Succeeded(_) => "Analysis complete".to_string(),
        SubmissionState::Failed(err) => format!("{}: {}", err.kind.summary(), err.message),
    }
}

/// A correlation bar as displayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationRow {
    pub method: String,
    pub correlation: String,
}

/// One actual/predicted pair as displayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredictionRow {
    pub label: String,
    pub actual: String,
    pub predicted: String,
}

/// Rendered view of an [`AnalysisResult`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultView {
    pub r2: Option<String>,
    pub rmse: Option<String>,
    pub heatmap: Option<String>,
    pub prediction: Option<String>,
    pub correlations: Vec<CorrelationRow>,
    pub predictions: Vec<PredictionRow>,
}

impl ResultView {
    pub fn new(result: &AnalysisResult, base: &Url, cache_bust: Option<i64>) -> Self {
        let images = result.images.as_ref();
        let source = |image: Option<&ImageRef>| image.map(|image| image_source(image, base, cache_bust));
        Self {
            r2: result.metrics.map(|metrics| format_metric(metrics.r2)),
            rmse: result.metrics.map(|metrics| format_metric(metrics.rmse)),
            heatmap: source(images.and_then(|images| images.heatmap.as_ref())),
            prediction: source(images.and_then(|images| images.prediction.as_ref())),
            correlations: result
                .correlation_series
                .iter()
                .flatten()
                .map(|point| CorrelationRow {
                    method: point.method.clone(),
                    correlation: format_metric(point.correlation),
                })
                .collect(),
            predictions: result
                .prediction_series
                .as_ref()
                .map(prediction_rows)
                .unwrap_or_default(),
        }
    }
}

fn prediction_rows(series: &PredictionSeries) -> Vec<PredictionRow> {
    series
        .points()
        .enumerate()
        .map(|(idx, (actual, predicted))| PredictionRow {
            label: series
                .years()
                .and_then(|years| years.get(idx))
                .map(|year| format_year(*year))
                .unwrap_or_else(|| format!("#{}", idx + 1)),
            actual: format_metric(actual),
            predicted: format_metric(predicted),
        })
        .collect()
}

fn format_year(year: f64) -> String {
    if year.fract() == 0.0 {
        format!("{year:.0}")
    } else {
        year.to_string()
    }
}

impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(r2) = &self.r2 {
            writeln!(f, "R²:   {r2}")?;
        }
        if let Some(rmse) = &self.rmse {
            writeln!(f, "RMSE: {rmse}")?;
        }
        if let Some(heatmap) = &self.heatmap {
            writeln!(f, "Correlation heatmap: {}", abbreviate(heatmap))?;
        }
        if let Some(prediction) = &self.prediction {
            writeln!(f, "Prediction plot: {}", abbreviate(prediction))?;
        }
        if !self.correlations.is_empty() {
            writeln!(f, "Correlation by prevention method:")?;
            let width = self
                .correlations
                .iter()
                .map(|row| row.method.chars().count())
                .max()
                .unwrap_or(0);
            for row in &self.correlations {
                writeln!(f, "  {:<width$}  {:>7}", row.method, row.correlation)?;
            }
        }
        if !self.predictions.is_empty() {
            writeln!(f, "Actual vs predicted:")?;
            for row in &self.predictions {
                writeln!(f, "  {:>6}  {:>10}  {:>10}", row.label, row.actual, row.predicted)?;
            }
        }
        Ok(())
    }
}

// Inline images are far too long for a terminal line.
fn abbreviate(source: &str) -> String {
    const LIMIT: usize = 72;
    if source.starts_with("data:") && source.len() > LIMIT {
        let head: String = source.chars().take(LIMIT).collect();
        format!("{head}... ({} bytes)", source.len())
    } else {
        source.to_string()
    }
}
