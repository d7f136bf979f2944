//! Mapping of analyze response bodies onto [`AnalysisResult`].
//!
//! The service has answered with several unversioned shapes over time, so
//! each section is detected by field presence:
//!
//! - `metrics` + `images` / `correlationSeries` / `predictionSeries`
//! - `metrics` + `visualizations { heatmap, prediction }`
//! - flat `heatmap` + `prediction_plot`
//! - `prevention_data` + `prediction_data { actual, predicted, years, metrics }`
//!
//! Fields of an unexpected type are ignored. Numbers are kept at full
//! precision; rounding is left to the view layer.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::SubmissionError;
use crate::model::{AnalysisResult, CorrelationPoint, ImageRef, Metrics, PredictionSeries, ResultImages};

const DEFAULT_IMAGE_TYPE: &str = "image/png";

/// Project a decoded analyze body into the canonical result.
///
/// Fails with `MalformedResponse` when no recognized section is present or
/// when paired prediction arrays do not line up.
pub fn project(body: &Value) -> Result<AnalysisResult, SubmissionError> {
    let Some(root) = body.as_object() else {
        return Err(SubmissionError::malformed("Response body is not a JSON object"));
    };
    let prediction_source = field(root, &["predictionSeries", "prediction_data"]);
    let result = AnalysisResult {
        metrics: project_metrics(root, prediction_source),
        images: project_images(root),
        correlation_series: field(root, &["correlationSeries", "prevention_data"])
            .and_then(project_correlations),
        prediction_series: prediction_source.map(project_predictions).transpose()?.flatten(),
    };
    if !result.has_content() {
        return Err(SubmissionError::malformed(
            "Response contains no recognized analysis fields",
        ));
    }
    Ok(result)
}

fn field<'a>(root: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| root.get(*name))
        .find(|value| !value.is_null())
}

fn project_metrics(root: &Map<String, Value>, prediction: Option<&Value>) -> Option<Metrics> {
    root.get("metrics")
        .and_then(parse_metrics)
        .or_else(|| prediction.and_then(|value| value.get("metrics")).and_then(parse_metrics))
}

fn parse_metrics(value: &Value) -> Option<Metrics> {
    let r2 = value.get("r2").and_then(Value::as_f64);
    let rmse = value.get("rmse").and_then(Value::as_f64);
    match (r2, rmse) {
        (Some(r2), Some(rmse)) => Some(Metrics { r2, rmse }),
        _ => {
            debug!("Ignoring metrics without numeric r2/rmse: {value}");
            None
        }
    }
}

fn project_images(root: &Map<String, Value>) -> Option<ResultImages> {
    let sources: Vec<&Map<String, Value>> = ["images", "visualizations"]
        .iter()
        .filter_map(|name| root.get(*name).and_then(Value::as_object))
        .chain(std::iter::once(root))
        .collect();
    let images = ResultImages {
        heatmap: pick_image(&sources, &["heatmap"]),
        prediction: pick_image(&sources, &["prediction", "prediction_plot"]),
    };
    (!images.is_empty()).then_some(images)
}

fn pick_image(sources: &[&Map<String, Value>], names: &[&str]) -> Option<ImageRef> {
    sources
        .iter()
        .flat_map(|source| names.iter().filter_map(move |name| source.get(*name)))
        .find_map(parse_image_ref)
}

fn parse_image_ref(value: &Value) -> Option<ImageRef> {
    match value {
        Value::String(text) => classify_image_text(text),
        Value::Object(tagged) => {
            let text = tagged.get("value").and_then(Value::as_str)?;
            match tagged.get("kind").and_then(Value::as_str) {
                Some("url") => non_empty(text).map(ImageRef::url),
                Some("inlineBase64") => {
                    if text.trim_start().starts_with("data:") {
                        return classify_image_text(text);
                    }
                    let media_type = tagged
                        .get("mediaType")
                        .and_then(Value::as_str)
                        .unwrap_or(DEFAULT_IMAGE_TYPE);
                    non_empty(text).map(|data| ImageRef::inline(media_type, strip_whitespace(data)))
                }
                _ => classify_image_text(text),
            }
        }
        _ => None,
    }
}

/// Decide whether a bare string is a URL, a data URI or raw base64 bytes.
fn classify_image_text(text: &str) -> Option<ImageRef> {
    let text = non_empty(text)?;
    if let Some(rest) = text.strip_prefix("data:") {
        if let Some((header, payload)) = rest.split_once(',')
            && let Some(media_type) = header.strip_suffix(";base64")
        {
            let media_type = if media_type.is_empty() {
                DEFAULT_IMAGE_TYPE
            } else {
                media_type
            };
            return Some(ImageRef::inline(media_type, strip_whitespace(payload)));
        }
        return Some(ImageRef::url(text));
    }
    // Base64 never contains '.', so dotted text is a file path or URL.
    if text.contains("://") || text.contains('.') {
        return Some(ImageRef::url(text));
    }
    let compact = strip_whitespace(text);
    let decoded = STANDARD.decode(&compact).ok().filter(|bytes| !bytes.is_empty());
    let Some(bytes) = decoded else {
        return Some(ImageRef::url(text));
    };
    match sniff_media_type(&bytes) {
        Some(media_type) => Some(ImageRef::inline(media_type, compact)),
        None if !text.starts_with('/') => Some(ImageRef::inline(DEFAULT_IMAGE_TYPE, compact)),
        None => Some(ImageRef::url(text)),
    }
}

fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.starts_with(b"<svg") || bytes.starts_with(b"<?xml") {
        Some("image/svg+xml")
    } else {
        None
    }
}

fn project_correlations(value: &Value) -> Option<Vec<CorrelationPoint>> {
    let Some(items) = value.as_array() else {
        debug!("Ignoring correlation series that is not an array");
        return None;
    };
    let points = items
        .iter()
        .filter_map(|item| {
            let method = item
                .get("method")
                .or_else(|| item.get("prevention_method"))
                .and_then(Value::as_str)?;
            // The service reports undefined correlations as null.
            let correlation = match item.get("correlation") {
                Some(Value::Null) => 0.0,
                Some(number) => number.as_f64()?,
                None => return None,
            };
            Some(CorrelationPoint {
                method: method.to_string(),
                correlation,
            })
        })
        .collect::<Vec<_>>();
    if points.len() < items.len() {
        warn!(
            "Skipped {} malformed correlation entries",
            items.len() - points.len()
        );
    }
    (!points.is_empty()).then_some(points)
}

fn project_predictions(value: &Value) -> Result<Option<PredictionSeries>, SubmissionError> {
    let actual = value.get("actual").and_then(number_array);
    let predicted = value.get("predicted").and_then(number_array);
    let (Some(actual), Some(predicted)) = (actual, predicted) else {
        debug!("Ignoring prediction series without numeric actual/predicted arrays");
        return Ok(None);
    };
    if actual.is_empty() && predicted.is_empty() {
        debug!("Ignoring empty prediction series");
        return Ok(None);
    }
    let years = value.get("years").and_then(number_array);
    let (actual_len, predicted_len) = (actual.len(), predicted.len());
    PredictionSeries::try_new(actual, predicted, years)
        .map(Some)
        .ok_or_else(|| {
            warn!("Prediction arrays do not pair up: {actual_len} actual vs {predicted_len} predicted");
            SubmissionError::malformed(format!(
                "Prediction series is unpaired ({actual_len} actual, {predicted_len} predicted)"
            ))
        })
}

fn number_array(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|ch| !ch.is_ascii_whitespace()).collect()
}
