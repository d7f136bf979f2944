mod support;

use std::time::{Duration, Instant};

use serde_json::json;
use statlink::config::Settings;
use statlink::view_model::ResultView;
use statlink::{ErrorKind, ImageRef, SelectedFile, SubmissionController, SubmissionState};
use support::http::{ScriptedResponse, ScriptedServer, closed_port_url};
use url::Url;

const SETTLE: Duration = Duration::from_secs(40);
const CSV: &str = "year,prevention_method,malaria_cases\n2019,Bed nets,120\n2020,Spraying,95\n";

fn controller_for(base_url: &str) -> SubmissionController {
    let settings = Settings {
        base_url: base_url.to_string(),
        ..Settings::default()
    };
    SubmissionController::from_settings(&settings).expect("controller")
}

fn healthy() -> ScriptedResponse {
    ScriptedResponse::json(200, json!({"status": "healthy"}))
}

fn select_csv(controller: &mut SubmissionController) {
    controller.select(Some(SelectedFile::new("malaria.csv", CSV)));
}

fn failure_kind(state: &SubmissionState) -> Option<ErrorKind> {
    state.error().map(|err| err.kind)
}

#[test]
fn healthy_service_receives_multipart_upload() {
    let server = ScriptedServer::start(vec![
        healthy(),
        ScriptedResponse::json(
            200,
            json!({
                "metrics": {"r2": 0.87, "rmse": 12.3},
                "visualizations": {
                    "heatmap": "/static/heatmap.png",
                    "prediction": "/static/prediction.png"
                }
            }),
        ),
    ]);
    let mut controller = controller_for(&server.base_url());

    select_csv(&mut controller);
    let state = controller.wait_until_settled(SETTLE).clone();

    let result = state.result().expect("analysis succeeded");
    let metrics = result.metrics.expect("metrics");
    assert_eq!(metrics.r2, 0.87);
    assert_eq!(metrics.rmse, 12.3);
    let images = result.images.as_ref().expect("images");
    assert_eq!(images.heatmap, Some(ImageRef::url("/static/heatmap.png")));

    assert_eq!(server.paths(), vec!["/api/healthcheck", "/api/analyze"]);
    let upload = &server.requests()[1];
    assert_eq!(upload.method, "POST");
    let content_type = upload.header("Content-Type").expect("content type");
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains("name=\"file\"; filename=\"malaria.csv\""));
    assert!(body.contains(CSV));

    let base = Url::parse(&server.base_url()).unwrap();
    let view = ResultView::new(result, &base, None);
    assert_eq!(view.r2.as_deref(), Some("0.870"));
    assert_eq!(
        view.heatmap,
        Some(format!("{}/static/heatmap.png", server.base_url()))
    );
}

#[test]
fn chart_series_response_is_projected() {
    let server = ScriptedServer::start(vec![
        healthy(),
        ScriptedResponse::json(
            200,
            json!({
                "success": true,
                "prevention_data": [
                    {"prevention_method": "Bed nets", "correlation": -0.42},
                    {"prevention_method": "Spraying", "correlation": null}
                ],
                "prediction_data": {
                    "actual": [120.0, 95.0],
                    "predicted": [118.5, 97.25],
                    "years": [2019, 2020],
                    "metrics": {"r2": 0.91, "rmse": 2.2}
                }
            }),
        ),
    ]);
    let mut controller = controller_for(&server.base_url());

    select_csv(&mut controller);
    let state = controller.wait_until_settled(SETTLE).clone();

    let result = state.result().expect("analysis succeeded");
    let correlations = result.correlation_series.as_ref().expect("correlations");
    assert_eq!(correlations.len(), 2);
    assert_eq!(correlations[1].correlation, 0.0);
    let series = result.prediction_series.as_ref().expect("prediction series");
    assert_eq!(series.predicted(), &[118.5, 97.25]);
    assert_eq!(series.years(), Some(&[2019.0, 2020.0][..]));
    assert_eq!(result.metrics.map(|m| m.r2), Some(0.91));
}

#[test]
fn unhealthy_service_gets_no_upload() {
    let server = ScriptedServer::start(vec![
        ScriptedResponse::json(200, json!({"status": "degraded"})),
        ScriptedResponse::json(200, json!({"metrics": {"r2": 1.0, "rmse": 0.0}})),
    ]);
    let mut controller = controller_for(&server.base_url());

    select_csv(&mut controller);
    let state = controller.wait_until_settled(SETTLE).clone();

    assert_eq!(failure_kind(&state), Some(ErrorKind::Unhealthy));
    assert_eq!(server.paths(), vec!["/api/healthcheck"]);
    assert!(controller.staged().is_some());
}

#[test]
fn refused_connection_is_unreachable() {
    let mut controller = controller_for(&closed_port_url());

    select_csv(&mut controller);
    let state = controller.wait_until_settled(SETTLE).clone();

    assert_eq!(failure_kind(&state), Some(ErrorKind::Unreachable));
}

#[test]
fn stalled_health_check_gives_up_after_its_deadline() {
    let server = ScriptedServer::start(vec![ScriptedResponse::stall()]);
    let mut controller = controller_for(&server.base_url());

    let started = Instant::now();
    select_csv(&mut controller);
    let state = controller.wait_until_settled(SETTLE).clone();

    assert_eq!(failure_kind(&state), Some(ErrorKind::Unreachable));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(4), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "gave up after {elapsed:?}");
    assert_eq!(server.paths(), vec!["/api/healthcheck"]);
}

#[test]
fn service_error_message_is_surfaced_verbatim() {
    let server = ScriptedServer::start(vec![
        healthy(),
        ScriptedResponse::json(400, json!({"error": "Column 'malaria_cases' is missing"})),
    ]);
    let mut controller = controller_for(&server.base_url());

    select_csv(&mut controller);
    let state = controller.wait_until_settled(SETTLE).clone();

    let err = state.error().expect("failed");
    assert_eq!(err.kind, ErrorKind::RemoteAnalysisError);
    assert_eq!(err.message, "Column 'malaria_cases' is missing");
}

#[test]
fn unrecognized_success_body_is_malformed() {
    let server = ScriptedServer::start(vec![
        healthy(),
        ScriptedResponse::json(200, json!({"unexpected": true})),
    ]);
    let mut controller = controller_for(&server.base_url());

    select_csv(&mut controller);
    let state = controller.wait_until_settled(SETTLE).clone();

    assert_eq!(failure_kind(&state), Some(ErrorKind::MalformedResponse));
}

#[test]
fn non_csv_selection_never_touches_the_network() {
    let server = ScriptedServer::start(vec![healthy()]);
    let mut controller = controller_for(&server.base_url());

    controller.select(Some(SelectedFile::new("malaria.xlsx", "binary")));

    assert_eq!(failure_kind(controller.state()), Some(ErrorKind::InvalidFileKind));
    std::thread::sleep(Duration::from_millis(100));
    assert!(server.paths().is_empty());
}

#[test]
fn failed_attempt_can_be_resubmitted() {
    let server = ScriptedServer::start(vec![
        ScriptedResponse::text(503, "maintenance"),
        healthy(),
        ScriptedResponse::json(200, json!({"metrics": {"r2": 0.5, "rmse": 1.5}})),
    ]);
    let mut controller = controller_for(&server.base_url());

    select_csv(&mut controller);
    let state = controller.wait_until_settled(SETTLE).clone();
    assert_eq!(failure_kind(&state), Some(ErrorKind::Unreachable));
    assert!(state.error().is_some_and(|err| err.kind.is_retryable()));

    assert!(controller.submit());
    let state = controller.wait_until_settled(SETTLE).clone();
    assert_eq!(state.result().and_then(|r| r.metrics).map(|m| m.rmse), Some(1.5));
    assert_eq!(
        server.paths(),
        vec!["/api/healthcheck", "/api/healthcheck", "/api/analyze"]
    );
}
