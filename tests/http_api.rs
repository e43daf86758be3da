#![cfg(feature = "http-server")]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use clinical_data_ingest::http::{AppState, create_router};
use clinical_data_ingest::ingestion::{CommandBridge, DecoderRegistry, IngestionLimits, IngestionService};
use serde_json::{Value, json};

const BOUNDARY: &str = "X-INGEST-TEST-BOUNDARY";

fn app_with(limits: IngestionLimits) -> Router {
    let registry = DecoderRegistry::with_defaults(Arc::new(CommandBridge::rscript_at("/nonexistent/Rscript")));
    let state = AppState::new(IngestionService::new(registry, limits)).with_sensor_interval(Duration::from_millis(10));
    create_router(state)
}

fn app() -> Router {
    app_with(IngestionLimits::default())
}

fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, contents) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes()),
        }
        body.extend_from_slice(contents.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/parse")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_cors(response: &axum::response::Response) {
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn parse_csv_upload() {
    let response = app()
        .oneshot(upload_request(&[("file", Some("data.csv"), "a,b\n1,2\n3,\n")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    let body = json_body(response).await;
    assert_eq!(
        body,
        json!({
            "file": "data.csv",
            "status": "parsed",
            "columns": [{"name": "a", "type": "int64"}, {"name": "b", "type": "int64"}],
            "row_count": 2,
            "data": [{"a": 1, "b": 2}, {"a": 3, "b": null}]
        })
    );
}

#[tokio::test]
async fn first_field_with_a_filename_is_used() {
    let response = app()
        .oneshot(upload_request(&[
            ("comment", None, "not a file"),
            ("upload", Some("ae.jsonl"), "{\"term\":\"headache\"}\n"),
            ("other", Some("ignored.csv"), "x\n1\n"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["file"], "ae.jsonl");
    assert_eq!(body["data"], json!([{"term": "headache"}]));
}

#[tokio::test]
async fn unsupported_extension_is_400_naming_it() {
    let response = app()
        .oneshot(upload_request(&[("file", Some("data.xyz"), "a,b\n1,2\n")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_cors(&response);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains(".xyz"), "{detail}");
    assert!(detail.contains(".csv") && detail.contains(".sas7bdat"), "{detail}");
}

#[tokio::test]
async fn malformed_file_is_400_with_filename() {
    let response = app()
        .oneshot(upload_request(&[("file", Some("broken.json"), "[{\"a\":")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("broken.json: "), "{detail}");
}

#[tokio::test]
async fn missing_bridge_is_500_with_filename_and_kind() {
    let response = app()
        .oneshot(upload_request(&[("file", Some("dm.xpt"), "HEADER RECORD")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("dm.xpt: internal error (BridgeUnavailable)"), "{detail}");
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let app = app_with(IngestionLimits {
        max_upload_bytes: 4,
        ..IngestionLimits::default()
    });
    let response = app
        .oneshot(upload_request(&[("file", Some("big.csv"), "a,b\n1,2\n")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json_body(response).await["detail"].is_string());
}

#[tokio::test]
async fn missing_file_field_is_400() {
    let response = app()
        .oneshot(upload_request(&[("comment", None, "hello")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("no file uploaded"), "{detail}");
}

#[tokio::test]
async fn non_multipart_body_is_400_with_detail() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/parse")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["detail"].is_string());
}

#[tokio::test]
async fn welcome_health_and_current_reading() {
    let response = app()
        .oneshot(Request::builder().uri("/api").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Welcome to the Sensor Dashboard API"})
    );

    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["formats"].as_array().unwrap().len(), 9);

    let response = app()
        .oneshot(Request::builder().uri("/api/current").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(response).await;
    for key in ["timestamp", "temperature", "humidity", "pressure"] {
        assert!(body.get(key).is_some(), "missing {key}");
    }
}

#[tokio::test]
async fn sensor_stream_emits_sensor_update_events() {
    let response = app()
        .oneshot(Request::builder().uri("/api/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );

    let mut body = response.into_body();
    let mut text = String::new();
    while !text.contains("\n\n") {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("stream stalled")
            .expect("stream ended")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            text.push_str(&String::from_utf8_lossy(&data));
        }
    }
    assert!(text.starts_with("event: sensor_update\n"), "{text}");
    let data_line = text.lines().find(|l| l.starts_with("data: ")).unwrap();
    let reading: Value = serde_json::from_str(&data_line["data: ".len()..]).unwrap();
    assert!(reading["temperature"].is_number());
}

#[tokio::test]
async fn preflight_requests_are_allowed() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/parse")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
}

#[cfg(unix)]
#[tokio::test]
async fn corrupt_xpt_is_400_and_leaves_no_staged_file() {
    use clinical_data_ingest::ingestion::{FormatToken, SasFormat, StatisticalDecoder};

    let staging = tempfile::tempdir().unwrap();
    let bridge = Arc::new(CommandBridge::new(
        "sh",
        vec![
            "-c".to_string(),
            r#"echo "Failed to parse $2: Expected SAS transport header" >&2; exit 1"#.to_string(),
            "bridge".to_string(),
        ],
    ));
    let registry = DecoderRegistry::new().register(
        FormatToken::Xpt,
        Arc::new(StatisticalDecoder::new(SasFormat::Xport, bridge).with_staging_dir(staging.path())),
    );
    let app = create_router(AppState::new(IngestionService::new(registry, IngestionLimits::default())));

    let response = app
        .oneshot(upload_request(&[("file", Some("truncated.xpt"), "HEADER RECORD****")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_cors(&response);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.starts_with("truncated.xpt: "), "{detail}");
    assert!(detail.contains("Expected SAS transport header"), "{detail}");
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn panicking_decoder_is_500_with_cors_headers() {
    use async_trait::async_trait;
    use bytes::Bytes;
    use clinical_data_ingest::IngestionResult;
    use clinical_data_ingest::ingestion::{Decoder, FormatToken};
    use clinical_data_ingest::types::DecodedTable;

    struct PanickingDecoder;

    #[async_trait]
    impl Decoder for PanickingDecoder {
        async fn decode(&self, _bytes: Bytes) -> IngestionResult<DecodedTable> {
            panic!("decoder blew up")
        }
    }

    let registry = DecoderRegistry::new().register(FormatToken::Csv, Arc::new(PanickingDecoder));
    let app = create_router(AppState::new(IngestionService::new(registry, IngestionLimits::default())));

    let response = app
        .oneshot(upload_request(&[("file", Some("data.csv"), "a\n1\n")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&response);
    let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
    assert_eq!(detail, "internal error (Panic): decoder blew up");
}
