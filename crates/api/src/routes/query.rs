use std::fs;

use axum::{extract::State, routing::post, Json, Router};
use base64::{prelude::BASE64_STANDARD, Engine};
use querygraph_core::{script_for, OutputFormat, RenderError, Renderer};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Query validation and rendering routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/query/validate", post(validate))
        .route("/v1/query/render", post(render))
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    query: String,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RenderRequest {
    query: String,
    #[serde(default)]
    format: Option<String>,
}

/// `script` is kept on render failures so callers can render it themselves.
#[derive(Debug, Default, Serialize)]
struct RenderResponse {
    format: String,
    query: Option<String>,
    script: Option<String>,
    image: Option<String>,
    error: Option<String>,
}

fn check_size(state: &AppState, query: &str) -> ApiResult<()> {
    let max = state.config().max_query_bytes;
    if query.len() > max {
        return Err(ApiError::BadRequest(format!(
            "query is {} bytes, limit is {max}",
            query.len()
        )));
    }
    Ok(())
}

async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<Json<ValidateResponse>> {
    check_size(&state, &request.query)?;
    let error = querygraph_lang::parse(&request.query)
        .err()
        .map(|err| err.to_string());
    Ok(Json(ValidateResponse {
        ok: error.is_none(),
        error,
    }))
}

async fn render(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> ApiResult<Json<RenderResponse>> {
    check_size(&state, &request.query)?;

    let format = match request.format.as_deref().map(str::trim) {
        None | Some("") => OutputFormat::Svg,
        Some(name) => OutputFormat::from_extension(name.trim_start_matches('.'))
            .ok_or_else(|| ApiError::BadRequest(format!("unsupported output format: {name}")))?,
    };
    let mut response = RenderResponse {
        format: format.to_string(),
        ..Default::default()
    };

    let query = match querygraph_lang::parse(&request.query) {
        Ok(query) => query,
        Err(err) => {
            response.error = Some(err.to_string());
            return Ok(Json(response));
        }
    };
    let script = script_for(&query);
    response.query = Some(query.to_string());

    if format == OutputFormat::D2 {
        response.script = Some(script);
        return Ok(Json(response));
    }

    let renderer = state.renderer().clone();
    let job = script.clone();
    let rendered = tokio::task::spawn_blocking(move || render_image(&renderer, &job, format))
        .await
        .map_err(|e| ApiError::Internal(format!("render task failed: {e}")))?;

    response.script = Some(script);
    match rendered {
        Ok(image) => response.image = Some(image),
        Err(err) => {
            tracing::warn!(error = %err, "render failed");
            response.error = Some(err.to_string());
        }
    }
    Ok(Json(response))
}

/// Render into a scratch directory and return the image as text (SVG) or
/// base64 (PNG, PDF).
fn render_image(renderer: &Renderer, script: &str, format: OutputFormat) -> Result<String, RenderError> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join(format!("diagram.{format}"));
    let written = renderer.render(script, &output)?;
    let bytes = fs::read(written)?;
    if format.is_text() {
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(BASE64_STANDARD.encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::routes::build_router;
    use crate::state::AppState;

    fn app(d2_bin: &str) -> axum::Router {
        build_router(AppState::new(AppConfig {
            d2_bin: d2_bin.to_string(),
            max_query_bytes: 256,
            ..AppConfig::default()
        }))
    }

    fn default_app() -> axum::Router {
        build_router(AppState::new(AppConfig::default()))
    }

    async fn call(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn ping_and_health() {
        let (status, body) = call(app("d2"), "GET", "/v1/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));

        let (status, body) = call(app("d2"), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["renderer"], "d2");
    }

    #[tokio::test]
    async fn validate_accepts_and_rejects() {
        let (status, body) = call(
            app("d2"),
            "POST",
            "/v1/query/validate",
            Some(json!({ "query": "md5 | ._val" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true, "error": null }));

        let (status, body) = call(
            app("d2"),
            "POST",
            "/v1/query/validate",
            Some(json!({ "query": ".a | (" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn oversized_query_is_bad_request() {
        let query = ".a | ".repeat(100) + ".";
        let (status, body) = call(
            app("d2"),
            "POST",
            "/v1/query/validate",
            Some(json!({ "query": &query })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "badRequest");
        assert_eq!(body["error"]["statusCode"], 400);
    }

    #[tokio::test]
    async fn deeply_nested_query_is_a_parse_error() {
        let depth = 10_000;
        let query = format!("{}.{}", "[".repeat(depth), "]".repeat(depth));

        let (status, body) = call(
            default_app(),
            "POST",
            "/v1/query/validate",
            Some(json!({ "query": &query })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("nests deeper"));

        let (status, body) = call(
            default_app(),
            "POST",
            "/v1/query/render",
            Some(json!({ "query": &query, "format": "d2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["script"].is_null());
        assert!(body["error"].as_str().unwrap().contains("nests deeper"));
    }

    #[tokio::test]
    async fn render_d2_returns_script_only() {
        let (status, body) = call(
            app("querygraph-no-such-renderer"),
            "POST",
            "/v1/query/render",
            Some(json!({ "query": "md5|._val", "format": "d2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["format"], "d2");
        assert_eq!(body["query"], "md5 | ._val");
        assert!(body["script"].as_str().unwrap().contains("start: Start {shape: circle}"));
        assert!(body["image"].is_null());
        assert!(body["error"].is_null());
    }

    #[tokio::test]
    async fn render_without_renderer_reports_error_and_script() {
        let (status, body) = call(
            app("querygraph-no-such-renderer"),
            "POST",
            "/v1/query/render",
            Some(json!({ "query": "." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["format"], "svg");
        assert!(body["image"].is_null());
        assert!(body["script"].is_string());
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn render_png_is_base64() {
        // `cp` copies the script to the output path in place of a renderer.
        let (status, body) = call(
            app("cp"),
            "POST",
            "/v1/query/render",
            Some(json!({ "query": ".", "format": "png" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].is_null());
        let image = body["image"].as_str().unwrap();
        assert!(image.chars().all(|c| c.is_ascii_alphanumeric() || "+/=".contains(c)));
        assert!(!image.is_empty());
    }

    #[tokio::test]
    async fn render_parse_error_is_reported() {
        let (status, body) = call(
            app("d2"),
            "POST",
            "/v1/query/render",
            Some(json!({ "query": "def f: .;", "format": "d2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].is_string());
        assert!(body["script"].is_null());
    }

    #[tokio::test]
    async fn unsupported_format_is_bad_request() {
        let (status, body) = call(
            app("d2"),
            "POST",
            "/v1/query/render",
            Some(json!({ "query": ".", "format": "gif" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("unsupported output format"));
    }
}
