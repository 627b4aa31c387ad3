//! HTTP server exposing the countries snapshot and the resumable event stream.

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::{self, Next},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::get,
};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tickstream_types::Country;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    dataset::{Dataset, DatasetError},
    docs::{API_DOCS_PATH, api_document},
    engine::StreamEngine,
    types::{ServerOptions, StreamConfigError, TickEvent},
};

/// Name of the header carrying the client's last received event ID.
pub const LAST_EVENT_ID: &str = "last-event-id";

/// Error types for server startup.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Invalid stream configuration: {0}")]
    Config(#[from] StreamConfigError),

    #[error("Failed to bind {0}: {1}")]
    Bind(String, std::io::Error),

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: StreamEngine<Country>,
    pub options: ServerOptions,
    pub api_docs: Arc<Value>,
}

impl AppState {
    /// Build the state around an already loaded dataset.
    pub fn new(dataset: Dataset<Country>, options: ServerOptions) -> Result<Self, ServerError> {
        let engine = StreamEngine::new(dataset, options.stream.clone())?;
        Ok(Self::with_engine(engine, options))
    }

    /// Build the state around an engine, e.g. one driven by a custom clock.
    pub fn with_engine(engine: StreamEngine<Country>, options: ServerOptions) -> Self {
        let api_docs = Arc::new(api_document(&engine.options().tag));
        Self {
            engine,
            options,
            api_docs,
        }
    }

    /// Load the dataset named in the options and build the state.
    pub fn load(options: ServerOptions) -> Result<Self, ServerError> {
        let dataset = Dataset::load(&options.dataset)?;
        Self::new(dataset, options)
    }
}

/// Create the router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/countries", get(handle_countries))
        .route("/countries/stream", get(handle_stream))
        .route(API_DOCS_PATH, get(handle_api_docs))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(middleware::from_fn(redirect_trailing_slash))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /countries - the full dataset
async fn handle_countries(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.dataset().records().to_vec())
}

/// GET /countries/stream - one event per tick, resumable through `Last-Event-ID`
async fn handle_stream(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let last_event_id = headers
        .get(LAST_EVENT_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    let session = state.engine.session(last_event_id);
    let stream = sse_events(session.into_stream());

    match state.options.keep_alive_secs {
        0 => Sse::new(stream).into_response(),
        secs => Sse::new(stream)
            .keep_alive(
                KeepAlive::new()
                    .interval(Duration::from_secs(secs))
                    .text("keepalive"),
            )
            .into_response(),
    }
}

/// Frame engine events as server-sent events.
fn sse_events(
    events: impl Stream<Item = TickEvent<Country>> + Send,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send {
    events.map(|event| {
        to_sse_event(event).inspect_err(|e| {
            warn!(error = %e, "Failed to serialize event");
        })
    })
}

fn to_sse_event(event: TickEvent<Country>) -> Result<Event, axum::Error> {
    Ok(Event::default()
        .json_data(&event.data)?
        .id(event.id)
        .event(event.event)
        .retry(event.retry)
        .comment(event.comment))
}

/// GET /v3/api-docs
async fn handle_api_docs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.api_docs.as_ref().clone())
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Redirect paths ending with one or more slashes to the same path without them.
async fn redirect_trailing_slash(request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path.len() <= 1 || !path.ends_with('/') {
        return next.run(request).await;
    }

    let trimmed = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    let location = match request.uri().query() {
        Some(query) => format!("{}?{}", trimmed, query),
        None => trimmed.to_string(),
    };

    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

/// Serve the router on an already bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> Result<(), ServerError> {
    let router = create_router(state);
    axum::serve(listener, router)
        .await
        .map_err(ServerError::Serve)
}

/// Library entry point: load the dataset, bind and serve in one call.
///
/// The `tickstream` binary goes through [`serve`] instead so it can print its
/// banner with the bound address before accepting connections.
pub async fn start_server(options: ServerOptions) -> Result<(), ServerError> {
    let state = AppState::load(options.clone())?;

    let addr = options.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind(addr.clone(), e))?;
    info!(
        address = %addr,
        interval_ms = options.stream.interval_ms,
        tag = %options.stream.tag,
        "Starting tick stream server"
    );

    serve(listener, state).await
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::{clock::TokioClock, cursor::encode_id, types::StreamOptions};

    // 2023-11-14T22:13:20Z
    const NOW_MS: u64 = 1_700_000_000_000;

    fn create_test_state() -> AppState {
        let dataset = Dataset::from_records(vec![
            Country::new(1, "Aland"),
            Country::new(2, "Belize"),
            Country::new(3, "Chad"),
        ])
        .unwrap();
        let options = ServerOptions::default();
        let engine = StreamEngine::with_clock(
            dataset,
            StreamOptions::default(),
            Arc::new(TokioClock::starting_at(NOW_MS)),
        )
        .unwrap();
        AppState::with_engine(engine, options)
    }

    fn create_test_app() -> Router {
        create_router(create_test_state())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_countries_snapshot() {
        let response = create_test_app().oneshot(get_request("/countries")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!([
                { "id": 1, "name": "Aland" },
                { "id": 2, "name": "Belize" },
                { "id": 3, "name": "Chad" },
            ])
        );
    }

    #[tokio::test]
    async fn test_trailing_slash_redirect() {
        let app = create_test_app();

        let response = app.clone().oneshot(get_request("/countries/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "/countries");

        let response = app
            .clone()
            .oneshot(get_request("/countries/stream///?lang=en"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/countries/stream?lang=en"
        );

        let response = app.oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_and_unknown_routes() {
        let app = create_test_app();

        let response = app.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_request("/cities")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_docs() {
        let response = create_test_app().oneshot(get_request(API_DOCS_PATH)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["openapi"], "3.2.0");
        assert!(body["components"]["schemas"]["Event"].is_object());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let request = Request::builder()
            .method("GET")
            .uri("/countries")
            .header(header::ORIGIN, "https://example.com")
            .body(Body::empty())
            .unwrap();
        let response = create_test_app().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_resumes_from_last_event_id() {
        let state = create_test_state();
        let current = state.engine.current_tick();
        let last_seen = encode_id(current - 3, "country");

        let request = Request::builder()
            .method("GET")
            .uri("/countries/stream")
            .header("Last-Event-ID", &last_seen)
            .body(Body::empty())
            .unwrap();
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut body = response.into_body().into_data_stream();
        let frame = body.next().await.unwrap().unwrap();
        let frame = String::from_utf8(frame.to_vec()).unwrap();

        let tick = current - 2;
        let country = state.engine.dataset().cyclic(tick);
        let lines: Vec<&str> = frame.lines().collect();
        assert!(lines.contains(&format!("data: {}", serde_json::to_string(country).unwrap()).as_str()));
        assert!(lines.contains(&format!("id: {}", encode_id(tick, "country")).as_str()));
        assert!(lines.contains(&"event: country"));
        assert!(lines.contains(&"retry: 10000"));
        assert!(lines.contains(&format!(": {}", crate::types::format_timestamp(tick * 4_000)).as_str()));

        // Next frame continues the sequence
        let frame = body.next().await.unwrap().unwrap();
        let frame = String::from_utf8(frame.to_vec()).unwrap();
        assert!(frame.contains(&format!("id: {}", encode_id(tick + 1, "country"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_ignores_foreign_last_event_id() {
        let state = create_test_state();
        let current = state.engine.current_tick();

        let request = Request::builder()
            .method("GET")
            .uri("/countries/stream")
            .header("Last-Event-ID", encode_id(current - 3, "city"))
            .body(Body::empty())
            .unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();

        let mut body = response.into_body().into_data_stream();
        let frame = body.next().await.unwrap().unwrap();
        let frame = String::from_utf8(frame.to_vec()).unwrap();
        assert!(frame.contains(&format!("id: {}", encode_id(current, "country"))));
    }

    #[tokio::test]
    async fn test_start_server_fails_before_binding_on_bad_dataset() {
        let options = ServerOptions {
            port: 0,
            dataset: crate::dataset::DatasetSource::File("/definitely/not/here.json".into()),
            ..Default::default()
        };
        let err = start_server(options).await.unwrap_err();
        assert!(matches!(err, ServerError::Dataset(DatasetError::Read(..))));
    }
}
