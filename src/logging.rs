use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{Instrument, Level};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_DIR: &str = "storage/logs";

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Reuses the caller's `x-request-id` when it is a sane token, otherwise
/// mints a fresh one.
fn request_id(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 64)
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Wraps each request in a span carrying its id and route, logs the
/// outcome at a level matching the status class, and echoes the id back.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = request_id(&req);
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let span = tracing::info_span!("request", %request_id, %method, %route);

    let mut response = next.run(req).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;
    let _entered = span.enter();
    match status {
        500..=599 => tracing::event!(Level::ERROR, status, latency_ms, "Server error"),
        400..=499 => tracing::event!(Level::WARN, status, latency_ms, "Client error"),
        _ => tracing::event!(Level::INFO, status, latency_ms, "Request completed"),
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }

    response
}

/// Console output plus two daily-rotated files under `LOG_DIR`
/// (default `storage/logs`): `rollcall.log` holds plain-text errors,
/// `rollcall.json` holds structured events at info and above.
pub fn init_tracing() -> std::io::Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::fmt;

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());
    std::fs::create_dir_all(&log_dir)?;

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}=info,tower_http=warn,sqlx=warn",
            env!("CARGO_CRATE_NAME")
        ))
    });

    let console = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    let errors = fmt::layer()
        .with_writer(RollingFileAppender::new(Rotation::DAILY, &log_dir, "rollcall.log"))
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(EnvFilter::new("error"));

    let structured = fmt::layer()
        .json()
        .with_writer(RollingFileAppender::new(Rotation::DAILY, &log_dir, "rollcall.json"))
        .with_current_span(true)
        .with_span_list(false)
        .with_filter(EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(console)
        .with(errors)
        .with(structured)
        .init();

    Ok(())
}
