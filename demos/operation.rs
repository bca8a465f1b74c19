use std::time::Duration;

use tracing_stackdriver_sink::init::{init_tracing, Config};
use tracing_stackdriver_sink::schema::HTTP_REQUEST_KEY;
use tracing_stackdriver_sink::{Field, HttpRequest, OperationContext, ServiceContext};

/// Logs one HTTP-style operation by hand: a first entry when the request
/// arrives, an interior entry from `tracing`, and a last entry with the
/// response status.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = Config::stackdriver()
        .with_service_context(ServiceContext::new("example-service", "v0.1.0")?)
        .build()?;
    init_tracing(&logger)?;

    let ctx = OperationContext::background().with_operation();
    let mut request = HttpRequest {
        method: "GET".into(),
        url: "example.com".into(),
        user_agent: "curl".into(),
        referrer: "test".into(),
        remote_ip: "127.0.0.1".into(),
        ..HttpRequest::default()
    };

    logger.debug(
        "http request received",
        [ctx.first("").into_field(), Field::object(HTTP_REQUEST_KEY, request.clone())],
    );

    logger.debug("something important happened", [ctx.interior("").into_field()]);
    tracing::info!(cache = "miss", "teapot warming up");

    request.status = Some(418);
    request.latency = Duration::from_secs(10);
    logger.debug(
        "http response send",
        [ctx.last("").into_field(), Field::object(HTTP_REQUEST_KEY, request)],
    );

    logger.flush().await?;
    Ok(())
}
