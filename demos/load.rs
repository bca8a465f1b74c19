use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing_stackdriver_sink::init::Config;
use tracing_stackdriver_sink::noop_sink::NoopSink;
use tracing_stackdriver_sink::schema::HTTP_REQUEST_KEY;
use tracing_stackdriver_sink::{Field, HttpRequest, OperationContext, ServiceContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        stacktrace_level: None,
        channel_buffer: 1 << 16,
        batch_size: 1024,
        ..Config::stackdriver()
    }
    .with_service_context(ServiceContext::new("example-service", "v0.1.0")?);
    let logger = config.build_with_sink(Arc::new(NoopSink))?;

    let request = HttpRequest {
        method: "GET".into(),
        url: "example.com".into(),
        user_agent: "curl".into(),
        referrer: "test".into(),
        status: Some(418),
        remote_ip: "127.0.0.1".into(),
        latency: Duration::from_secs(10),
    };
    let ctx = OperationContext::background().with_operation();

    let n: u64 = 100_000;
    let start = Instant::now();

    for _ in 0..n {
        logger.debug(
            "debug message",
            [
                ctx.first("").into_field(),
                Field::object(HTTP_REQUEST_KEY, request.clone()),
            ],
        );
    }

    let elapsed = start.elapsed();
    println!(
        "stackdriver encoder: {} entries in {:?} (~{:.0} entries/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.flush().await?;
    let dropped = logger.pipeline().dropped_events.load(std::sync::atomic::Ordering::Relaxed);
    println!("dropped: {}", dropped);
    Ok(())
}
