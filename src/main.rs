use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::info;
use veriscope::repo::StaticRepository;
use veriscope::AppState;

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting veriscope classification engine");

    let config = veriscope::load_config();
    let port = parse_port_from_args().unwrap_or(config.server.port);

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    veriscope::metrics::describe_metrics();

    let repository = Arc::new(StaticRepository::seeded());
    let state = Arc::new(AppState::new(config, repository).await?);
    state.publish_breaker_metrics();

    let router = veriscope::http::build_router(Arc::clone(&state), prometheus);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
