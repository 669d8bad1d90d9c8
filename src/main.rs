use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lead_qualifier=info,tower_http=info")),
        )
        .init();

    lead_qualifier::app::run().await;
}
