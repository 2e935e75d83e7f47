use cifixer_infra::CiFixerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cifixer_observability::init();

    let config = CiFixerConfig::from_env();
    if config.agent.is_none() {
        tracing::warn!("AGENT_PROGRAM not set; using offline rule-based analysis");
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let app = cifixer_api::app::build_app(config).await;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
