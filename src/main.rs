use superagent::config::EngineConfig;
use superagent::engine::Engine;
use superagent::server::routes;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Required: GATEWAY_URL, CLIENT_ID, CLIENT_SECRET, TOKEN_URL, ANTHROPIC_API_KEY");
        std::process::exit(1);
    });

    eprintln!("🤖 Superagent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Gateway: {}", config.gateway.url);
    eprintln!("   Prompts: {}", config.prompts_dir.display());

    let engine = Engine::bootstrap(&config).await.unwrap_or_else(|e| {
        eprintln!("FATAL: {e}. Check GATEWAY_URL, CLIENT_ID, CLIENT_SECRET, TOKEN_URL");
        std::process::exit(1);
    });
    eprintln!("   Tools: {} available", engine.tools().len());
    eprintln!(
        "   SMTP: {}",
        config
            .smtp
            .as_ref()
            .map(|s| s.host.as_str())
            .unwrap_or("disabled")
    );
    eprintln!("   Listening: http://0.0.0.0:{}/invocations\n", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Invocation server started");

    axum::serve(listener, routes(engine))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
