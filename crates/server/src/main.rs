use clarydo_server::{AppConfig, AppState, build_router, push, storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clarydo_server=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!("data directory: {}", config.data_dir.display());

    let db = storage::init_db(&config.data_dir)?;
    tracing::info!("database initialized");

    if config.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET not set, token auth is disabled");
    }
    if config.dev_auth {
        storage::ensure_dev_user(&db)?;
        tracing::warn!("dev auth enabled, unauthenticated requests act as the dev user");
    }

    let push = push::sender_from_config(&config);
    let web_dir = config.web_dir.clone();
    let port = config.port;
    let base_url = config.base_url.clone();

    let app = build_router(AppState { db, config, push }, Some(&web_dir));

    tracing::info!("starting server at {base_url}");
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
