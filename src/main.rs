use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use camwatch_backend::api;
use camwatch_backend::auth::AuthService;
use camwatch_backend::config::Config;
use camwatch_backend::models::{Role, UserAccount};
use camwatch_backend::redis::{create_pool, UserRepository};
use camwatch_backend::security;
use camwatch_backend::state::AppState;
use camwatch_backend::ws::ws_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting CamWatch Backend...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        host = %config.server_host,
        port = %config.server_port,
        "Configuration loaded"
    );

    // Create Redis connection pool
    let redis_pool = create_pool(&config)?;
    let users = UserRepository::new(redis_pool, config.activity_log_max_entries);

    // Test Redis connection
    match users.health_check().await {
        Ok(true) => tracing::info!("Redis connection established"),
        Ok(false) => tracing::warn!("Redis health check returned false"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to Redis");
            // Continue anyway, might recover later
        }
    }

    // Create auth service
    let auth = AuthService::new(&config);

    // Create application state
    let state = AppState::new(config.clone(), auth, users);

    // Bootstrap the admin account if configured and absent
    if let Err(e) = ensure_admin_account(&state).await {
        tracing::warn!(error = %e, "Admin bootstrap failed");
    }

    // Build router
    let app = Router::new()
        .merge(api::create_router(state.clone()))
        .merge(ws_routes().with_state(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.server_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Create the configured admin account on first start.
async fn ensure_admin_account(state: &AppState) -> anyhow::Result<()> {
    let (Some(username), Some(password)) = (
        state.config.admin_username.clone(),
        state.config.admin_password.clone(),
    ) else {
        return Ok(());
    };

    if state.users.get_user(&username).await?.is_some() {
        return Ok(());
    }

    let salt = security::generate_salt_hex();
    let account = UserAccount {
        user_id: uuid::Uuid::new_v4().to_string(),
        username: username.clone(),
        password_hash: security::hash_password_sha256_hex(&password, &salt),
        salt,
        role: Role::Admin,
        is_active: true,
        created_at: chrono::Utc::now().timestamp(),
        last_login: None,
    };
    state.users.create_user(&account).await?;

    tracing::info!(username = %username, "Admin account created");
    Ok(())
}

/// Handle shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down...");
        },
    }
}
