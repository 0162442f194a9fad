use axum::{extract::State, routing::post, Json, Router};

use crate::error::{AppError, Result};
use crate::models::{IceServer, LoginRequest, LoginResponse};
use crate::redis::ActivityEntry;
use crate::security;
use crate::state::AppState;

/// Auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// POST /api/v1/auth/login - Exchange credentials for a signed token
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let username = request.username.trim().to_string();
    if username.is_empty() || request.password.is_empty() {
        return Err(AppError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    // Lockout check before credentials are even looked at.
    let failures = state.users.login_failure_count(&username).await?;
    if failures >= state.config.max_login_attempts {
        tracing::warn!(username = %username, failures, "Login locked out");
        state
            .users
            .log_activity_bg(ActivityEntry::new("login-locked-out").with_detail(&username));
        return Err(AppError::TooManyAttempts);
    }

    let account = state.users.get_user(&username).await?;
    let verified = match &account {
        Some(account) => {
            security::verify_password(&request.password, &account.salt, &account.password_hash)
        }
        None => {
            // Hash anyway so unknown usernames cost the same as wrong
            // passwords.
            let salt = security::generate_salt_hex();
            security::hash_password_sha256_hex(&request.password, &salt);
            false
        }
    };

    if !verified {
        let count = state
            .users
            .record_login_failure(&username, state.config.lockout_window_seconds)
            .await?;
        tracing::warn!(username = %username, failures = count, "Login failed");
        state
            .users
            .log_activity_bg(ActivityEntry::new("login-failed").with_detail(&username));
        // Unknown username and wrong password collapse into one response.
        return Err(AppError::AuthRequired);
    }

    // Verification only succeeds for an existing account.
    let Some(account) = account else {
        return Err(AppError::AuthRequired);
    };
    state.users.clear_login_failures(&username).await?;
    if let Err(e) = state.users.update_last_login(&username).await {
        tracing::warn!(username = %username, error = %e, "Failed to update last login");
    }

    let token = state
        .auth
        .generate_token(&account.user_id, &account.username, account.role)?;

    state.users.log_activity_bg(
        ActivityEntry::new("login").with_user(&account.user_id, &account.username),
    );

    tracing::info!(username = %account.username, user_id = %account.user_id, "Login succeeded");

    Ok(Json(LoginResponse {
        token,
        expires_in: state.config.jwt_expiry_seconds,
        ice_servers: ice_servers_for(&state, &account.user_id),
        user_id: account.user_id,
        username: account.username,
        role: account.role,
    }))
}

/// ICE server list for clients: STUN from config, TURN with ephemeral
/// credentials when a shared secret is configured. The contents are passed
/// through to the peers unexamined.
pub fn ice_servers_for(state: &AppState, user_id: &str) -> Vec<IceServer> {
    let mut ice_servers = vec![IceServer {
        urls: vec![state.config.stun_server.clone()],
        username: None,
        credential: None,
    }];

    if let Some(turn_server) = &state.config.turn_server {
        let (username, credential) = match &state.config.turn_secret {
            Some(secret) => {
                let (u, c) = security::generate_turn_credentials(
                    secret,
                    user_id,
                    state.config.turn_credential_ttl_seconds,
                );
                (Some(u), Some(c))
            }
            None => (None, None),
        };
        ice_servers.push(IceServer {
            urls: vec![turn_server.clone()],
            username,
            credential,
        });
    }

    ice_servers
}
