use deadpool_redis::Pool;
use redis::AsyncCommands;
use serde::Serialize;

use crate::error::Result;
use crate::models::UserAccount;

/// Repository for the excluded persistence collaborator: user accounts,
/// login-attempt counters and the activity log. Room and camera presence is
/// deliberately NOT stored here; it is in-memory and resets on restart.
#[derive(Clone)]
pub struct UserRepository {
    pool: Pool,
    activity_log_max_entries: u64,
}

/// One activity log line, appended fire-and-forget.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActivityEntry {
    pub fn new(action: &str) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            user_id: None,
            username: None,
            room_id: None,
            action: action.to_string(),
            detail: None,
        }
    }

    pub fn with_user(mut self, user_id: &str, username: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self.username = Some(username.to_string());
        self
    }

    pub fn with_room(mut self, room_id: &str) -> Self {
        self.room_id = Some(room_id.to_string());
        self
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}

impl UserRepository {
    pub fn new(pool: Pool, activity_log_max_entries: u64) -> Self {
        Self {
            pool,
            activity_log_max_entries,
        }
    }

    // ==================== User Operations ====================

    /// Look up an account by username; inactive accounts are invisible.
    pub async fn get_user(&self, username: &str) -> Result<Option<UserAccount>> {
        let mut conn = self.pool.get().await?;
        let key = format!("user:{}", username);

        let json: Option<String> = conn.get(&key).await?;

        match json {
            Some(data) => {
                let account: UserAccount = serde_json::from_str(&data)
                    .map_err(|e| crate::error::AppError::InternalError(e.to_string()))?;
                if account.is_active {
                    Ok(Some(account))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    pub async fn create_user(&self, account: &UserAccount) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let key = format!("user:{}", account.username);
        let json = serde_json::to_string(account)
            .map_err(|e| crate::error::AppError::InternalError(e.to_string()))?;

        conn.set::<_, _, ()>(&key, &json).await?;
        conn.sadd::<_, _, ()>("users", &account.username).await?;

        tracing::info!(username = %account.username, role = %account.role.as_str(), "User created");
        Ok(())
    }

    pub async fn update_last_login(&self, username: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let key = format!("user:{}", username);

        let json: Option<String> = conn.get(&key).await?;
        if let Some(data) = json {
            if let Ok(mut account) = serde_json::from_str::<UserAccount>(&data) {
                account.last_login = Some(chrono::Utc::now().timestamp());
                if let Ok(updated) = serde_json::to_string(&account) {
                    conn.set::<_, _, ()>(&key, &updated).await?;
                }
            }
        }
        Ok(())
    }

    // ==================== Login Throttling ====================

    /// Record a failed login and return the failure count inside the
    /// current lockout window.
    pub async fn record_login_failure(
        &self,
        username: &str,
        window_seconds: u64,
    ) -> Result<u32> {
        let mut conn = self.pool.get().await?;
        let key = format!("login_failures:{}", username);

        let count: u32 = redis::cmd("INCR").arg(&key).query_async(&mut *conn).await?;
        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(window_seconds as i64)
            .query_async::<()>(&mut *conn)
            .await?;

        Ok(count)
    }

    pub async fn login_failure_count(&self, username: &str) -> Result<u32> {
        let mut conn = self.pool.get().await?;
        let key = format!("login_failures:{}", username);

        let count: Option<u32> = conn.get(&key).await?;
        Ok(count.unwrap_or(0))
    }

    /// Clear the failure counter after a successful login.
    pub async fn clear_login_failures(&self, username: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let key = format!("login_failures:{}", username);

        conn.del::<_, ()>(&key).await?;
        Ok(())
    }

    // ==================== Activity Log ====================

    /// Append an activity line to the capped log list.
    pub async fn log_activity(&self, entry: &ActivityEntry) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let json = serde_json::to_string(entry)
            .map_err(|e| crate::error::AppError::InternalError(e.to_string()))?;

        conn.lpush::<_, _, ()>("activity_log", &json).await?;
        conn.ltrim::<_, ()>("activity_log", 0, self.activity_log_max_entries as isize - 1)
            .await?;
        Ok(())
    }

    /// Fire-and-forget activity logging: a slow log write must never delay
    /// the signaling path, so failures are logged and dropped.
    pub fn log_activity_bg(&self, entry: ActivityEntry) {
        let repo = self.clone();
        tokio::spawn(async move {
            if let Err(e) = repo.log_activity(&entry).await {
                tracing::warn!(error = %e, action = %entry.action, "Failed to write activity log");
            }
        });
    }

    // ==================== Health Check ====================

    /// Check Redis connection health
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.pool.get().await?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| crate::error::AppError::RedisError(e.to_string()))?;

        Ok(pong == "PONG")
    }
}
