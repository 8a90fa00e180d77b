//! Per-user request limiting for authenticated routes.
//!
//! In-memory and per-process only. Layer it inside [`authenticate`] so the
//! identity is already attached when it runs.
//!
//! [`authenticate`]: super::auth::authenticate

use crate::error::AuthError;
use crate::middleware::auth::AuthContext;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Entries older than one window are dropped once the map grows past this.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by user ID.
#[derive(Debug)]
pub struct UserRateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl UserRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `user_id`; `false` when it is over the limit.
    pub fn check(&self, user_id: &str) -> bool {
        self.check_at(user_id, Instant::now())
    }

    fn check_at(&self, user_id: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() >= PRUNE_THRESHOLD && !windows.contains_key(user_id) {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(user_id.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Axum middleware answering 429 once a user exceeds the limit.
///
/// Requests without an [`AuthContext`] are not counted.
pub async fn rate_limit_by_user(
    State(limiter): State<Arc<UserRateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(ctx) = AuthContext::from_extensions(req.extensions()) {
        if !limiter.check(&ctx.user_id) {
            tracing::warn!(user_id = %ctx.user_id, "rate limit exceeded");
            return Err(AuthError::TooManyRequests);
        }
    }

    Ok(next.run(req).await)
}
