use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use crate::api::AppState;
use crate::db::Session;
use crate::error::AppError;

/// Per-request holder for the session a [`DbSession`] extractor opens.
#[derive(Clone, Default)]
struct SessionSlot(Arc<Mutex<Option<Session>>>);

/// Request-scoped unit of work.
///
/// Handlers taking [`DbSession`] get a session opened on first use. Once the
/// handler has produced its response, the session is committed when the status
/// is 2xx or 3xx and rolled back otherwise. A failed commit replaces the
/// response with the matching error. Requests that never extract a session
/// never touch the pool.
pub async fn request_session(mut request: Request, next: Next) -> Response {
    let slot = SessionSlot::default();
    request.extensions_mut().insert(slot.clone());

    let response = next.run(request).await;

    let session = slot.0.lock().await.take();
    let Some(session) = session else {
        return response;
    };

    let status = response.status();
    if status.is_success() || status.is_redirection() {
        if let Err(e) = session.commit().await {
            return AppError::from(e).into_response();
        }
    } else {
        let id = session.id();
        if let Err(e) = session.rollback().await {
            tracing::warn!(session = %id, "Rollback after {} failed: {}", status, e);
        }
    }
    response
}

/// Axum extractor borrowing the request's database session.
///
/// Requires the [`request_session`] layer, which `build_app` installs. Use at
/// most one per handler.
pub struct DbSession(OwnedMutexGuard<Option<Session>>);

impl FromRequestParts<Arc<AppState>> for DbSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let slot = parts
            .extensions
            .get::<SessionSlot>()
            .cloned()
            .ok_or_else(|| AppError::Internal("request_session layer is not installed".to_string()))?;

        let mut guard = slot
            .0
            .try_lock_owned()
            .map_err(|_| AppError::Internal("request session is already borrowed".to_string()))?;
        if guard.is_none() {
            *guard = Some(state.db.acquire_session().await?);
        }
        Ok(DbSession(guard))
    }
}

impl Deref for DbSession {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.0.as_ref().expect("session is opened before DbSession is built")
    }
}

impl DerefMut for DbSession {
    fn deref_mut(&mut self) -> &mut Session {
        self.0.as_mut().expect("session is opened before DbSession is built")
    }
}
