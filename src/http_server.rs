//! The HTTP endpoint the portfolio page posts its contact form to.

use crate::error::Error;
use crate::rate_limiter::{Admission, AdmissionGate};
use crate::replies::{Language, Reply};
use crate::smtp_client::Dispatcher;
use crate::submission::{Submission, ValidationError};
use crate::utils::{client_identifier, unix_millis};
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;

/// State shared by all requests.
pub struct AppState {
    pub limiter: Arc<dyn AdmissionGate>,
    pub dispatcher: Dispatcher,
    pub default_language: Language,
}

/// Body of every contact endpoint response.
#[derive(Debug, Serialize)]
pub struct ReplyBody {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

impl Reply {
    fn status(self) -> StatusCode {
        match self {
            Self::Sent => StatusCode::OK,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Invalid => StatusCode::BAD_REQUEST,
            Self::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn respond(self, language: Language) -> Response {
        (
            self.status(),
            Json(ReplyBody {
                message: self.text(language),
            }),
        )
            .into_response()
    }
}

/// Builds the router serving the contact endpoint.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/sendMail", post(send_mail))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handles `POST /api/sendMail`.
///
/// The body is taken as a fallible extractor so the rate limiter runs before
/// any decoding failure is reported.
async fn send_mail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let language = Language::negotiate(
        headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok()),
        state.default_language,
    );
    let client = client_identifier(&headers);

    match state.limiter.admit(&client, unix_millis()) {
        Ok(Admission::Admitted { remaining }) => {
            log::debug!("Admitted submission from {client}, {remaining} left in window");
        }
        Ok(Admission::Limited { retry_after }) => {
            log::info!("Rate limited submission from {client}");
            let mut response = Reply::RateLimited.respond(language);
            // Round up so the client never retries too early.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            return response;
        }
        Err(e) => return unexpected(&e, language),
    }

    let submission = match body
        .map_err(|e| ValidationError::Malformed(e.body_text()))
        .and_then(|body| Submission::from_json(&body))
    {
        Ok(submission) => submission,
        Err(e) => {
            log::debug!("Rejected submission from {client}: {e}");
            return Reply::Invalid.respond(language);
        }
    };

    match state.dispatcher.send(&submission).await {
        Ok(()) => {
            log::info!("Relayed contact message from {client}");
            Reply::Sent.respond(language)
        }
        Err(e) => {
            log::error!("Failed to send contact message from {client}: {e}");
            Reply::Failed.respond(language)
        }
    }
}

fn unexpected(error: &Error, language: Language) -> Response {
    log::error!("Unexpected error while handling submission: {error}");
    Reply::Failed.respond(language)
}

/// Serves `app` on `addr` until Ctrl-C or SIGTERM.
pub async fn run_http_server(addr: &str, app: Router) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("Contact relay listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Contact relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    log::info!("Shutdown signal received");
}
