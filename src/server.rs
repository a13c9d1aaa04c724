//! `POST /chat` endpoint
//!
//! Accepts `{"message": "..."}`, runs the agent pipeline to completion and
//! answers `{"response": "..."}`. Malformed bodies and pipeline failures both
//! answer 500 with a sanitized `{"error": "..."}` body.

use crate::config::CrewSection;
use crate::crew::SharedLlm;
use crate::error::{CrewError, CrewResult};
use crate::observability::metrics::metrics;
use crate::pipeline::CrewPipeline;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{info, warn, Instrument};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

/// Request bodies above this size are refused before parsing
const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub response: String,
}

/// Shared server state holding the lazily built pipeline
pub struct ChatState {
    llm: SharedLlm,
    crew: CrewSection,
    pipeline: OnceCell<Arc<CrewPipeline>>,
    constructions: AtomicUsize,
}

impl ChatState {
    pub fn new(llm: SharedLlm, crew: CrewSection) -> Self {
        Self {
            llm,
            crew,
            pipeline: OnceCell::new(),
            constructions: AtomicUsize::new(0),
        }
    }

    pub fn llm(&self) -> &SharedLlm {
        &self.llm
    }

    /// The pipeline, built on first use; concurrent first callers share one build
    ///
    /// Only a request whose body parses reaches this, so a malformed first
    /// request answers 500 without constructing the pipeline.
    pub async fn pipeline(&self) -> Arc<CrewPipeline> {
        self.pipeline
            .get_or_init(|| async {
                self.constructions.fetch_add(1, Ordering::SeqCst);
                metrics().pipeline_constructed();
                Arc::new(CrewPipeline::new(self.llm.clone(), self.crew.clone()))
            })
            .await
            .clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.initialized()
    }

    /// Number of pipeline constructions so far (0 or 1)
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    /// Parse a body and run the pipeline on its message
    ///
    /// The body is parsed before [`ChatState::pipeline`] is touched.
    pub async fn handle(&self, body: &[u8]) -> CrewResult<ChatResponse> {
        let request: ChatRequest = serde_json::from_slice(body)
            .map_err(|e| CrewError::invalid_input(format!("bad chat request: {e}")))?;

        let pipeline = self.pipeline().await;
        let output = pipeline.process(&request.message).await?;

        Ok(ChatResponse {
            response: output.raw,
        })
    }
}

/// Routes for the chat listener, CORS open to any origin
pub fn chat_routes(
    state: Arc<ChatState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    warp::path("chat")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(warp::any().map(move || state.clone()))
        .and_then(handle_chat)
        .with(cors)
}

async fn handle_chat(
    body: Bytes,
    state: Arc<ChatState>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    let request_id = Uuid::new_v4();
    let span = crate::request_span!(%request_id, bytes = body.len());

    async move {
        metrics().request_received();
        let started = Instant::now();

        match state.handle(&body).await {
            Ok(response) => {
                metrics().request_completed(started.elapsed());
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "Chat request complete");
                Ok(warp::reply::with_status(
                    warp::reply::json(&response),
                    StatusCode::OK,
                ))
            }
            Err(e) => {
                metrics().request_failed();
                warn!("Chat request failed: {}", e);
                Ok(warp::reply::with_status(
                    warp::reply::json(&e.to_error_body()),
                    StatusCode::INTERNAL_SERVER_ERROR,
                ))
            }
        }
    }
    .instrument(span)
    .await
}

/// Serve the chat routes until `shutdown` resolves
pub async fn serve<F>(state: Arc<ChatState>, addr: SocketAddr, shutdown: F) -> CrewResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (bound, server) = warp::serve(chat_routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| CrewError::internal(format!("failed to bind {addr}: {e}")))?;

    info!("Chat server listening on http://{}/chat", bound);
    server.await;
    info!("Chat server stopped");
    Ok(())
}
