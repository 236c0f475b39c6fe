//! HTTP server implementation using axum.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use pidbg_core::{Event, Snapshot};
use pidbg_engine::{DispatcherHandle, EventStream, QueryGateway};
use pidbg_telemetry::Metrics;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};

/// Text frame a client sends to get a fresh `snapshot` event.
pub const SNAPSHOT_REQUEST: &str = "snapshot";

/// Caps concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot. The slot is held until the guard drops, so the guard
    /// can travel into the upgraded connection task.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: self.clone(),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    gateway: QueryGateway,
    handle: DispatcherHandle,
    limiter: Arc<ConnectionLimiter>,
}

impl AppState {
    pub fn new(gateway: QueryGateway, handle: DispatcherHandle, config: &DashboardConfig) -> Self {
        Self {
            gateway,
            handle,
            limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.limiter.current_count()
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/ws", get(ws_handler))
        .route("/api/custom/{name}", post(post_custom))
        .route("/metrics", get(get_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_status(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.gateway.snapshot())
}

async fn post_custom(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<Value>,
) -> DashboardResult<StatusCode> {
    if !payload.is_object() {
        return Err(DashboardError::BadRequest(
            "custom payload must be a JSON object".to_string(),
        ));
    }
    state.handle.push_custom(name, payload).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn get_metrics() -> DashboardResult<Response> {
    let body = Metrics::render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> DashboardResult<Response> {
    let Some(guard) = state.limiter.try_acquire() else {
        warn!(
            current = state.limiter.current_count(),
            max = state.limiter.max(),
            "WebSocket connection limit reached"
        );
        return Ok((StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response());
    };

    // Subscribe before the upgrade so a stopped engine is reported as 503.
    let stream = state.gateway.subscribe()?;
    let gateway = state.gateway.clone();
    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, stream, gateway, guard)))
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &Event,
) -> Result<(), axum::Error> {
    let text = match event.to_json() {
        Ok(text) => text,
        Err(e) => {
            warn!(kind = %event.kind, error = %e, "Failed to serialize event");
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}

/// Forward the subscriber's events to the socket until either side ends.
async fn handle_ws_connection(
    socket: WebSocket,
    mut stream: EventStream,
    gateway: QueryGateway,
    _guard: ConnectionGuard,
) {
    let subscriber = stream.id();
    let (mut sender, mut receiver) = socket.split();
    Metrics::ws_connected();
    info!(%subscriber, "WebSocket connection opened");

    loop {
        tokio::select! {
            event = stream.recv() => {
                let Some(event) = event else {
                    debug!(%subscriber, "Event stream ended");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                if send_event(&mut sender, &event).await.is_err() {
                    debug!(%subscriber, "Failed to send event, client disconnected");
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) if text.as_str().trim() == SNAPSHOT_REQUEST => {
                    match gateway.snapshot_event() {
                        Ok(event) => {
                            if send_event(&mut sender, &event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(%subscriber, error = %e, "Snapshot request failed"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(%subscriber, "Client closed connection");
                    break;
                }
                Some(Err(e)) => {
                    debug!(%subscriber, error = %e, "WebSocket receive error");
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    Metrics::ws_disconnected();
    info!(%subscriber, "WebSocket connection closed");
}

/// Serve on an already bound listener until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> DashboardResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "Dashboard server listening");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Dashboard server stopped");
    Ok(())
}

/// Bind `config.host:config.port` and serve.
pub async fn run_server<F>(
    state: AppState,
    config: &DashboardConfig,
    shutdown: F,
) -> DashboardResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind_addr()).await?;
    serve(listener, state, shutdown).await
}
