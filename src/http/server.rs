//! HTTP server collaborator.
//!
//! # Responsibilities
//! - Define the `HttpServer` surface the lifecycle drives
//! - Bind synchronously so listen errors reach the caller
//! - Serve on a dedicated runtime thread owned by the server
//! - Dispatch requests to registered handlers on the blocking pool
//! - Stamp the identity header on every response, timeouts included
//! - Contain handler panics to the request that caused them
//! - Bound shutdown by a drain deadline and release the port on return

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::handler::{Handler, HttpRequest, ResponseWriter};
use crate::http::registry::{HandlerRegistry, InvalidPattern};
use crate::lifecycle::shutdown::{signalled, Shutdown};
use crate::net::BindAddress;
use crate::observability::metrics;

/// Error type for server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    InvalidPattern(#[from] InvalidPattern),
    #[error("invalid server identity {0:?}")]
    InvalidIdentity(String),
    #[error("already listening on {0}")]
    AlreadyListening(SocketAddr),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to spawn serve thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("server stopped with error: {0}")]
    Serve(#[source] std::io::Error),
    #[error("serve thread panicked")]
    Panicked,
}

/// The operations a server lifecycle needs from an HTTP server.
pub trait HttpServer: Send + Sync {
    /// Route requests matching `pattern` to `handler`.
    fn register_handler(&self, pattern: &str, handler: Arc<dyn Handler>) -> Result<(), ServerError>;

    /// Start accepting connections. Returns the bound address.
    fn listen_and_serve(&self, bind: &BindAddress) -> Result<SocketAddr, ServerError>;

    /// Stop accepting connections and release the listener.
    fn shutdown(&self) -> Result<(), ServerError>;

    /// Set or clear the `Server` response header.
    fn set_server_identity(&self, identity: Option<&str>) -> Result<(), ServerError> {
        let _ = identity;
        Ok(())
    }
}

/// Tuning for [`AxumServer`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub request_timeout: Duration,
    pub drain_timeout: Duration,
    pub max_response_bytes: usize,
    pub worker_threads: usize,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ServeOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            drain_timeout: config.drain_timeout(),
            max_response_bytes: config.max_response_bytes,
            worker_threads: config.worker_threads.max(1),
        }
    }
}

/// State injected into the dispatcher.
#[derive(Clone)]
struct DispatchState {
    registry: Arc<HandlerRegistry>,
    max_response_bytes: usize,
}

impl DispatchState {
    /// Run `handler` on the blocking pool so a slow handler holds no worker
    /// and the request timeout can still fire.
    async fn invoke(&self, handler: Arc<dyn Handler>, request: HttpRequest) -> Response {
        let mut writer = ResponseWriter::new(self.max_response_bytes);

        let task = tokio::task::spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                handler.serve_http(&mut writer, &request);
            }));
            if outcome.is_err() {
                metrics::record_handler_failure("panic");
                tracing::error!(
                    request_id = request.request_id().unwrap_or("unknown"),
                    path = %request.path(),
                    "Handler panicked, sending partial response"
                );
            }
            writer
        });

        match task.await {
            Ok(writer) => writer.into_response(),
            Err(e) => {
                metrics::record_handler_failure("join");
                tracing::error!(error = %e, "Handler task did not complete");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

struct Running {
    local_addr: SocketAddr,
    shutdown: Shutdown,
    thread: JoinHandle<std::io::Result<()>>,
}

/// [`HttpServer`] backed by axum, serving on its own runtime thread.
pub struct AxumServer {
    registry: Arc<HandlerRegistry>,
    identity: Arc<ArcSwapOption<HeaderValue>>,
    options: ServeOptions,
    running: Mutex<Option<Running>>,
}

impl AxumServer {
    pub fn new(options: ServeOptions) -> Self {
        Self {
            registry: Arc::new(HandlerRegistry::new()),
            identity: Arc::new(ArcSwapOption::empty()),
            options,
            running: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &ServeOptions {
        &self.options
    }

    /// Address currently listened on.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.local_addr)
    }

    pub fn is_listening(&self) -> bool {
        self.local_addr().is_some()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self) -> Router {
        let state = DispatchState {
            registry: Arc::clone(&self.registry),
            max_response_bytes: self.options.max_response_bytes,
        };
        let identity = Arc::clone(&self.identity);

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TimeoutLayer::new(self.options.request_timeout))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::SERVER,
                move |_: &Response| identity.load_full().map(|value| (*value).clone()),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}

impl Default for AxumServer {
    fn default() -> Self {
        Self::new(ServeOptions::default())
    }
}

impl HttpServer for AxumServer {
    fn register_handler(&self, pattern: &str, handler: Arc<dyn Handler>) -> Result<(), ServerError> {
        self.registry.register(pattern, handler)?;
        Ok(())
    }

    fn listen_and_serve(&self, bind: &BindAddress) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = running.as_ref() {
            return Err(ServerError::AlreadyListening(current.local_addr));
        }

        let addr = bind.socket_addr();
        let bind_err = |source| ServerError::Bind { addr, source };
        let listener = std::net::TcpListener::bind(addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.options.worker_threads)
            .thread_name("gmoryx-httpd-worker")
            .enable_all()
            .build()
            .map_err(ServerError::Runtime)?;

        let shutdown = Shutdown::new();
        let stop = shutdown.subscribe();
        let deadline = shutdown.subscribe();
        let router = self.build_router();
        let drain = self.options.drain_timeout;

        let thread = std::thread::Builder::new()
            .name("gmoryx-httpd".to_string())
            .spawn(move || {
                let result = runtime.block_on(serve(listener, router, stop, deadline, drain));
                // Handlers still blocking past the drain are abandoned.
                runtime.shutdown_timeout(drain);
                result
            })
            .map_err(ServerError::Spawn)?;

        tracing::info!(
            address = %local_addr,
            handlers = self.registry.len(),
            "HTTP server listening"
        );

        *running = Some(Running {
            local_addr,
            shutdown,
            thread,
        });
        Ok(local_addr)
    }

    fn shutdown(&self) -> Result<(), ServerError> {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return Ok(());
        };

        running.shutdown.trigger();
        let result = match running.thread.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ServerError::Serve(e)),
            Err(_) => Err(ServerError::Panicked),
        };

        tracing::info!(address = %running.local_addr, "HTTP server stopped");
        result
    }

    fn set_server_identity(&self, identity: Option<&str>) -> Result<(), ServerError> {
        match identity {
            Some(name) => {
                let value = HeaderValue::from_str(name)
                    .map_err(|_| ServerError::InvalidIdentity(name.to_string()))?;
                self.identity.store(Some(Arc::new(value)));
            }
            None => self.identity.store(None),
        }
        Ok(())
    }
}

impl Drop for AxumServer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "HTTP server shutdown on drop failed");
        }
    }
}

/// Serve until shutdown, then give in-flight requests `drain` to finish.
async fn serve(
    listener: std::net::TcpListener,
    router: Router,
    stop: broadcast::Receiver<()>,
    deadline: broadcast::Receiver<()>,
    drain: Duration,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::from_std(listener)?;
    let app = router.into_make_service_with_connect_info::<SocketAddr>();
    let graceful = axum::serve(listener, app)
        .with_graceful_shutdown(signalled(stop))
        .into_future();

    tokio::select! {
        result = graceful => result,
        _ = async move {
            signalled(deadline).await;
            tokio::time::sleep(drain).await;
        } => {
            tracing::warn!(
                drain_ms = drain.as_millis() as u64,
                "Drain deadline reached, dropping in-flight connections"
            );
            Ok(())
        }
    }
}

/// Route a request to its registered handler.
async fn dispatch(State(state): State<DispatchState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, _body) = request.into_parts();
    let request = HttpRequest::new(parts.method, parts.uri, parts.headers, peer);

    tracing::debug!(
        request_id = request.request_id().unwrap_or("unknown"),
        method = %request.method(),
        path = %request.path(),
        "Dispatching request"
    );

    let response = match state.registry.lookup(request.path()) {
        Some(handler) => state.invoke(handler, request).await,
        None => (StatusCode::NOT_FOUND, "404 page not found\n").into_response(),
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}
