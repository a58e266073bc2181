//! Server lifecycle manager.
//!
//! Sequences an [`HttpServer`] through activation and deactivation so that
//! the root handler is always registered before listening, and repeated
//! activate/deactivate calls never double-bind or double-stop.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::schema::{HttpdConfig, DEFAULT_IDENTITY};
use crate::http::{AxumServer, Handler, HttpServer, RootHandler, ServeOptions, ServerError};
use crate::lifecycle::state::ServerState;
use crate::net::bind::BindAddressError;
use crate::net::{AddressResolver, BindAddress, DisplayAddress, NetworkInterfaceProvider, SystemInterfaces};
use crate::observability::metrics;

/// Pattern the root handler is registered under.
pub const ROOT_PATTERN: &str = "/";

/// Error type for lifecycle transitions.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("server startup failed: {0}")]
    Startup(#[source] ServerError),
}

/// What the lifecycle needs to start a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub bind: BindAddress,
    pub identity: Option<String>,
}

impl LifecycleConfig {
    pub fn from_config(config: &HttpdConfig) -> Result<Self, BindAddressError> {
        Ok(Self {
            bind: config.listener.bind_address.parse()?,
            identity: config.server.identity().map(str::to_string),
        })
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            bind: BindAddress::default(),
            identity: Some(DEFAULT_IDENTITY.to_string()),
        }
    }
}

/// Outcome of [`ServerLifecycle::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The server is now listening.
    Started {
        local_addr: SocketAddr,
        display: DisplayAddress,
    },
    /// Nothing was done; the server was already starting or running.
    AlreadyActive(ServerState),
}

/// Outcome of [`ServerLifecycle::deactivate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deactivation {
    /// The server was stopped. `clean` is false if shutdown reported an error.
    Stopped { clean: bool },
    /// Nothing was done; the server was not running.
    NotRunning(ServerState),
}

/// Drives an [`HttpServer`] through start and stop.
pub struct ServerLifecycle<S = AxumServer, P = SystemInterfaces> {
    server: S,
    resolver: AddressResolver<P>,
    root: Arc<dyn Handler>,
    config: LifecycleConfig,
    state: Mutex<ServerState>,
}

impl ServerLifecycle<AxumServer, SystemInterfaces> {
    /// Production wiring: axum server, OS interface enumeration.
    pub fn from_config(config: &HttpdConfig) -> Result<Self, BindAddressError> {
        Ok(Self::new(
            AxumServer::new(ServeOptions::from(&config.server)),
            AddressResolver::new(SystemInterfaces),
            LifecycleConfig::from_config(config)?,
        ))
    }
}

impl<S: HttpServer, P: NetworkInterfaceProvider> ServerLifecycle<S, P> {
    pub fn new(server: S, resolver: AddressResolver<P>, config: LifecycleConfig) -> Self {
        Self {
            server,
            resolver,
            root: Arc::new(RootHandler::new()),
            config,
            state: Mutex::new(ServerState::Stopped),
        }
    }

    /// Replace the handler registered at `/`.
    pub fn with_root_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.root = handler;
        self
    }

    pub fn state(&self) -> ServerState {
        *self.lock()
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    /// Start the server if stopped; a no-op while starting or running.
    pub fn activate(&self) -> Result<Activation, LifecycleError> {
        let mut state = self.lock();
        if !state.can_start() {
            tracing::debug!(state = state.as_str(), "Activate ignored");
            return Ok(Activation::AlreadyActive(*state));
        }

        Self::enter(&mut state, ServerState::Starting);
        match self.start() {
            Ok(local_addr) => {
                Self::enter(&mut state, ServerState::Running);
                let display_addr = self
                    .resolver
                    .resolve_primary_address()
                    .display(local_addr.port());
                tracing::info!(address = %local_addr, display = %display_addr, "Server activated");
                Ok(Activation::Started {
                    local_addr,
                    display: display_addr,
                })
            }
            Err(e) => {
                Self::enter(&mut state, ServerState::Stopped);
                tracing::error!(bind = %self.config.bind, error = %e, "Server activation failed");
                Err(LifecycleError::Startup(e))
            }
        }
    }

    /// Stop the server if running; a no-op otherwise. Never fails.
    pub fn deactivate(&self) -> Deactivation {
        let mut state = self.lock();
        if !state.can_stop() {
            tracing::debug!(state = state.as_str(), "Deactivate ignored");
            return Deactivation::NotRunning(*state);
        }

        Self::enter(&mut state, ServerState::Stopping);
        let clean = match self.server.shutdown() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Server shutdown failed");
                false
            }
        };
        Self::enter(&mut state, ServerState::Stopped);
        tracing::info!(clean, "Server deactivated");
        Deactivation::Stopped { clean }
    }

    /// Identity, then handler, then listener.
    fn start(&self) -> Result<SocketAddr, ServerError> {
        self.server.set_server_identity(self.config.identity())?;
        self.server
            .register_handler(ROOT_PATTERN, Arc::clone(&self.root))?;
        self.server.listen_and_serve(&self.config.bind)
    }

    fn enter(state: &mut MutexGuard<'_, ServerState>, next: ServerState) {
        tracing::debug!(from = state.as_str(), to = next.as_str(), "Lifecycle transition");
        **state = next;
        metrics::record_transition(next);
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::StaticInterfaces;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Records calls; bind and shutdown can be made to fail.
    #[derive(Default)]
    struct MockServer {
        calls: Mutex<Vec<&'static str>>,
        registered: AtomicUsize,
        listened: AtomicUsize,
        shutdowns: AtomicUsize,
        fail_bind: AtomicBool,
        fail_shutdown: AtomicBool,
        identity: Mutex<Option<String>>,
    }

    impl MockServer {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HttpServer for MockServer {
        fn register_handler(&self, pattern: &str, _handler: Arc<dyn Handler>) -> Result<(), ServerError> {
            assert_eq!(pattern, ROOT_PATTERN);
            self.calls.lock().unwrap().push("register");
            self.registered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn listen_and_serve(&self, bind: &BindAddress) -> Result<SocketAddr, ServerError> {
            self.calls.lock().unwrap().push("listen");
            self.listened.fetch_add(1, Ordering::SeqCst);
            if self.fail_bind.load(Ordering::SeqCst) {
                return Err(ServerError::Bind {
                    addr: bind.socket_addr(),
                    source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
                });
            }
            Ok(bind.socket_addr())
        }

        fn shutdown(&self) -> Result<(), ServerError> {
            self.calls.lock().unwrap().push("shutdown");
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown.load(Ordering::SeqCst) {
                return Err(ServerError::Panicked);
            }
            Ok(())
        }

        fn set_server_identity(&self, identity: Option<&str>) -> Result<(), ServerError> {
            self.calls.lock().unwrap().push("identity");
            *self.identity.lock().unwrap() = identity.map(str::to_string);
            Ok(())
        }
    }

    fn lifecycle() -> ServerLifecycle<MockServer, StaticInterfaces> {
        let interfaces = StaticInterfaces::from_pairs([
            ("eth0", vec!["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()]),
            ("wlan0", vec!["192.168.1.5".parse().unwrap()]),
        ]);
        ServerLifecycle::new(
            MockServer::default(),
            AddressResolver::new(interfaces),
            LifecycleConfig::default(),
        )
    }

    #[test]
    fn activate_registers_before_listening() {
        let lc = lifecycle();
        let activation = lc.activate().unwrap();

        assert_eq!(lc.state(), ServerState::Running);
        assert_eq!(lc.server().calls(), ["identity", "register", "listen"]);
        assert_eq!(lc.server().identity.lock().unwrap().as_deref(), Some("GMOryx/0.1"));
        match activation {
            Activation::Started { local_addr, display } => {
                assert_eq!(local_addr, "0.0.0.0:8080".parse().unwrap());
                assert_eq!(display.to_string(), "http://192.168.1.5:8080");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn activate_twice_binds_once() {
        let lc = lifecycle();
        lc.activate().unwrap();
        assert_eq!(
            lc.activate().unwrap(),
            Activation::AlreadyActive(ServerState::Running)
        );

        assert_eq!(lc.server().registered.load(Ordering::SeqCst), 1);
        assert_eq!(lc.server().listened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deactivate_when_stopped_is_noop() {
        let lc = lifecycle();
        assert_eq!(lc.deactivate(), Deactivation::NotRunning(ServerState::Stopped));
        assert_eq!(lc.server().shutdowns.load(Ordering::SeqCst), 0);
        assert_eq!(lc.state(), ServerState::Stopped);
    }

    #[test]
    fn deactivate_stops_once() {
        let lc = lifecycle();
        lc.activate().unwrap();
        assert_eq!(lc.deactivate(), Deactivation::Stopped { clean: true });
        assert_eq!(lc.deactivate(), Deactivation::NotRunning(ServerState::Stopped));
        assert_eq!(lc.server().shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bind_failure_returns_to_stopped_and_allows_retry() {
        let lc = lifecycle();
        lc.server().fail_bind.store(true, Ordering::SeqCst);

        let err = lc.activate().unwrap_err();
        assert!(matches!(err, LifecycleError::Startup(ServerError::Bind { .. })));
        assert_eq!(lc.state(), ServerState::Stopped);

        lc.server().fail_bind.store(false, Ordering::SeqCst);
        assert!(matches!(lc.activate().unwrap(), Activation::Started { .. }));
        assert_eq!(lc.server().listened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shutdown_failure_still_stops() {
        let lc = lifecycle();
        lc.activate().unwrap();
        lc.server().fail_shutdown.store(true, Ordering::SeqCst);

        assert_eq!(lc.deactivate(), Deactivation::Stopped { clean: false });
        assert_eq!(lc.state(), ServerState::Stopped);
        assert!(lc.activate().is_ok());
    }

    #[test]
    fn resume_cycle_reregisters_handler() {
        let lc = lifecycle();
        for _ in 0..3 {
            lc.activate().unwrap();
            lc.deactivate();
        }
        assert_eq!(lc.server().registered.load(Ordering::SeqCst), 3);
        assert_eq!(lc.server().shutdowns.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn no_address_found() {
        let lc = ServerLifecycle::new(
            MockServer::default(),
            AddressResolver::new(StaticInterfaces::from_pairs([(
                "lo",
                vec!["127.0.0.1".parse().unwrap()],
            )])),
            LifecycleConfig {
                bind: "127.0.0.1:9000".parse().unwrap(),
                identity: None,
            },
        );
        match lc.activate().unwrap() {
            Activation::Started { display, .. } => {
                assert_eq!(display.to_string(), "no address found");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*lc.server().identity.lock().unwrap(), None);
    }

    #[test]
    fn config_from_httpd_config() {
        let mut config = HttpdConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.server.identity = Some(String::new());

        let lc = LifecycleConfig::from_config(&config).unwrap();
        assert_eq!(lc.bind.port(), 0);
        assert_eq!(lc.identity(), None);

        config.listener.bind_address = "bogus".into();
        assert!(LifecycleConfig::from_config(&config).is_err());
    }
}
