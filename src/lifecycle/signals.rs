//! Host signal handling.
//!
//! # Mapping
//! ```text
//! SIGINT / SIGTERM → Shutdown (deactivate and exit)
//! SIGHUP           → Reload   (reload config, restart)
//! SIGUSR1          → Pause    (deactivate)
//! SIGUSR2          → Resume   (activate)
//! ```
//! Outside Unix only Ctrl+C is observed.

/// A host event the binary translates into lifecycle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Shutdown,
    Reload,
    Pause,
    Resume,
}

#[cfg(unix)]
mod imp {
    use super::HostSignal;
    use tokio::signal::unix::{signal, Signal, SignalKind};

    /// Registered signal streams. Create inside a runtime context.
    pub struct Signals {
        interrupt: Signal,
        terminate: Signal,
        hangup: Signal,
        user1: Signal,
        user2: Signal,
    }

    impl Signals {
        pub fn new() -> std::io::Result<Self> {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
                hangup: signal(SignalKind::hangup())?,
                user1: signal(SignalKind::user_defined1())?,
                user2: signal(SignalKind::user_defined2())?,
            })
        }

        pub async fn recv(&mut self) -> HostSignal {
            tokio::select! {
                _ = self.interrupt.recv() => HostSignal::Shutdown,
                _ = self.terminate.recv() => HostSignal::Shutdown,
                _ = self.hangup.recv() => HostSignal::Reload,
                _ = self.user1.recv() => HostSignal::Pause,
                _ = self.user2.recv() => HostSignal::Resume,
            }
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use super::HostSignal;

    pub struct Signals;

    impl Signals {
        pub fn new() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub async fn recv(&mut self) -> HostSignal {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            HostSignal::Shutdown
        }
    }
}

pub use imp::Signals;
