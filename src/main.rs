//! gmoryx-httpd
//!
//! Host adapter for the server lifecycle: serves the GMOryx welcome page and
//! prints the address other machines should use to reach it.
//!
//! ```text
//! start        → activate  → "Web server: http://<ip>:8080"
//! SIGUSR1      → deactivate (pause)
//! SIGUSR2      → activate   (resume)
//! SIGHUP/watch → reload config, restart if running
//! SIGINT/TERM  → deactivate, exit
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;

use gmoryx_httpd::config::validation::validate_config;
use gmoryx_httpd::config::watcher::ConfigWatcher;
use gmoryx_httpd::config::{load_config, ConfigError, HttpdConfig};
use gmoryx_httpd::lifecycle::signals::Signals;
use gmoryx_httpd::lifecycle::{Activation, HostSignal, LifecycleError, ServerLifecycle, ServerState};
use gmoryx_httpd::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "gmoryx-httpd")]
#[command(about = "Serve the GMOryx welcome page and show where to reach it", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, ":8080" or "ip:port" (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Server header value, empty to disable (overrides config)
    #[arg(long)]
    identity: Option<String>,

    /// Reload when the config file changes
    #[arg(long, requires = "config")]
    watch: bool,
}

enum Event {
    Signal(HostSignal),
    Updated(HttpdConfig),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability);
    tracing::info!("gmoryx-httpd v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Signals and the watcher need a runtime; the server brings its own.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut signals = {
        let _guard = runtime.enter();
        Signals::new()?
    };

    let mut updates = None;
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            updates = Some(rx);
            Some(watcher.run()?)
        }
        _ => None,
    };

    let mut lifecycle = ServerLifecycle::from_config(&config)?;
    activate(&lifecycle)?;

    loop {
        let event = runtime.block_on(async {
            tokio::select! {
                signal = signals.recv() => Event::Signal(signal),
                Some(updated) = next_update(&mut updates) => Event::Updated(updated),
            }
        });

        match event {
            Event::Signal(HostSignal::Shutdown) => break,
            Event::Signal(HostSignal::Pause) => {
                lifecycle.deactivate();
            }
            Event::Signal(HostSignal::Resume) => {
                if let Err(e) = activate(&lifecycle) {
                    tracing::warn!(error = %e, "Resume failed, staying paused");
                }
            }
            Event::Signal(HostSignal::Reload) => match resolve_config(&cli) {
                Ok(config) => lifecycle = restart(lifecycle, &config),
                Err(e) => tracing::error!(error = %e, "Reload failed, keeping current configuration"),
            },
            Event::Updated(mut config) => {
                apply_overrides(&cli, &mut config);
                match validate_config(&config) {
                    Ok(()) => lifecycle = restart(lifecycle, &config),
                    Err(errors) => tracing::error!(
                        error = %ConfigError::Validation(errors),
                        "Overrides invalid for reloaded configuration"
                    ),
                }
            }
        }
    }

    lifecycle.deactivate();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Config file (or defaults) with command-line overrides, validated.
fn resolve_config(cli: &Cli) -> Result<HttpdConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HttpdConfig::default(),
    };
    apply_overrides(cli, &mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut HttpdConfig) {
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(identity) = &cli.identity {
        config.server.identity = Some(identity.clone());
    }
}

async fn next_update(updates: &mut Option<mpsc::UnboundedReceiver<HttpdConfig>>) -> Option<HttpdConfig> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn activate(lifecycle: &ServerLifecycle) -> Result<(), LifecycleError> {
    match lifecycle.activate() {
        Ok(Activation::Started { display, .. }) => {
            println!("Web server: {display}\nPlease access from other machine.");
            Ok(())
        }
        Ok(Activation::AlreadyActive(_)) => Ok(()),
        Err(e) => {
            eprintln!("Failed to start web server: {e}");
            Err(e)
        }
    }
}

/// Swap in a lifecycle built from `config`, resuming only if it was running.
fn restart(current: ServerLifecycle, config: &HttpdConfig) -> ServerLifecycle {
    let next = match ServerLifecycle::from_config(config) {
        Ok(next) => next,
        Err(e) => {
            tracing::error!(error = %e, "Reloaded configuration unusable, keeping current");
            return current;
        }
    };

    let was_running = current.state() == ServerState::Running;
    current.deactivate();
    drop(current);

    tracing::info!(bind = %next.config().bind, "Configuration reloaded");
    if was_running {
        if let Err(e) = activate(&next) {
            tracing::warn!(error = %e, "Restart after reload failed, server stays stopped");
        }
    }
    next
}
