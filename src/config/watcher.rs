//! Config file hot reload.
//!
//! Watches the directory holding the file rather than the file itself:
//! editors that save by writing a temp file and renaming it over the
//! original replace the inode, and a watch on the old inode goes quiet.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::HttpdConfig;

/// Sends a freshly loaded [`HttpdConfig`] whenever the file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<HttpdConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<HttpdConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Updates stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = watch_dir(&self.path);
        let file_name = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::path_not_found().add_path(self.path.clone()))?;

        let path = self.path.clone();
        let tx = self.update_tx;
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &file_name) => reload(&path, &tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), dir = %dir.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// A create or modify event naming the watched file.
fn touches(event: &Event, file_name: &OsString) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<HttpdConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Config file changed, reloading");
            if tx.send(config).is_err() {
                tracing::debug!("Config update receiver gone");
            }
        }
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Config reload failed, keeping current configuration"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn only_events_for_the_file_count() {
        let name = OsString::from("httpd.toml");
        assert!(touches(&event(EventKind::Modify(ModifyKind::Any), "/etc/gm/httpd.toml"), &name));
        assert!(touches(&event(EventKind::Create(CreateKind::File), "/etc/gm/httpd.toml"), &name));
        assert!(!touches(&event(EventKind::Modify(ModifyKind::Any), "/etc/gm/httpd.toml.swp"), &name));
        assert!(!touches(&event(EventKind::Remove(RemoveKind::File), "/etc/gm/httpd.toml"), &name));
    }

    #[test]
    fn bare_file_name_watches_current_dir() {
        assert_eq!(watch_dir(Path::new("httpd.toml")), PathBuf::from("."));
        assert_eq!(watch_dir(Path::new("/etc/gm/httpd.toml")), PathBuf::from("/etc/gm"));
    }

    #[tokio::test]
    async fn rename_over_file_sends_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("httpd.toml");
        std::fs::write(&path, "[listener]\nbind_address = \":8080\"\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path);
        let _watcher = watcher.run().unwrap();

        // Save the way editors do: write a sibling, then rename it over.
        let staged = dir.path().join("httpd.toml.tmp");
        std::fs::write(&staged, "[listener]\nbind_address = \":9191\"\n").unwrap();
        std::fs::rename(&staged, &path).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let update = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("no config update before deadline")
                .expect("watcher channel closed");
            if update.listener.bind_address == ":9191" {
                break;
            }
        }
    }
}
