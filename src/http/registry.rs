//! Handler registration and pattern lookup.
//!
//! # Matching
//! ```text
//! "/status"   matches "/status" only
//! "/static/"  matches "/static/" and everything below it
//! "/"         matches every path (lowest priority subtree)
//! ```
//! Exact patterns win over subtrees; among subtrees the longest wins.

use std::sync::Arc;

use dashmap::DashMap;

use crate::http::handler::Handler;

/// Error type for handler registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pattern {0:?}: must start with '/'")]
pub struct InvalidPattern(pub String);

/// Concurrent pattern → handler table.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `pattern`, replacing any previous one.
    pub fn register(&self, pattern: &str, handler: Arc<dyn Handler>) -> Result<(), InvalidPattern> {
        if !pattern.starts_with('/') {
            return Err(InvalidPattern(pattern.to_string()));
        }
        if self.handlers.insert(pattern.to_string(), handler).is_some() {
            tracing::debug!(pattern, "Replaced handler");
        } else {
            tracing::debug!(pattern, "Registered handler");
        }
        Ok(())
    }

    /// Find the handler for a request path.
    pub fn lookup(&self, path: &str) -> Option<Arc<dyn Handler>> {
        if let Some(handler) = self.handlers.get(path) {
            return Some(Arc::clone(handler.value()));
        }

        self.handlers
            .iter()
            .filter(|entry| entry.key().ends_with('/') && path.starts_with(entry.key().as_str()))
            .max_by_key(|entry| entry.key().len())
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
