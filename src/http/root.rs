//! Root welcome page.

use axum::http::StatusCode;

use crate::http::handler::{Handler, HandlerError, HttpRequest, ResponseWriter};
use crate::observability::metrics;

/// Body served at `/`.
pub const WELCOME_HTML: &str = "<html>Welcome to <a href='https://github.com/ossrs/go-oryx-lib/tree/master/gmoryx'>GMOryx(GoMobile Oryx)</a>!</html>";

/// Serves [`WELCOME_HTML`] for every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootHandler;

impl RootHandler {
    pub fn new() -> Self {
        Self
    }

    fn render(&self, writer: &mut ResponseWriter) -> Result<(), HandlerError> {
        writer.set_status(StatusCode::OK);
        writer.write(WELCOME_HTML.as_bytes())?;
        Ok(())
    }
}

impl Handler for RootHandler {
    fn serve_http(&self, writer: &mut ResponseWriter, request: &HttpRequest) {
        if let Err(e) = self.render(writer) {
            metrics::record_handler_failure("render");
            tracing::warn!(
                request_id = request.request_id().unwrap_or("unknown"),
                path = %request.path(),
                error = %e,
                "Root handler failed to render response"
            );
        }
    }
}
