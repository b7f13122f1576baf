//! HTTP API for the browser front-end
//!
//! This module provides a REST API over sessions and the catalog:
//! - POST /sessions - Start a capture session
//! - POST /sessions/:id/chunks - Append a fragment
//! - POST /sessions/:id/stop - Finalize and upload
//! - GET /sessions/:id - Query session status
//! - GET /sessions/:id/blob - Download the local clip
//! - DELETE /sessions/:id - Discard a session
//! - GET /recordings - Refresh and list stored recordings
//! - DELETE /recordings/*key - Delete a stored recording
//! - GET /objects/*key - Serve a signed object URL
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, SessionRetention};
