//! # Routelog Server
//!
//! Request handling for the Routelog backend.
//!
//! This crate provides:
//! - Route parsing from method, path, query and body
//! - Account, log and admin handlers on top of `routelog_core`
//! - Admin token checks
//! - Error to status code mapping
//!
//! # Architecture
//!
//! The handler is transport-agnostic. Whatever receives the HTTP request
//! builds a [`RawRequest`], awaits [`RequestHandler::handle_raw`] and writes
//! the returned [`Response`] back. HTML pages and CORS headers belong to
//! the transport.
//!
//! ```rust,ignore
//! use routelog_server::{RawRequest, RequestHandler, ServerConfig};
//!
//! let handler = RequestHandler::new(&ServerConfig::new().with_admin_token(token), kv, objects, clock);
//! let response = handler
//!     .handle_raw(&RawRequest::new("GET", "/admin/deleted").with_query("adminToken", token))
//!     .await;
//! assert_eq!(response.status, 200);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;

pub use auth::AdminGuard;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{RawRequest, Request, RequestHandler, Response, TEXT_CONTENT_TYPE};
