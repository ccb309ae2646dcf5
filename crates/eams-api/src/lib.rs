//! eams-api — REST client for the course-selection service.
//!
//! Every endpoint answers with the same JSON envelope:
//!
//! ```text
//! { "result": 0, "message": null, "data": <payload> }
//! ```
//!
//! A non-zero `result` is surfaced as [`ApiError::RemoteRejected`]. HTTP
//! 401/403 and login redirects become [`ApiError::AuthExpired`]; the
//! client never tries to refresh credentials itself.
//!
//! # Write protocol
//!
//! Adds and drops are two-phase. A predicate (dry-run) request is
//! submitted and its result polled by tracking id, then the real request
//! is submitted and polled the same way:
//!
//! ```text
//! add-predicate  ──► predicate-response/{student}/{id}
//! add-request    ──► add-drop-response/{student}/{id}
//! ```
//!
//! [`CourseSelectService`] is the narrow seam the enrollment robber is
//! written against; [`Client`] implements it over HTTP.

pub mod client;
pub mod error;
pub mod models;
pub mod service;

pub use client::{Client, ClientBuilder};
pub use error::{ApiError, ApiResult};
pub use service::{CourseSelectService, OperationKind, OperationRequest, OperationResult};
