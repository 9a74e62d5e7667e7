//! Matterflow platform adapter.
//!
//! Implements the [`coordination::Authorizer`] and
//! [`coordination::NotificationHook`] ports against the external platform
//! over HTTP, and provides local stand-ins for development and tests.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport, authentication headers and response
//! decoding live here. The engine sees only the port traits.
//!
//! ## Backends
//!
//! | Type | `Authorizer` | `NotificationHook` |
//! |------|--------------|--------------------|
//! | [`HttpPlatformClient`] | `POST /authorize` | `POST /notifications` |
//! | [`AllowAllAuthorizer`] | always `true` | |
//! | [`TracingNotifier`] | | structured log line |

pub mod error;
pub mod http;
pub mod local;

pub use error::PlatformError;
pub use http::{HttpPlatformClient, PlatformSettings};
pub use local::{AllowAllAuthorizer, TracingNotifier};
