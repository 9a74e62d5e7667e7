//! Matterflow coordination engine.
//!
//! [`CoordinationEngine`] exposes one async method per coordination
//! operation. Every mutating method authorizes the actor, reads current state
//! from the [`coordination::CoordinationStore`], applies the pure rule from
//! the [`coordination`] crate and commits the mutation together with its
//! history event under the matter's optimistic version. The notification
//! hook runs in the background after the commit.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The engine sequences calls between business logic
//! in [`coordination`] and the injected ports. It contains no domain rules of
//! its own and never retries; callers wrap operations in
//! [`retry_on_conflict`] when they want conflicts absorbed.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`coordinator`] | [`CoordinationEngine`] and the shared operation steps |
//! | [`transitions`] | Stage transitions, progress, review and closure |
//! | [`materializer`] | Template materialization, manual tasks, task updates, stage readiness |
//! | [`negotiation`] | Meeting request / accept / reschedule / cancel / complete |
//! | [`history`] | The append step, timeline and replay |
//! | [`assignments`] | Assignment registry |
//! | [`cache`] | Read-through catalog cache |
//! | [`retry`] | Caller-level retry with back-off |
//! | [`settings`] | [`EngineSettings`] and [`RetrySettings`] |

pub mod assignments;
pub mod cache;
pub mod coordinator;
pub mod history;
pub mod materializer;
pub mod negotiation;
pub mod retry;
pub mod settings;
pub mod transitions;

pub use cache::CachedCatalog;
pub use coordinator::CoordinationEngine;
pub use materializer::StageReadiness;
pub use retry::retry_on_conflict;
pub use settings::{EngineSettings, RetrySettings};
