//! Lifecycle engine for regulated authorization requests.
//!
//! The pipeline routes applications through four desks (intake, technical
//! review, directorate, regulator) until a resolution or certificate is
//! issued. This crate owns the state machine, the append-only history and
//! audit trails, the per-field compliance reviews, and the stage inboxes;
//! transport, storage, and downstream collaborators plug in through the
//! traits in [`pipeline::requests::repository`].

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
