//! Authentication state coordination.
//!
//! `AuthCoordinator` owns the observable [`AuthState`], applies the local
//! validation rules, and translates API outcomes into state transitions.
//! Presentation layers watch state snapshots and invoke its operations.

pub mod coordinator;

pub use coordinator::{AuthCoordinator, AuthState};
