//! Session resolution: which agent and session an inbound message belongs to.

pub mod resolve;

pub use resolve::{ResolvedRoute, resolve_route};
