//! # Ports Layer
//!
//! - `inbound.rs` - Driving port: the async API the ledger exposes
//! - `outbound.rs` - Driven ports: transactional store, counter source, policy

pub mod inbound;
pub mod outbound;
