//! Identifiers, credential pairs, and the whitelist authorization cache.

pub mod credential;
pub mod id;
pub mod whitelist;

pub use credential::*;
pub use id::*;
pub use whitelist::*;
