//! TTL caches: the shared ordered map, request fingerprints, and the response cache.

pub mod fingerprint;
pub mod response;
pub mod ttl;

pub use fingerprint::*;
pub use response::*;
pub use ttl::*;
