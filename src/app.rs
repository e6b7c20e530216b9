//! Application identifiers, redacted secrets, and the registry of configured apps.

pub mod id;
pub mod registry;
pub mod secret;

pub use id::*;
pub use registry::*;
pub use secret::*;
