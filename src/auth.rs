//! Auth-domain identifiers, tenant scopes, secrets, and the per-scope credential profile.

pub mod id;
pub mod profile;
pub mod scope;
pub mod secret;

pub use id::*;
pub use profile::*;
pub use scope::*;
pub use secret::*;
