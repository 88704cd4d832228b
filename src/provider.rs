//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata ([`ProviderDescriptor`]) covering the HTTPS-only
//! OAuth endpoints, the analytics API bases, the requested scopes, and the client
//! authentication preference. `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic
//! hook used by flows to decorate consent URLs and map token failures into the bridge error
//! taxonomy.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
