pub mod client;
pub mod resolver;

pub use client::{HttpRegistryClient, RegistryConfig};
pub use resolver::{CachingIdentityResolver, ResolverConfig};
