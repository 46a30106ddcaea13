pub mod error;
pub mod types;
pub mod config;
pub mod store;
pub mod subscription;
pub mod conversation;
pub mod session;
pub mod provider;
pub mod image;
pub mod channel;
pub mod service;
pub mod util;

#[cfg(test)]
mod testing;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Short commit hash embedded at build time, or `unknown`.
pub const GIT_HASH: &str = env!("GIT_HASH");
