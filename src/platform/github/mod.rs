pub mod auth;
pub mod client;
pub mod mapper;

pub use auth::{KeyringStore, SecretStore, TokenResolver, TokenSource};
pub use client::GitHubPlatform;
