//! Remote video host integration for vodtube.
//!
//! - [`YoutubeClient`]: YouTube Data API v3 (resumable insert, snippet
//!   update, playlist items)
//! - [`CredentialManager`]: OAuth2 refresh of the stored credential
//! - [`ResumableTransfer`]: streams a local file with progress callbacks
//!
//! The upload pipeline depends only on [`VideoHost`] and [`HostConnector`].

pub mod client;
pub mod error;
pub mod host;
pub mod oauth;
pub mod transfer;
pub mod types;

pub use client::{YoutubeClient, YoutubeConfig};
pub use error::{YoutubeError, YoutubeResult};
pub use host::{HostConnector, MediaBody, MediaStream, VideoHost};
pub use oauth::{CredentialManager, OAuthConfig};
pub use transfer::{ProgressReader, ResumableTransfer};
