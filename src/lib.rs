//! # remini
//!
//! Client for the (unofficial) Remini mobile image-enhancement API. It impersonates
//! the Android app: bootstraps a device identity, acquires and caches a session
//! token, then drives the asynchronous task lifecycle
//! (create → upload → trigger → poll → optionally reprocess → download).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use remini::{Config, Remini};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // The library only logs through the `log` facade; install a logger first.
//!
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let client = Remini::new(&config)?;
//!
//!     // Plain enhancement, written to the current directory
//!     let out = client.enhance(Path::new("photo.jpg"), None).await?;
//!     println!("Enhanced: {}", out.display());
//!
//!     // A style pipeline on top of an enhanced base
//!     client
//!         .stylize(Path::new("photo.jpg"), "toon", Some(Path::new("toon.jpg")))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The workflow pieces can be driven one at a time:
//!
//! ```rust,no_run
//! use remini::config::Config;
//! use remini::device::DeviceIdentity;
//! use remini::poll::StatusPoller;
//! use remini::session::SessionManager;
//! use remini::task::{FeatureRequest, TaskSubmitter};
//! use remini::token::TokenStore;
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> remini::Result<()> {
//! let config = Config::default();
//! let session = Arc::new(SessionManager::new(
//!     reqwest::Client::new(),
//!     config.api.clone(),
//!     DeviceIdentity::generate(),
//!     TokenStore::new(config.token_path()),
//!     Duration::from_secs(30),
//! ));
//! session.ensure_authenticated().await?;
//!
//! let submitter = TaskSubmitter::new(session.clone(), config.task.clone(), Duration::from_secs(120), None);
//! let task = submitter.submit(Path::new("photo.jpg"), &FeatureRequest::Enhance).await?;
//! submitter.trigger(&task).await?;
//!
//! let poller = StatusPoller::new(session, config.polling.policy());
//! let url = poller.await_completion(&task, &CancellationToken::new()).await?;
//! println!("Output: {url:?}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: The `enhance` and `stylize` workflows
//! - [`session`]: Token validation and bootstrap
//! - [`task`]: Task creation, upload, and processing trigger
//! - [`poll`]: Status polling with timeout, backoff, and cancellation
//! - [`reprocess`]: Derived (style) tasks
//! - [`download`]: Streaming artifact download
//! - [`device`], [`token`], [`metadata`]: Device identity, token cache, image facts
//! - [`config`]: Configuration types and loading/saving
//! - [`pipeline`]: Batch helpers used by the CLI

pub mod client;
pub mod config;
pub mod device;
pub mod download;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod poll;
pub mod reprocess;
pub mod session;
pub mod task;
pub mod token;

pub use client::Remini;
pub use config::Config;
pub use error::{Error, Result};
