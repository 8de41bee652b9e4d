//! A small Rust client for the Zuora AQuA batch-query API.
//!
//! This crate implements the AQuA flow:
//! exchange OAuth client credentials for a bearer token, submit one or more
//! ZOQL export queries as a job, poll until the job completes, then download
//! one CSV result file per query.
//!
//! ## Quick start
//! - Describe environments in `~/.zacc.ini` (see [`load_environment`]).
//! - Connect a [`ZuoraClient`] and call [`ZuoraClient::query`].
//!
//! ```no_run
//! use zacc::{ClientConfig, Credentials, Endpoints, ZuoraClient};
//!
//! fn main() -> zacc::Result<()> {
//!     let config = ClientConfig::new(
//!         Credentials::new("client-id", "client-secret"),
//!         Endpoints::sandbox(),
//!     );
//!     let client = ZuoraClient::connect(config)?;
//!     let csv = client.query(&["select Id, Name from Account".to_string()])?;
//!     println!("{}", csv.join("\n"));
//!     Ok(())
//! }
//! ```
//!
//! The `zacc` binary wraps this with `bearer`, `describe` and `query` commands.

#![forbid(unsafe_code)]

pub mod cli;
mod client;
mod config;
pub mod describe;
mod error;
mod input;
pub mod job;
mod util;

pub use client::{
    ClientConfig, Credentials, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL, Endpoints, ZuoraClient,
};
pub use config::{Environment, default_config_path, load_environment};
pub use describe::{ResourceDescription, render_description};
pub use error::{Error, Result};
pub use input::{QuerySource, split_queries};
pub use job::{JobOptions, JobState, JobStatus, poll_until_complete};
