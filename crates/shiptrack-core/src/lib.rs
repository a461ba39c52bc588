//! # Shiptrack Core
//!
//! Work-item tracking from ticket to deployment against the GitHub REST API.
//!
//! The crate is split into:
//! - **http**: typed GitHub and deployment-trigger clients
//! - **scrape**: pure scanners for CI logs and declared-version config files
//! - **coordination**: the state resolver, tag resolution, release
//!   pipelines and the single-flight sync driver
//! - **settings** / **store** / **secrets**: on-disk collaborators
//!
//! Everything that talks to the outside world sits behind a trait in
//! [`traits`], so the coordination layer runs against in-memory fakes in
//! tests.
//!
//! ## Example
//!
//! ```no_run
//! use shiptrack_core::coordination::{RefreshScope, SyncDriver};
//! use shiptrack_core::http::GitHubApiClient;
//! use shiptrack_core::notify::LogNotifier;
//! use shiptrack_core::secrets::ChainedSecretStore;
//! use shiptrack_core::settings::Settings;
//! use shiptrack_core::store::WorkItemStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> shiptrack_core::Result<()> {
//! let settings = Settings::load(&Settings::default_path()?)?;
//! let api = Arc::new(GitHubApiClient::from_env(Arc::new(ChainedSecretStore::user_default()?)));
//!
//! let driver = SyncDriver::new(api, Arc::new(LogNotifier), settings.driver_config())
//!     .with_store(WorkItemStore::default_location()?)?;
//! let summary = driver.request_refresh(RefreshScope::All).await?;
//! println!("refreshed {} items", summary.refreshed());
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]

pub mod coordination;
pub mod error;
pub mod http;
pub mod notify;
pub mod scrape;
pub mod secrets;
pub mod settings;
pub mod store;
pub mod traits;
pub mod types;
pub mod vcs;

pub use error::{Error, ErrorKind, Result};
pub use scrape::{extract_module_versions, extract_tag, replace_declared_version, ScrapeError};
pub use types::{
    CheckState, DeclaredKey, DeploymentRepoConfig, ModuleVersionMap, PrState, RepoId,
    SourceRepoConfig, WebDeployTarget, WorkItem,
};
