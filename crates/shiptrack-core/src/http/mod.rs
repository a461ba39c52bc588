//! HTTP clients for the GitHub API and the deployment-trigger API

pub mod client;
pub mod contents;
pub mod deploy;
pub mod pulls;
pub mod workflows;

pub use client::GitHubApiClient;
pub use deploy::DeployTriggerClient;
