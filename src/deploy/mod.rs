// src/deploy/mod.rs
mod client;
mod deployer;

pub use client::{writable_workflow, Credential, N8nClient, WorkflowSummary, READ_ONLY_WORKFLOW_FIELDS};
pub use deployer::{DeployAction, DeployStatus, Deployer, DeploymentResult, DeploymentSummary};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("N8N_API_KEY is not set")]
    MissingApiKey,

    #[error("Workflows directory not found: {0}")]
    WorkflowsDirMissing(String),

    #[error("Failed to {action}: {status} - {body}")]
    Api {
        action: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("n8n did not return an id for {0}")]
    MissingId(String),

    #[error("Workflow file has no name")]
    MissingName,

    #[error("Invalid workflow JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}
