// src/deploy/deployer.rs
use super::client::{Credential, N8nClient};
use super::DeployError;
use crate::config::{DeployConfig, PostgresCredentialConfig};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

pub const DRY_RUN_CREDENTIAL_ID: &str = "dry-run-credential-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployAction {
    Created,
    Updated,
    Skipped,
}

impl std::fmt::Display for DeployAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeployAction::Created => "created",
            DeployAction::Updated => "updated",
            DeployAction::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentResult {
    pub workflow: String,
    pub status: DeployStatus,
    pub action: DeployAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentResult {
    fn failed(workflow: String, error: impl ToString) -> Self {
        Self {
            workflow,
            status: DeployStatus::Failed,
            action: DeployAction::Skipped,
            id: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploymentSummary {
    pub results: Vec<DeploymentResult>,
}

impl DeploymentSummary {
    pub fn successful(&self) -> impl Iterator<Item = &DeploymentResult> {
        self.results
            .iter()
            .filter(|r| r.status == DeployStatus::Success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeploymentResult> {
        self.results
            .iter()
            .filter(|r| r.status == DeployStatus::Failed)
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn log(&self) {
        info!("Deployment summary: {} successful", self.successful().count());
        for result in self.successful() {
            info!("  - {} ({})", result.workflow, result.action);
        }

        let failed: Vec<_> = self.failed().collect();
        if !failed.is_empty() {
            error!("{} deployment(s) failed", failed.len());
            for result in failed {
                error!(
                    "  - {}: {}",
                    result.workflow,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}

/// Create-or-update-then-activate for n8n workflow files.
pub struct Deployer {
    client: N8nClient,
    credential: PostgresCredentialConfig,
    dry_run: bool,
}

impl Deployer {
    pub fn new(config: &DeployConfig) -> Result<Self, DeployError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(DeployError::MissingApiKey)?;

        Ok(Self {
            client: N8nClient::new(config.n8n_url.clone(), api_key)?,
            credential: config.credential.clone(),
            dry_run: config.dry_run,
        })
    }

    pub fn n8n_url(&self) -> &str {
        self.client.base_url()
    }

    /// Deploy one workflow file. Every failure is reported in the result.
    pub async fn deploy_file(&self, path: &Path) -> DeploymentResult {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if tokio::fs::metadata(path).await.is_err() {
            return DeploymentResult::failed(file_name, "File not found");
        }

        match self.upsert_and_activate(path).await {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to deploy {}: {}", file_name, e);
                DeploymentResult::failed(file_name, e)
            }
        }
    }

    async fn upsert_and_activate(&self, path: &Path) -> Result<DeploymentResult, DeployError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let workflow: Value = serde_json::from_str(&contents)?;
        let name = workflow
            .get("name")
            .and_then(Value::as_str)
            .ok_or(DeployError::MissingName)?
            .to_string();

        info!("Deploying workflow: {}", name);

        if self.dry_run {
            info!("[dry-run] Would deploy workflow: {}", name);
            return Ok(DeploymentResult {
                workflow: name,
                status: DeployStatus::Success,
                action: DeployAction::Skipped,
                id: None,
                error: None,
            });
        }

        let existing = self
            .client
            .find_workflow_by_name(&name)
            .await?
            .and_then(|w| w.id);

        let (id, action) = match existing {
            Some(id) => {
                info!("Updating existing workflow (ID: {})", id);
                self.client.update_workflow(&id, &workflow).await?;
                (id, DeployAction::Updated)
            }
            None => {
                info!("Creating new workflow");
                let created = self.client.create_workflow(&workflow).await?;
                let id = created
                    .id
                    .ok_or_else(|| DeployError::MissingId(name.clone()))?;
                (id, DeployAction::Created)
            }
        };

        self.client.activate_workflow(&id).await?;
        info!("Workflow {} {} and activated (ID: {})", name, action, id);

        Ok(DeploymentResult {
            workflow: name,
            status: DeployStatus::Success,
            action,
            id: Some(id),
            error: None,
        })
    }

    /// Deploy every `*.json` in `dir` (except `package.json`), in name order.
    pub async fn deploy_dir(&self, dir: &Path) -> Result<DeploymentSummary, DeployError> {
        let files = workflow_files(dir).await?;
        if files.is_empty() {
            warn!("No workflow files found in {}", dir.display());
            return Ok(DeploymentSummary::default());
        }

        info!("Found {} workflow(s) to deploy", files.len());

        let mut summary = DeploymentSummary::default();
        for file in files {
            summary.results.push(self.deploy_file(&file).await);
        }
        Ok(summary)
    }

    /// Create or update the PostgreSQL credential workflows connect with.
    ///
    /// Failure is not fatal: workflows can still be wired up by hand.
    pub async fn configure_credential(&self) -> Option<String> {
        if self.dry_run {
            info!(
                "[dry-run] Would configure PostgreSQL credential: {}",
                self.credential.name
            );
            return Some(DRY_RUN_CREDENTIAL_ID.to_string());
        }

        match self.upsert_credential().await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to configure PostgreSQL credential: {}", e);
                warn!("Workflows may need manual credential configuration");
                None
            }
        }
    }

    async fn upsert_credential(&self) -> Result<Option<String>, DeployError> {
        let credential = postgres_credential(&self.credential);
        let existing = self
            .client
            .find_credential_by_name(&credential.name)
            .await?
            .and_then(|c| c.id);

        match existing {
            Some(id) => {
                info!("Updating existing PostgreSQL credential (ID: {})", id);
                self.client.update_credential(&id, &credential).await?;
                Ok(Some(id))
            }
            None => {
                info!("Creating new PostgreSQL credential");
                let created = self.client.create_credential(&credential).await?;
                Ok(created.id)
            }
        }
    }
}

fn postgres_credential(config: &PostgresCredentialConfig) -> Credential {
    Credential {
        id: None,
        name: config.name.clone(),
        kind: "postgres".to_string(),
        data: Some(json!({
            "host": config.host,
            "database": config.database,
            "user": config.user,
            "password": config.password,
            "port": config.port,
            "ssl": config.ssl,
        })),
    }
}

async fn workflow_files(dir: &Path) -> Result<Vec<PathBuf>, DeployError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DeployError::WorkflowsDirMissing(dir.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        let is_package = path.file_name().and_then(|name| name.to_str()) == Some("package.json");
        if is_json && !is_package {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
