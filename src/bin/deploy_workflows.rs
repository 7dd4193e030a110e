// src/bin/deploy_workflows.rs
//! Usage:
//!   deploy-workflows [--dry-run]            deploy every workflow in the directory
//!   deploy-workflows [--dry-run] <file>     deploy a single workflow file
//!
//! Set `JOBAPP_CONFIG` to load a config file; otherwise defaults and environment apply.
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use jobapp_ops::deploy::{DeployStatus, Deployer};

#[tokio::main]
async fn main() -> Result<()> {
    jobapp_ops::init_tracing()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let dry_run = args.iter().any(|arg| arg == "--dry-run");
    let workflow_file = args
        .iter()
        .find(|arg| !arg.starts_with("--"))
        .map(PathBuf::from);
    let deploy_all = args.iter().any(|arg| arg == "--all") || workflow_file.is_none();

    let mut config = match std::env::var("JOBAPP_CONFIG") {
        Ok(path) => jobapp_ops::config::load_config(path).await?,
        Err(_) => jobapp_ops::config::from_env()?,
    };
    config.deploy.dry_run |= dry_run;

    let deployer = Deployer::new(&config.deploy)?;
    info!("n8n URL: {}", deployer.n8n_url());
    if config.deploy.dry_run {
        info!("DRY-RUN MODE: no changes will be made");
    }

    if deploy_all {
        deployer.configure_credential().await;

        let summary = deployer
            .deploy_dir(Path::new(&config.deploy.workflows_dir))
            .await?;
        summary.log();
        info!("Access n8n UI: {}", deployer.n8n_url());

        if summary.has_failures() {
            bail!("one or more workflow deployments failed");
        }
    } else if let Some(file) = workflow_file {
        let result = deployer.deploy_file(&file).await;
        if result.status == DeployStatus::Failed {
            let reason = result.error.unwrap_or_default();
            error!("Deployment failed: {}", reason);
            bail!("deployment of {} failed: {}", result.workflow, reason);
        }
        info!("Access n8n UI: {}", deployer.n8n_url());
    }

    Ok(())
}

