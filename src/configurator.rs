//! Top-level flow: load config, authenticate, upload scripts, run them.

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use std::path::PathBuf;

use crate::config::{ConfigDocument, read_config};
use crate::credentials::{collect_passwords, nexus_client};
use crate::http::{HttpClient, RetryPolicy, default_client};
use crate::nexus::ScriptApi;
use crate::runtime::Runtime;
use crate::scripts::upload_scripts;
use crate::source::S3Store;

/// Everything a configuration run needs to know.
#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub user: String,
    pub password: String,
    pub credential_file: Option<String>,
    pub groovy_dir: PathBuf,
    pub config: String,
    pub delete_existing: bool,
    pub retry: RetryPolicy,
}

/// Runs every script invocation of `config` in order and prints each result.
///
/// Stops at the first failing run.
pub async fn apply<A: ScriptApi + ?Sized>(api: &A, config: &ConfigDocument) -> Result<usize> {
    let mut runs = 0;

    for step in &config.steps {
        for script_runs in &step.scripts {
            let script = &script_runs.script;
            for parameters in &script_runs.parameter_sets {
                let body = serde_json::to_string(parameters)
                    .context("Failed to serialize script parameters")?;
                debug!("Running {} with {}", script, body);

                let result = api
                    .run_script(script, &body)
                    .await
                    .with_context(|| format!("Failed to run script {}", script))?;
                println!("{} result: {}", script, result.result());
                runs += 1;
            }
        }
    }

    Ok(runs)
}

/// Configures one Nexus instance end to end.
///
/// The configuration document is read and validated first, before any
/// credential is tried or any script uploaded, so a missing or malformed
/// document leaves the server untouched. Then the first accepted password
/// selects the client, existing scripts are optionally deleted, every script
/// in the Groovy directory is uploaded and the document is applied.
#[tracing::instrument(skip(runtime, options), fields(host = %options.host))]
pub async fn run<R: Runtime + ?Sized>(runtime: &R, options: Options) -> Result<()> {
    info!("Starting");

    let client = default_client().context("Failed to create HTTP client")?;
    // Documents are fetched without the Nexus credentials
    let fetcher = HttpClient::new(client.clone(), options.retry.clone());
    let objects = S3Store::new();

    let config = read_config(runtime, &fetcher, &objects, &options.config).await?;

    let passwords = collect_passwords(
        runtime,
        &fetcher,
        &objects,
        &options.password,
        options.credential_file.as_deref(),
    )
    .await
    .context("Failed to read credential file")?;

    info!("Creating nexus client...");
    let nexus = nexus_client(
        client,
        &options.host,
        &options.user,
        &passwords,
        options.retry,
    )
    .await
    .context("Failed to create Nexus client")?
    .ok_or_else(|| anyhow!("No valid Nexus client"))?;

    if options.delete_existing {
        info!("Deleting existing scripts...");
        let deleted = nexus
            .delete_all_scripts()
            .await
            .context("Failed to delete existing scripts")?;
        info!("Deleted {} scripts", deleted);
    }

    info!("Uploading scripts...");
    let uploaded = upload_scripts(runtime, &nexus, &options.groovy_dir).await?;
    info!("Uploaded {} scripts", uploaded);

    let runs = apply(&nexus, &config).await?;
    info!("Done. {} script runs", runs);
    Ok(())
}
