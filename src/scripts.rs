//! Discovery and upload of the Groovy scripts in a directory.

use anyhow::{Context, Result, bail};
use log::debug;
use std::path::{Path, PathBuf};

use crate::nexus::ScriptApi;
use crate::runtime::Runtime;

/// File extension of uploadable scripts.
pub const SCRIPT_EXTENSION: &str = "groovy";

/// Glob pattern matching every script directly inside `dir`.
pub fn script_pattern(dir: &Path) -> String {
    let dir = glob::Pattern::escape(&dir.to_string_lossy());
    let dir = dir.trim_end_matches(['/', '\\']);
    if dir.is_empty() {
        format!("*.{}", SCRIPT_EXTENSION)
    } else {
        format!("{}/*.{}", dir, SCRIPT_EXTENSION)
    }
}

/// Script name a file is uploaded under: its file name without extension.
pub fn script_name(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

/// Lists the scripts in `dir`, sorted by path. Fails if there are none.
pub fn find_scripts<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = script_pattern(dir);
    let mut scripts = runtime.glob(&pattern)?;
    if scripts.is_empty() {
        bail!("No groovy scripts found at {}", pattern);
    }
    scripts.sort();
    debug!("Found {} scripts matching {}", scripts.len(), pattern);
    Ok(scripts)
}

/// Uploads every script in `dir`, replacing scripts of the same name.
#[tracing::instrument(skip(runtime, api))]
pub async fn upload_scripts<R, A>(runtime: &R, api: &A, dir: &Path) -> Result<usize>
where
    R: Runtime + ?Sized,
    A: ScriptApi + ?Sized,
{
    let scripts = find_scripts(runtime, dir)?;

    for path in &scripts {
        let name = script_name(path)
            .with_context(|| format!("Cannot derive a script name from {}", path.display()))?;
        let content = runtime.read_to_string(path)?;

        println!("Uploading {} to Nexus", path.display());
        api.create_or_update_script(&name, &content)
            .await
            .with_context(|| format!("Failed to upload script {}", name))?;
    }

    Ok(scripts.len())
}
