//! The configuration document: which scripts to run, in which order, with
//! which parameters.
//!
//! The document is a Jinja template rendered against the process environment
//! (`{{ env['NEXUS_BLOBSTORE'] }}`) and then parsed as YAML:
//!
//! ```yaml
//! - setup_anonymous_access:
//!     - anonymous_access: true
//! - create_blobstore:
//!     - name: npm
//!     - name: docker
//! ```

use log::debug;
use minijinja::{Environment, context};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::http::HttpClient;
use crate::runtime::Runtime;
use crate::source::{FetchError, ObjectStore, fetch_contents};

/// Parameters of one script run.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// All steps of a configuration, in document order.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    pub steps: Vec<ConfigStep>,
}

/// One list entry of the document: script names mapped to their runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigStep {
    pub scripts: Vec<ScriptRuns>,
}

/// A script and the parameter sets it is run with, one run per set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRuns {
    pub script: String,
    pub parameter_sets: Vec<Parameters>,
}

impl ConfigDocument {
    /// Number of script runs the document asks for.
    pub fn run_count(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|step| &step.scripts)
            .map(|runs| runs.parameter_sets.len())
            .sum()
    }
}

// Keeps script order within a step as written.
impl<'de> Deserialize<'de> for ConfigStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StepVisitor;

        impl<'de> Visitor<'de> for StepVisitor {
            type Value = ConfigStep;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of script names to lists of parameter sets")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ConfigStep, A::Error> {
                let mut scripts: Vec<ScriptRuns> = Vec::new();
                while let Some((script, parameter_sets)) =
                    map.next_entry::<String, Vec<Parameters>>()?
                {
                    if scripts.iter().any(|runs| runs.script == script) {
                        return Err(de::Error::custom(format!(
                            "script '{}' appears twice in the same step",
                            script
                        )));
                    }
                    scripts.push(ScriptRuns {
                        script,
                        parameter_sets,
                    });
                }
                Ok(ConfigStep { scripts })
            }
        }

        deserializer.deserialize_map(StepVisitor)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    NotFound(String),
    Fetch(FetchError),
    Render {
        location: String,
        source: minijinja::Error,
    },
    Parse {
        location: String,
        source: serde_yaml::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound(location) => write!(f, "No config file found at {}", location),
            ConfigError::Fetch(source) => write!(f, "Failed to read config file: {}", source),
            ConfigError::Render { location, source } => {
                write!(f, "Failure to render template found at {}: {}", location, source)
            }
            ConfigError::Parse { location, source } => {
                write!(f, "Failure to parse yaml file found at {}: {}", location, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::NotFound(_) => None,
            ConfigError::Fetch(source) => Some(source),
            ConfigError::Render { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Renders `template` with the environment available as `env`.
///
/// Undefined variables render as empty strings.
pub fn render(template: &str, env: &BTreeMap<String, String>) -> Result<String, minijinja::Error> {
    let environment = Environment::new();
    environment.render_str(template, context! { env => env })
}

/// Renders and parses configuration text read from `location`.
pub fn process_config(
    location: &str,
    text: &str,
    env: &BTreeMap<String, String>,
) -> Result<ConfigDocument, ConfigError> {
    let rendered = render(text, env).map_err(|source| ConfigError::Render {
        location: location.to_string(),
        source,
    })?;
    serde_yaml::from_str(&rendered).map_err(|source| ConfigError::Parse {
        location: location.to_string(),
        source,
    })
}

/// Fetches, renders and parses the configuration at `location`.
#[tracing::instrument(skip(runtime, http, objects))]
pub async fn read_config<R, S>(
    runtime: &R,
    http: &HttpClient,
    objects: &S,
    location: &str,
) -> Result<ConfigDocument, ConfigError>
where
    R: Runtime + ?Sized,
    S: ObjectStore + ?Sized,
{
    let text = fetch_contents(runtime, http, objects, location)
        .await
        .map_err(|e| match e {
            FetchError::NotFound(location) => ConfigError::NotFound(location),
            other => ConfigError::Fetch(other),
        })?;

    let config = process_config(location, &text, &runtime.env_vars())?;
    debug!(
        "Loaded {} steps ({} runs) from {}",
        config.steps.len(),
        config.run_count(),
        location
    );
    Ok(config)
}
