//! Environment variables.

use std::collections::BTreeMap;
use std::env;

use super::RealRuntime;

impl RealRuntime {
    /// Variables whose name or value is not valid unicode are skipped.
    #[tracing::instrument(skip(self))]
    pub(crate) fn env_vars_impl(&self) -> BTreeMap<String, String> {
        env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }
}
