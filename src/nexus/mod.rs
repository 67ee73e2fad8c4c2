//! Client for the Nexus script API.

mod client;
mod error;
mod types;

#[cfg(test)]
pub use client::MockScriptApi;
pub use client::{API_PREFIX, NexusClient, PING_PATH, SCRIPT_TYPE, ScriptApi, delete_all_scripts};
pub use error::ConnectError;
pub use types::{ScriptDescriptor, ScriptPayload, ScriptRunResult};
