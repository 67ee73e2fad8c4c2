pub mod config;
pub mod configurator;
pub mod credentials;
pub mod http;
pub mod nexus;
pub mod runtime;
pub mod scripts;
pub mod source;
