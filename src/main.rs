use anyhow::Result;
use clap::Parser;
use nexus_configurator::configurator::{self, Options};
use nexus_configurator::credentials::DEFAULT_USER;
use nexus_configurator::http::RetryPolicy;
use std::path::PathBuf;

/// nexus-configurator - upload Groovy scripts to Nexus and run them
///
/// Every option can also be set through the environment variable shown
/// next to it.
///
/// Examples:
///   nexus-configurator --config nexus.yaml
///   nexus-configurator --host https://nexus.example.com -c s3cret.txt --config https://configserver/nexus.yaml
#[derive(Parser, Debug)]
#[command(author, version = env!("NEXUS_CONFIGURATOR_VERSION"), about)]
struct Cli {
    /// Base URL where Nexus is available
    #[arg(long, env = "NEXUS_HOST", default_value = "http://localhost:8081")]
    host: String,

    /// Admin user to authenticate as
    #[arg(short = 'u', long, env = "NEXUS_ADMIN_USER", default_value = DEFAULT_USER)]
    user: String,

    /// Password for the admin user
    #[arg(
        short = 'p',
        long,
        env = "NEXUS_ADMIN_PASSWORD",
        default_value = "admin123",
        hide_env_values = true
    )]
    password: String,

    /// File or URL with further passwords to try, one per line
    #[arg(
        short = 'c',
        long = "credential_file",
        alias = "credential-file",
        env = "NEXUS_CREDENTIAL_FILE",
        value_name = "PATH|URL"
    )]
    credential_file: Option<String>,

    /// Directory containing the Groovy scripts to upload
    #[arg(
        short = 'g',
        long = "groovy_dir",
        alias = "groovy-dir",
        env = "NEXUS_GROOVY_DIR",
        default_value = "groovy",
        value_name = "DIR"
    )]
    groovy_dir: PathBuf,

    /// YAML configuration file path or URL
    #[arg(long, env = "NEXUS_CONFIG_FILE", value_name = "PATH|URL")]
    config: String,

    /// Delete every script on the server before uploading
    #[arg(long, env = "NEXUS_DELETE_EXISTING")]
    delete_existing: bool,
}

impl Cli {
    fn into_options(self) -> Options {
        Options {
            host: self.host,
            user: self.user,
            password: self.password,
            credential_file: self.credential_file,
            groovy_dir: self.groovy_dir,
            config: self.config,
            delete_existing: self.delete_existing,
            retry: RetryPolicy::default(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let runtime = nexus_configurator::runtime::RealRuntime;

    configurator::run(&runtime, cli.into_options()).await
}
