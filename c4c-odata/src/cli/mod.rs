//! Command line front end

pub mod commands;
pub mod output;

use anyhow::{Context, Result};
use clap::Args;
use log::debug;

use c4c_odata::api::{ODataClient, ODataVersion};
use c4c_odata::config::ODataConfig;

/// Connection overrides shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Service root, overrides C4C_ODATA_ENDPOINT and the config file
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Basic auth user
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Basic auth password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Protocol version of the service (v2 or v4)
    #[arg(long = "odata-version", global = true)]
    pub version: Option<ODataVersion>,
}

impl ConnectionArgs {
    /// Apply command line overrides on top of a loaded configuration
    pub fn apply(&self, mut config: ODataConfig) -> ODataConfig {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(user) = &self.user {
            config.username = Some(user.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(version) = self.version {
            config.version = version;
        }
        config
    }
}

/// Load configuration, apply overrides and build a client
pub fn connect(args: &ConnectionArgs) -> Result<ODataClient> {
    let config = args.apply(ODataConfig::load().context("Failed to load configuration")?);
    debug!("Connecting to {} ({})", config.endpoint, config.version);

    ODataClient::from_config(&config).with_context(|| {
        format!(
            "Failed to create client. Set C4C_ODATA_ENDPOINT or pass --endpoint (current: '{}')",
            config.endpoint
        )
    })
}
