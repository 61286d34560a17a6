use crate::config::toml_config::TomlConfig;
use crate::config::{AuthSettings, Settings};
use crate::core::kinds::{ClusterGroupName, ClusterName, NodePoolName, WorkspaceName, ATTACHED};
use crate::core::transport::TransportConfig;
use crate::utils::error::{Result, TmcError};
use crate::utils::validation::{validate_non_empty_string, validate_required_field, Validate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "tmc")]
#[command(about = "Command-line client for the TMC control-plane API")]
pub struct CliConfig {
    /// TOML file with [client], [retry], [auth] and [headers] tables.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    #[arg(long, env = "TMC_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Refresh token exchanged for an access token before the first call.
    #[arg(long, env = "TMC_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    #[arg(long, env = "TMC_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, env = "TMC_ISSUER")]
    pub issuer: Option<String>,

    #[arg(long)]
    pub retry_count: Option<u32>,

    #[arg(long)]
    pub retry_interval_ms: Option<u64>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,

    #[arg(long, help = "Skip TLS certificate verification")]
    pub insecure: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    ClusterGroup,
    Cluster,
    NodePool,
    Workspace,
}

/// Cluster scope shared by cluster and node-pool commands.
#[derive(Debug, Clone, clap::Args)]
pub struct ScopeArgs {
    /// Parent cluster, for node pools.
    #[arg(long)]
    pub cluster: Option<String>,

    #[arg(long, default_value = ATTACHED)]
    pub management_cluster: String,

    #[arg(long, default_value = ATTACHED)]
    pub provisioner: String,
}

impl ScopeArgs {
    /// Full name of the cluster a node pool lives in.
    pub fn parent_cluster(&self) -> Result<ClusterName> {
        let cluster = validate_required_field("--cluster", &self.cluster)?;
        validate_non_empty_string("--cluster", cluster)?;
        self.cluster_named(cluster)
    }

    fn cluster_named(&self, name: &str) -> Result<ClusterName> {
        validate_non_empty_string("--management-cluster", &self.management_cluster)?;
        validate_non_empty_string("--provisioner", &self.provisioner)?;
        Ok(ClusterName::new(
            name,
            &self.management_cluster,
            &self.provisioner,
        ))
    }
}

/// Identifies one resource on the command line.
#[derive(Debug, Clone, clap::Args)]
pub struct NameArgs {
    #[arg(value_enum)]
    pub kind: KindArg,

    pub name: String,

    #[command(flatten)]
    pub scope: ScopeArgs,
}

impl NameArgs {
    fn checked_name(&self) -> Result<&str> {
        validate_non_empty_string("name", &self.name)?;
        Ok(&self.name)
    }

    pub fn cluster_group_name(&self) -> Result<ClusterGroupName> {
        Ok(ClusterGroupName::new(self.checked_name()?))
    }

    pub fn cluster_name(&self) -> Result<ClusterName> {
        self.scope.cluster_named(self.checked_name()?)
    }

    pub fn node_pool_name(&self) -> Result<NodePoolName> {
        let name = self.checked_name()?;
        Ok(NodePoolName::new(self.scope.parent_cluster()?, name))
    }

    pub fn workspace_name(&self) -> Result<WorkspaceName> {
        Ok(WorkspaceName::new(self.checked_name()?))
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print one resource as JSON.
    Get(NameArgs),
    /// List resources of a kind.
    List {
        #[arg(value_enum)]
        kind: KindArg,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    Delete {
        #[command(flatten)]
        target: NameArgs,
        #[arg(long)]
        force: bool,
    },
    /// Create the resource in FILE, or update it if it already exists.
    Apply {
        #[arg(value_enum)]
        kind: KindArg,
        file: PathBuf,
    },
    /// GET an arbitrary API path and print the JSON response.
    Raw { path: String },
}

impl CliConfig {
    /// Layers command-line flags over the optional config file.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => {
                let file = TomlConfig::from_file(path)?;
                file.validate()?;
                file.into_settings()
            }
            None => Settings {
                transport: TransportConfig::default(),
                auth: AuthSettings::None,
                headers: Default::default(),
            },
        };

        if let Some(endpoint) = &self.endpoint {
            settings.transport.host = endpoint.clone();
        }
        if settings.transport.host.is_empty() {
            return Err(TmcError::MissingConfig {
                field: "endpoint".to_string(),
            });
        }
        if let Some(count) = self.retry_count {
            settings.transport.retry_count = count;
        }
        if let Some(interval) = self.retry_interval_ms {
            settings.transport.retry_interval = Duration::from_millis(interval);
        }
        if let Some(timeout) = self.timeout_seconds {
            settings.transport.timeout = Duration::from_secs(timeout);
        }
        if self.insecure {
            settings.transport.accept_invalid_certs = true;
        }

        if self.api_token.is_some() || self.access_token.is_some() {
            let issuer = self.issuer.clone().or_else(|| match &settings.auth {
                AuthSettings::RefreshToken { issuer, .. } => Some(issuer.clone()),
                _ => None,
            });
            settings.auth =
                AuthSettings::from_parts(self.api_token.clone(), self.access_token.clone(), issuer);
        }

        settings.validate()?;
        Ok(settings)
    }
}
