use clap::Parser;
use tmc_client::app::commands::{self, ApplyOutcome};
use tmc_client::config::cli::{Command, KindArg};
use tmc_client::core::kinds::{Cluster, ClusterGroup, NodePool, Workspace};
use tmc_client::core::transport::split_path_query;
use tmc_client::core::FullName;
use tmc_client::utils::logger;
use tmc_client::{CliConfig, Client, TmcError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    let settings = match config.settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Configuration validation failed: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(2);
        }
    };

    let result = match settings.connect().await {
        Ok(client) => run(&client, &config.command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Request failed: {} (category: {:?})", e, e.category());
            eprintln!("❌ {}", e);
            std::process::exit(if e.is_not_found() { 3 } else { 1 });
        }
    }
}

async fn run(client: &Client, command: &Command) -> Result<serde_json::Value, TmcError> {
    match command {
        Command::Get(target) => match target.kind {
            KindArg::ClusterGroup => {
                commands::describe::<ClusterGroup>(client, &target.cluster_group_name()?).await
            }
            KindArg::Cluster => commands::describe::<Cluster>(client, &target.cluster_name()?).await,
            KindArg::NodePool => {
                commands::describe::<NodePool>(client, &target.node_pool_name()?).await
            }
            KindArg::Workspace => {
                commands::describe::<Workspace>(client, &target.workspace_name()?).await
            }
        },
        Command::List { kind, scope } => match kind {
            KindArg::ClusterGroup => commands::list::<ClusterGroup>(client, &[], &[]).await,
            KindArg::Cluster => commands::list::<Cluster>(client, &[], &[]).await,
            KindArg::NodePool => {
                let cluster = scope.parent_cluster()?;
                commands::list::<NodePool>(
                    client,
                    &cluster.path_segments(),
                    &cluster.query_params(),
                )
                .await
            }
            KindArg::Workspace => commands::list::<Workspace>(client, &[], &[]).await,
        },
        Command::Delete { target, force } => {
            let deleted = match target.kind {
                KindArg::ClusterGroup => {
                    commands::remove::<ClusterGroup>(client, &target.cluster_group_name()?, *force)
                        .await?
                }
                KindArg::Cluster => {
                    commands::remove::<Cluster>(client, &target.cluster_name()?, *force).await?
                }
                KindArg::NodePool => {
                    commands::remove::<NodePool>(client, &target.node_pool_name()?, *force).await?
                }
                KindArg::Workspace => {
                    commands::remove::<Workspace>(client, &target.workspace_name()?, *force)
                        .await?
                }
            };
            Ok(serde_json::json!({ "deleted": deleted }))
        }
        Command::Apply { kind, file } => {
            let (outcome, resource) = match kind {
                KindArg::ClusterGroup => {
                    let (o, r) = commands::apply_file::<ClusterGroup>(client, file).await?;
                    (o, serde_json::to_value(r)?)
                }
                KindArg::Cluster => {
                    let (o, r) = commands::apply_file::<Cluster>(client, file).await?;
                    (o, serde_json::to_value(r)?)
                }
                KindArg::NodePool => {
                    let (o, r) = commands::apply_file::<NodePool>(client, file).await?;
                    (o, serde_json::to_value(r)?)
                }
                KindArg::Workspace => {
                    let (o, r) = commands::apply_file::<Workspace>(client, file).await?;
                    (o, serde_json::to_value(r)?)
                }
            };
            let action = match outcome {
                ApplyOutcome::Created => "created",
                ApplyOutcome::Updated => "updated",
            };
            Ok(serde_json::json!({ "action": action, "resource": resource }))
        }
        Command::Raw { path } => {
            let (path, query) = split_path_query(path);
            client.get(path, &query).await
        }
    }
}
