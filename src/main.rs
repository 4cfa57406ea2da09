//! tenantfs -- filesystem commands against an S3-compatible bucket.
//!
//! Every command runs one operation of the storage layer for a tenant (or
//! for instance-level resources when no tenant is given) and prints the
//! result as JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::info;

use tenantfs::config::LoggingConfig;
use tenantfs::{DeleteOutcome, ObjectStorage, StorageInterface, StorageObject};

/// Command-line arguments for tenantfs.
#[derive(Parser, Debug)]
#[command(
    name = "tenantfs",
    version,
    about = "Tenant-scoped filesystem over S3-compatible object storage"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "tenantfs.example.yaml")]
    config: String,

    /// Tenant id; omit to address instance-level resources.
    #[arg(short, long)]
    tenant: Option<String>,

    /// Print Prometheus metrics to stderr after the command.
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a file's content to stdout or to a local file.
    Get {
        path: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the stored metadata instead of the content.
        #[arg(long)]
        metadata: bool,
    },
    /// Upload a local file.
    Put {
        path: String,
        file: PathBuf,
        /// User metadata entry, repeatable.
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },
    /// List the direct children of a directory.
    Ls { path: String },
    /// List everything below a prefix.
    Find {
        prefix: String,
        /// Include directory markers.
        #[arg(long)]
        dirs: bool,
    },
    /// Show file attributes.
    Stat { path: String },
    /// Check whether an object exists.
    Exists { path: String },
    /// Move a file or directory.
    Mv { from: String, to: String },
    /// Delete a file or directory.
    Rm { path: String },
    /// Delete every object below a prefix.
    RmPrefix { prefix: String },
    /// Create a directory and its parents.
    Mkdir { path: String },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{s}'"))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(storage: &ObjectStorage, tenant: Option<&str>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get {
            path,
            output,
            metadata,
        } => {
            let object = storage.get_with_metadata(tenant, &path).await?;
            if metadata {
                return print_json(&object.metadata);
            }
            match output {
                Some(file) => tokio::fs::write(&file, &object.data)
                    .await
                    .with_context(|| format!("writing {}", file.display()))?,
                None => {
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&object.data).await?;
                    stdout.flush().await?;
                }
            }
            Ok(())
        }
        Command::Put { path, file, meta } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let object = if meta.is_empty() {
                StorageObject::new(data)
            } else {
                StorageObject::with_metadata(data, meta.into_iter().collect())
            };
            let locator = storage.put(tenant, &path, object).await?;
            print_json(&json!({ "locator": locator }))
        }
        Command::Ls { path } => print_json(&storage.list(tenant, &path).await?),
        Command::Find { prefix, dirs } => {
            print_json(&storage.all_by_prefix(tenant, &prefix, dirs).await?)
        }
        Command::Stat { path } => print_json(&storage.get_attributes(tenant, &path).await?),
        Command::Exists { path } => {
            print_json(&json!({ "exists": storage.exists(tenant, &path).await? }))
        }
        Command::Mv { from, to } => {
            let locator = storage.move_path(tenant, &from, &to).await?;
            print_json(&json!({ "locator": locator }))
        }
        Command::Rm { path } => {
            let outcome = match storage.remove(tenant, &path).await? {
                DeleteOutcome::Deleted => json!({ "deleted": true }),
                DeleteOutcome::NotFound => json!({ "deleted": false, "reason": "not found" }),
                DeleteOutcome::Failed(reason) => json!({ "deleted": false, "reason": reason }),
            };
            print_json(&outcome)
        }
        Command::RmPrefix { prefix } => {
            print_json(&storage.delete_by_prefix(tenant, &prefix).await?)
        }
        Command::Mkdir { path } => {
            let locator = storage.create_directory(tenant, &path).await?;
            print_json(&json!({ "locator": locator }))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = tenantfs::config::load_config(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    init_tracing(&config.logging);
    info!("Loaded configuration from {}", cli.config);

    if config.observability.metrics {
        tenantfs::metrics::init_metrics()?;
        tenantfs::metrics::describe_metrics();
    }

    let storage = ObjectStorage::from_config(config.storage)?;
    let result = run(&storage, cli.tenant.as_deref(), cli.command).await;

    if cli.print_metrics {
        match tenantfs::metrics::render() {
            Some(text) => eprintln!("{text}"),
            None => eprintln!("metrics are disabled (observability.metrics = false)"),
        }
    }

    storage.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("contentType=text/yaml").unwrap(),
            ("contentType".to_string(), "text/yaml".to_string())
        );
        assert_eq!(
            parse_key_val("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn test_cli_parses_put_with_metadata() {
        let cli = Cli::try_parse_from([
            "tenantfs",
            "--tenant",
            "acme",
            "put",
            "/flows/a.yml",
            "a.yml",
            "--meta",
            "executionId=42",
        ])
        .unwrap();

        assert_eq!(cli.tenant.as_deref(), Some("acme"));
        match cli.command {
            Command::Put { path, meta, .. } => {
                assert_eq!(path, "/flows/a.yml");
                assert_eq!(meta, vec![("executionId".to_string(), "42".to_string())]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rm_prefix_subcommand_name() {
        let cli = Cli::try_parse_from(["tenantfs", "rm-prefix", "/file/storage/"]).unwrap();
        assert!(matches!(cli.command, Command::RmPrefix { .. }));
    }
}
