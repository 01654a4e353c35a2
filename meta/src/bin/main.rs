use std::process::ExitCode;

use clap::{Parser, Subcommand};
use config::CatalogConfig;
use meta::{MetaError, MetaResult, SchemaCatalog};
use models::schema::spec::decode_type;
use once_cell::sync::Lazy;
use trace::{error, info, init_global_logging};

static VERSION: Lazy<String> = Lazy::new(|| version::workspace_version().to_string());

#[derive(Debug, Parser)]
#[command(name = "geometa", version = &VERSION[..])]
#[command(about = "Schema catalog command line tools")]
#[command(long_about = r#"Schema catalog command line tools
Examples:
    # List the schemas of the configured catalog:
    geometa --config ./config/config.toml list
    # Create a schema sharing its tables with other schemas:
    geometa create trips 'id:String,*geom:Point:srid=4326,dtg:Date' --sharing
    # Check configuration file:
    geometa --config ./config/config.toml check-config"#)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    subcmd: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// List schema names in the catalog.
    List,
    /// Print a schema with its tables as json.
    Describe { name: String },
    /// Create a schema from a spec string.
    Create {
        name: String,
        spec: String,
        /// Store the schema's rows in tables shared with other schemas.
        #[arg(long)]
        sharing: bool,
    },
    /// Remove a schema and its data.
    Remove { name: String },
    /// Print the physical table of an index kind.
    TableName { name: String, kind: String },
    /// Delete every table of the catalog.
    DeleteCatalog {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Check the configuration file.
    CheckConfig,
}

fn load_config(path: Option<&str>) -> Result<CatalogConfig, String> {
    match path {
        Some(path) => config::get_config(path).map_err(|e| e.to_string()),
        None => {
            let mut config = CatalogConfig::default();
            config.override_by_env();
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let CliCommand::CheckConfig = cli.subcmd {
        let report = match cli.config.as_deref() {
            Some(path) => config::check_config(path),
            None => CatalogConfig::default().check().to_string(),
        };
        println!("{}", report);
        return ExitCode::SUCCESS;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    init_global_logging(&config.log, "geometa.log");

    match run(config, cli.subcmd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("command failed: {}", err);
            eprintln!("{}", err);
            if err.is_retryable() {
                eprintln!("the failure is transient, retrying may succeed");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(config: CatalogConfig, cmd: CliCommand) -> MetaResult<()> {
    let catalog = SchemaCatalog::open(config).await?;
    info!("running {:?} on catalog {}", cmd, catalog.catalog());

    match cmd {
        CliCommand::List => {
            for name in catalog.list_schema_names().await? {
                println!("{}", name);
            }
        }
        CliCommand::Describe { name } => match catalog.describe_schema(&name).await? {
            Some(description) => {
                let json = serde_json::to_string_pretty(&description)
                    .map_err(|e| MetaError::SerdeMsgEncode { err: e.to_string() })?;
                println!("{}", json);
            }
            None => println!("schema {} does not exist", name),
        },
        CliCommand::Create {
            name,
            spec,
            sharing,
        } => {
            let mut ft = decode_type(&name, &spec).map_err(|source| MetaError::Validation {
                name: name.clone(),
                source,
            })?;
            ft.set_table_sharing(sharing);
            catalog.create_schema(&ft).await?;
            println!("created schema {}", name);
        }
        CliCommand::Remove { name } => {
            catalog.remove_schema(&name).await?;
            println!("removed schema {}", name);
        }
        CliCommand::TableName { name, kind } => {
            println!("{}", catalog.get_table_name(&name, &kind).await?);
        }
        CliCommand::DeleteCatalog { yes } => {
            if !yes {
                println!(
                    "this deletes every table of catalog {}, pass --yes to confirm",
                    catalog.catalog()
                );
                return Ok(());
            }
            catalog.delete_catalog().await?;
            println!("deleted catalog {}", catalog.catalog());
        }
        CliCommand::CheckConfig => {}
    }

    catalog.close().await
}
