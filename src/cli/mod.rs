pub mod commands;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::config;
use crate::gateway::FileGateway;
use crate::pipeline::implementations::SchemaFieldSanitizer;
use crate::pipeline::OperationPipeline;
use crate::schema::{FileSchemaProvider, SchemaProvider};
use crate::service::{DataService, ServiceOptions};
use crate::store::StoreOptions;
use crate::types::SecurityContext;

#[derive(Parser)]
#[command(name = "monk-data")]
#[command(about = "monk-data - schema-driven record queries over flat-file collections")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Collection root directory (defaults to STORE_DATA_DIR)")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Schema document directory (defaults to STORE_SCHEMA_DIR)")]
    pub schema_dir: Option<PathBuf>,

    #[arg(long, short = 'n', global = true, default_value = "default", help = "Namespace to operate on")]
    pub namespace: String,

    #[arg(long, global = true, help = "Caller subject; omitted means anonymous")]
    pub subject: Option<String>,

    #[arg(long = "role", global = true, help = "Caller role, repeatable")]
    pub roles: Vec<String>,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Find records with field-suffix arguments, e.g. salarioGreaterThan=50000")]
    Find {
        #[arg(help = "Type name")]
        type_name: String,
        #[arg(help = "Query arguments as key=value")]
        args: Vec<String>,
    },

    #[command(about = "Create a record from --data or stdin")]
    Create {
        #[arg(help = "Type name")]
        type_name: String,
        #[arg(long, help = "Record id (generated when omitted)")]
        id: Option<String>,
        #[arg(long, help = "Record JSON; read from stdin when omitted")]
        data: Option<String>,
    },

    #[command(about = "Merge fields from --data or stdin into a record")]
    Update {
        #[arg(help = "Type name")]
        type_name: String,
        #[arg(help = "Record id")]
        id: String,
        #[arg(long, help = "Partial record JSON; read from stdin when omitted")]
        data: Option<String>,
    },

    #[command(about = "Delete a record")]
    Delete {
        #[arg(help = "Type name")]
        type_name: String,
        #[arg(help = "Record id")]
        id: String,
    },

    #[command(about = "Run a mutation payload {action, id, object}")]
    Mutate {
        #[arg(help = "Type name")]
        type_name: String,
        #[arg(long, help = "Mutation JSON; read from stdin when omitted")]
        data: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

impl Cli {
    pub fn security_context(&self) -> SecurityContext {
        let mut security = match &self.subject {
            Some(subject) => SecurityContext::user(subject.clone()),
            None => SecurityContext::anonymous(),
        };
        for role in &self.roles {
            security = security.with_role(role.clone());
        }
        security
    }

    /// File-backed service wired from flags and configuration
    pub fn data_service(&self) -> DataService {
        let config = config();
        let data_dir = self.data_dir.clone().unwrap_or_else(|| config.store.data_dir.clone());
        let schema_dir = self.schema_dir.clone().unwrap_or_else(|| config.store.schema_dir.clone());
        tracing::debug!("Using data dir {} and schema dir {}", data_dir.display(), schema_dir.display());

        let schemas: Arc<dyn SchemaProvider> = Arc::new(FileSchemaProvider::new(schema_dir));
        let pipeline = OperationPipeline::from_config().with_sanitizer(SchemaFieldSanitizer::new(schemas.clone()));
        let gateway = FileGateway::new(data_dir).with_options(StoreOptions::from_config());
        DataService::new(Arc::new(gateway), Arc::new(pipeline), schemas).with_options(ServiceOptions::from_config())
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let service = cli.data_service();
    let security = cli.security_context();

    commands::data::handle(cli.command, &service, &cli.namespace, &security, output_format).await
}
