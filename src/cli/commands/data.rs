use std::io::Read;

use anyhow::{anyhow, Context};
use serde_json::{json, Map, Value};

use crate::cli::utils::{output_error, output_records, output_success};
use crate::cli::{Commands, OutputFormat};
use crate::error::DataError;
use crate::filter::{Condition, FilterExpression};
use crate::service::{DataService, MutationRequest};
use crate::types::{Record, SecurityContext, ID_FIELD};

pub async fn handle(
    cmd: Commands,
    service: &DataService,
    namespace: &str,
    security: &SecurityContext,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let result = match cmd {
        Commands::Find { type_name, args } => {
            let args = parse_arguments(&args)?;
            match service.find(namespace, &type_name, security, &args).await {
                Ok(records) => return output_records(&output_format, &type_name, &records),
                Err(e) => Err(e),
            }
        }
        Commands::Create { type_name, id, data } => {
            let input = read_record(data)?;
            service
                .create(namespace, &type_name, security, id, input)
                .await
                .map(|records| (format!("Created {} record(s) in {}", records.len(), type_name), records))
        }
        Commands::Update { type_name, id, data } => {
            let input = read_record(data)?;
            service
                .modify(namespace, &type_name, security, by_id(&id), input)
                .await
                .map(|records| (format!("Updated {} '{}'", type_name, id), records))
        }
        Commands::Delete { type_name, id } => service
            .delete(namespace, &type_name, security, by_id(&id))
            .await
            .map(|count| (format!("Deleted {} record(s) from {}", count, type_name), Vec::new())),
        Commands::Mutate { type_name, data } => {
            let request: MutationRequest = serde_json::from_str(&read_input(data)?).context("Invalid mutation payload")?;
            service
                .mutate(namespace, &type_name, security, request)
                .await
                .map(|outcome| (format!("{} affected {} record(s)", outcome.action, outcome.affected), outcome.records))
        }
    };

    match result {
        Ok((message, records)) => output_success(&output_format, &message, Some(json!({ "records": records }))),
        Err(e) => fail(&output_format, e),
    }
}

fn fail(output_format: &OutputFormat, error: DataError) -> anyhow::Result<()> {
    output_error(output_format, error.message(), Some(error.error_code()))?;
    Err(anyhow!(error))
}

fn by_id(id: &str) -> FilterExpression {
    Condition::eq(ID_FIELD, id).into()
}

/// `key=value` pairs; values that look like JSON arrays/objects are decoded, everything else stays a string
pub fn parse_arguments(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut args = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected key=value, got '{}'", pair))?;
        let value = if raw.starts_with('[') || raw.starts_with('{') {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        } else {
            Value::String(raw.to_string())
        };
        args.insert(key.to_string(), value);
    }
    Ok(args)
}

fn read_input(data: Option<String>) -> anyhow::Result<String> {
    match data {
        Some(data) => Ok(data),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer).context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn read_record(data: Option<String>) -> anyhow::Result<Record> {
    match serde_json::from_str(&read_input(data)?).context("Record must be valid JSON")? {
        Value::Object(record) => Ok(record),
        other => Err(anyhow!("Record must be a JSON object, got {}", other)),
    }
}
