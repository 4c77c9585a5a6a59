use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::types::Record;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(body)) = (data, response.as_object_mut()) {
                body.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output a result set; text mode prints one compact JSON line per record
pub fn output_records(output_format: &OutputFormat, type_name: &str, records: &[Record]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "success": true,
                    "type": type_name,
                    "count": records.len(),
                    "records": records
                }))?
            );
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No {} records found", type_name);
            }
            for record in records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
    }
    Ok(())
}
