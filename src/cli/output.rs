use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Print a success message, merging `data` into the JSON object when present.
pub fn output_success(
    output_format: OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&success_body(message, data))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(Value::Object(fields)) = data {
                for (key, value) in fields {
                    match value {
                        Value::String(s) => println!("  {}: {}", key, s),
                        other => println!("  {}: {}", key, other),
                    }
                }
            }
        }
    }
    Ok(())
}

pub fn output_error(output_format: OutputFormat, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "success": false, "error": message }))?
            );
        }
        OutputFormat::Text => eprintln!("Error: {}", message),
    }
    Ok(())
}

fn success_body(message: &str, data: Option<Value>) -> Value {
    let mut body = json!({ "success": true, "message": message });
    if let (Value::Object(target), Some(Value::Object(extra))) = (&mut body, data) {
        for (key, value) in extra {
            target.entry(key).or_insert(value);
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_is_merged_without_overriding_status() {
        let body = success_body("done", Some(json!({ "token": "abc", "success": false })));
        assert_eq!(body, json!({ "success": true, "message": "done", "token": "abc" }));
    }

    #[test]
    fn non_object_data_is_ignored() {
        assert_eq!(success_body("ok", Some(json!([1, 2]))), json!({ "success": true, "message": "ok" }));
    }
}
