use libtether_core::TetherError;
use serde::Serialize;

use crate::cli::Cli;

/// JSON response envelope
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub schema_version: u32,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonError>,
}

#[derive(Serialize)]
pub struct JsonError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> String {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|e| format!("{{\"ok\":false,\"error\":\"serialization failed: {}\"}}", e))
}

/// Output a successful result; `human` renders the non-JSON form
pub fn output_success<T: Serialize>(cli: &Cli, data: T, human: impl FnOnce(&T) -> String) {
    if cli.json {
        let response = JsonResponse {
            schema_version: 1,
            ok: true,
            data: Some(data),
            error: None,
        };
        println!("{}", to_json(&response, true));
    } else if !cli.quiet {
        println!("{}", human(&data));
    }
}

/// Print one streaming record: a JSON line, or the human form
pub fn output_line<T: Serialize>(cli: &Cli, kind: &str, data: &T, human: impl FnOnce() -> String) {
    if cli.json {
        let line = serde_json::json!({ "kind": kind, "data": data });
        println!("{}", to_json(&line, false));
    } else if !cli.quiet {
        println!("{}", human());
    }
}

/// Output an error
pub fn output_error(cli: &Cli, err: &TetherError) {
    if cli.json {
        let suggestions = err.suggestions();
        let details = if suggestions.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::json!({ "suggestions": suggestions })
        };

        let response: JsonResponse<()> = JsonResponse {
            schema_version: 1,
            ok: false,
            data: None,
            error: Some(JsonError {
                code: err.error_code().to_string(),
                message: err.to_string(),
                details,
            }),
        };
        eprintln!("{}", to_json(&response, true));
    } else {
        eprintln!("error: {}", err);
        let suggestions = err.suggestions();
        if !suggestions.is_empty() {
            eprintln!();
            eprintln!("Suggestions:");
            for suggestion in suggestions {
                eprintln!("  - {}", suggestion);
            }
        }
    }
}

/// Print human-readable output (ignored in quiet and JSON mode)
pub fn print_human(cli: &Cli, msg: &str) {
    if !cli.json && !cli.quiet {
        println!("{}", msg);
    }
}
