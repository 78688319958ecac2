//! Control-channel requests

use libtether_core::TetherError;
use libtether_ipc::{ControlClient, ControlRequest};
use serde::Serialize;
use tracing::debug;

use crate::cli::{Cli, RequestCommand};
use crate::context::TetherContext;
use crate::output::output_success;

#[derive(Serialize)]
struct RequestReport {
    target: String,
    request_type: String,
    data: serde_json::Value,
}

pub async fn run(cli: &Cli, cmd: RequestCommand) -> Result<(), TetherError> {
    let ctx = TetherContext::resolve(cli)?;
    let request = build_request(cmd)?;

    let client = ControlClient::from_config(&ctx.config)?;
    let target = client.try_connect().await?;
    debug!(target = %target, "sending control request");

    let result = client.send_value(request.clone()).await;
    client.disconnect().await;
    let data = result.and_then(|response| response.into_result())?;

    let report = RequestReport {
        target: target.to_string(),
        request_type: request["type"].as_str().unwrap_or_default().to_string(),
        data,
    };
    output_success(cli, report, |report| {
        serde_json::to_string_pretty(&report.data).unwrap_or_else(|_| report.data.to_string())
    });
    Ok(())
}

fn build_request(cmd: RequestCommand) -> Result<serde_json::Value, TetherError> {
    let request = match cmd {
        RequestCommand::Attach { client_id } => ControlRequest::AttachClient {
            client_id: client_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            pid: std::process::id(),
        },
        RequestCommand::Detach { client_id } => ControlRequest::DetachClient { client_id },
        RequestCommand::Connections => ControlRequest::ListMcpConnections,
        RequestCommand::Instances => ControlRequest::ListMcpInstances,
        RequestCommand::ScaleUp { count } => ControlRequest::ScaleUpMcp { count },
        RequestCommand::Raw { json } => {
            let value: serde_json::Value = serde_json::from_str(&json)
                .map_err(|e| TetherError::MalformedPayload(format!("request JSON: {}", e)))?;
            if !value.get("type").map(|t| t.is_string()).unwrap_or(false) {
                return Err(TetherError::MalformedPayload(
                    "request JSON must be an object with a string \"type\"".to_string(),
                ));
            }
            return Ok(value);
        }
    };
    Ok(serde_json::to_value(request)?)
}
