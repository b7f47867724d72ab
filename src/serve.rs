//! MCP stdio serve loop.
//!
//! Speaks MCP JSON-RPC (newline-delimited) on stdin/stdout and
//! translates `tools/*` methods into bridge calls against the host.
//! Launched by an MCP client as: `scenelink serve`
//!
//! Failure mapping: a [`BridgeError`] from a tool call becomes a tool
//! result with `isError: true` and the typed kind in the text, so the
//! calling assistant can see *what class* of failure occurred and
//! decide to retry, reconnect, or surface it. Protocol-level problems
//! (unknown method, bad JSON) use standard JSON-RPC error codes.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::client::{BridgeClient, catalog};
use crate::config::Config;
use crate::constants::{CONNECT_RETRIES, CONNECT_RETRY_BASE_MS};
use crate::error::BridgeError;

/// Run the serve loop on real stdin/stdout until EOF or `shutdown`.
pub fn run(config: &Config) -> Result<()> {
    let client = BridgeClient::new(config);
    probe_host(&client);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve_loop(&client, stdin.lock(), stdout.lock())
}

/// Try to reach the host on startup, with linear backoff.
///
/// The MCP client may restart this process while the host is still
/// starting; a missing host is reported, not fatal — individual tool
/// calls reconnect on their own.
fn probe_host(client: &BridgeClient) {
    for attempt in 0..CONNECT_RETRIES {
        if attempt > 0 {
            std::thread::sleep(std::time::Duration::from_millis(
                u64::from(attempt) * CONNECT_RETRY_BASE_MS,
            ));
        }
        match client.asset_provider_status() {
            Ok(_) => {
                eprintln!("[scenelink-serve] Connected to host");
                return;
            }
            Err(e) => {
                eprintln!(
                    "[scenelink-serve] Host probe {}/{} failed: {e}",
                    attempt + 1,
                    CONNECT_RETRIES
                );
            }
        }
    }
    eprintln!("[scenelink-serve] Host unreachable; tool calls will retry on demand");
}

/// Core loop over a generic reader/writer pair (testable without real
/// stdio).
pub(crate) fn serve_loop(
    client: &BridgeClient,
    reader: impl BufRead,
    mut writer: impl Write,
) -> Result<()> {
    for line in reader.lines() {
        let line = line.context("stdin read failed")?;
        if line.trim().is_empty() {
            continue;
        }

        let parsed: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("[scenelink-serve] Invalid JSON on stdin: {e}");
                continue;
            }
        };

        let method = parsed.get("method").and_then(Value::as_str).unwrap_or("");
        let id = parsed.get("id").cloned();
        let has_id = id.as_ref().is_some_and(|v| !v.is_null());

        let response = match method {
            "initialize" => Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": {
                        "tools": { "listChanged": false }
                    },
                    "serverInfo": {
                        "name": "scenelink",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }
            })),

            "notifications/initialized" => None,

            "tools/list" => Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": tools_list_result()
            })),

            "tools/call" => {
                let params = parsed.get("params").cloned().unwrap_or_else(|| json!({}));
                let name = params.get("name").and_then(Value::as_str).unwrap_or("");
                let arguments = match params.get("arguments").cloned() {
                    Some(Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                let result = match client.call(name, arguments) {
                    Ok(value) => tool_success(name, &value),
                    Err(err) => tool_failure(&err),
                };
                Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
            }

            "shutdown" => {
                let response = json!({ "jsonrpc": "2.0", "id": id, "result": null });
                writeln!(writer, "{response}")?;
                writer.flush()?;
                break;
            }

            _ => {
                // Unknown method — respond with an error if it has an id
                // (request), silently ignore if it's a notification.
                has_id.then(|| {
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {
                            "code": -32601,
                            "message": format!("Method not found: {method}")
                        }
                    })
                })
            }
        };

        if let Some(response) = response {
            writeln!(writer, "{response}")?;
            writer.flush()?;
        }
    }

    Ok(())
}

/// The `tools/list` result document built from the capability catalog.
pub(crate) fn tools_list_result() -> Value {
    let tools: Vec<Value> = catalog()
        .into_iter()
        .map(|spec| {
            json!({
                "name": spec.name,
                "description": spec.description,
                "inputSchema": spec.input_schema
            })
        })
        .collect();
    json!({ "tools": tools })
}

/// Wrap a successful bridge result as MCP tool content.
///
/// Screenshot results become image content so the assistant renders
/// them; everything else is pretty-printed JSON text.
pub(crate) fn tool_success(name: &str, result: &Value) -> Value {
    if name == "get_viewport_screenshot" {
        if let Some(data) = result.get("data").and_then(Value::as_str) {
            return json!({
                "content": [{
                    "type": "image",
                    "data": data,
                    "mimeType": format!(
                        "image/{}",
                        result.get("format").and_then(Value::as_str).unwrap_or("png")
                    )
                }],
                "isError": false
            });
        }
    }
    let text = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": false
    })
}

/// Wrap a bridge failure as MCP tool content with the typed kind.
pub(crate) fn tool_failure(err: &BridgeError) -> Value {
    let kind = serde_json::to_value(err.kind()).unwrap_or_else(|_| json!("command_error"));
    json!({
        "content": [{
            "type": "text",
            "text": format!("{}: {err}", kind.as_str().unwrap_or("error"))
        }],
        "isError": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn offline_client() -> BridgeClient {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        BridgeClient::for_addr("127.0.0.1", port, Duration::from_millis(200))
    }

    fn run_lines(input: &str) -> Vec<Value> {
        let client = offline_client();
        let mut out = Vec::new();
        serve_loop(&client, input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_initialize_reports_server_info() {
        let responses = run_lines(r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "scenelink");
        assert_eq!(responses[0]["id"], 1);
    }

    #[test]
    fn test_tools_list_exposes_catalog() {
        let responses = run_lines(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
        let tools = responses[0]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), catalog().len());
        assert!(tools.iter().any(|t| t["name"] == "execute_code"));
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[test]
    fn test_unknown_method_gets_jsonrpc_error() {
        let responses = run_lines(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#);
        assert_eq!(responses[0]["error"]["code"], -32601);
    }

    #[test]
    fn test_unknown_notification_is_ignored() {
        let responses = run_lines(r#"{"jsonrpc":"2.0","method":"notifications/cancelled"}"#);
        assert!(responses.is_empty());
    }

    #[test]
    fn test_tool_call_validation_error_is_tool_result() {
        // Unknown tool fails in the façade; the serve loop must report
        // it as an isError tool result, not a JSON-RPC error.
        let responses = run_lines(
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"frobnicate","arguments":{}}}"#,
        );
        assert_eq!(responses[0]["result"]["isError"], true);
        let text = responses[0]["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("command_error:"), "got: {text}");
    }

    #[test]
    fn test_tool_call_offline_reports_connection_error() {
        let responses = run_lines(
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"get_scene_info","arguments":{}}}"#,
        );
        assert_eq!(responses[0]["result"]["isError"], true);
        let text = responses[0]["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("connection_error:"), "got: {text}");
    }

    #[test]
    fn test_shutdown_stops_the_loop() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":6,"method":"shutdown"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#,
            "\n"
        );
        let responses = run_lines(input);
        // Only the shutdown response; the second request never ran
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 6);
    }

    #[test]
    fn test_screenshot_success_becomes_image_content() {
        let result = json!({"width": 8, "height": 4, "format": "png", "data": "QUJD"});
        let wrapped = tool_success("get_viewport_screenshot", &result);
        assert_eq!(wrapped["content"][0]["type"], "image");
        assert_eq!(wrapped["content"][0]["mimeType"], "image/png");
        assert_eq!(wrapped["content"][0]["data"], "QUJD");
    }
}
