use super::protocol::Protocol;
use super::types::*;
use crate::config::Config;
use crate::handlers::tool_handlers::ToolHandlers;
use crate::snapshot::SnapshotManager;
use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "code-ask-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main MCP Server
pub struct McpServer {
    protocol: Protocol,
    snapshot_manager: Arc<SnapshotManager>,
    tool_handlers: Arc<Mutex<ToolHandlers>>,
}

impl McpServer {
    pub fn new(config: Config) -> Self {
        tracing::debug!(
            "Using {} embeddings and {:?} vector store",
            config.embedding.provider_name(),
            config.vector_db
        );

        let snapshot_manager = Arc::new(SnapshotManager::new(config.snapshot_path.clone()));

        // Tool calls run one at a time; indexing a repository is never interleaved with another call
        let tool_handlers = Arc::new(Mutex::new(ToolHandlers::new(
            config.embedding_provider(),
            config.vector_database(),
            snapshot_manager.clone(),
            config.search_top_k,
            config.max_file_size,
        )));

        Self {
            protocol: Protocol::new(),
            snapshot_manager,
            tool_handlers,
        }
    }

    pub async fn start(mut self) -> Result<()> {
        // Load existing snapshot
        self.snapshot_manager.load().await?;

        tracing::info!("MCP server started, waiting for requests...");

        // Main request loop
        loop {
            match self.protocol.read_request().await {
                Ok(Some(request)) => {
                    let response = self.handle_request(request).await;
                    if let Err(e) = self.protocol.send_response(response).await {
                        tracing::error!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read request: {}", e);
                    let error_response = self.protocol.error_response(json!(null), JsonRpcError::parse_error());
                    let _ = self.protocol.send_response(error_response).await;
                }
            }
        }

        Ok(())
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!("Received request: method={}, id={:?}", request.method, request.id);

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id, request.params),
            "notifications/initialized" => self.protocol.success_response(request.id, json!({})),
            "tools/list" => self.protocol.success_response(request.id, json!(tool_list())),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            _ => self.protocol.error_response(request.id, JsonRpcError::method_not_found()),
        }
    }

    fn handle_initialize(&self, id: serde_json::Value, params: serde_json::Value) -> JsonRpcResponse {
        match serde_json::from_value::<InitializeRequest>(params) {
            Ok(req) => {
                tracing::info!("Client connected: {} v{}", req.clientInfo.name, req.clientInfo.version);
            }
            Err(e) => {
                tracing::warn!("Failed to parse initialize request: {}", e);
                return self.protocol.error_response(
                    id,
                    JsonRpcError::internal_error(format!("Invalid initialize params: {}", e)),
                );
            }
        }

        let response = InitializeResponse {
            protocolVersion: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    listChanged: Some(true),
                },
            },
            serverInfo: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        self.protocol.success_response(id, json!(response))
    }

    async fn handle_tools_call(&self, id: serde_json::Value, params: serde_json::Value) -> JsonRpcResponse {
        let call_request: CallToolRequest = match serde_json::from_value(params) {
            Ok(req) => req,
            Err(e) => {
                return self
                    .protocol
                    .error_response(id, JsonRpcError::internal_error(format!("Invalid params: {}", e)));
            }
        };

        let handlers = self.tool_handlers.lock().await;
        let result = match call_request.name.as_str() {
            "index_codebase" => handlers.handle_index_codebase(&call_request.arguments).await,
            "search_code" => handlers.handle_search_code(&call_request.arguments).await,
            "clear_index" => handlers.handle_clear_index(&call_request.arguments).await,
            "get_indexing_status" => handlers.handle_get_indexing_status(&call_request.arguments).await,
            _ => {
                return self.protocol.error_response(
                    id,
                    JsonRpcError::internal_error(format!("Unknown tool: {}", call_request.name)),
                );
            }
        };

        self.protocol.success_response(id, json!(tool_response(result)))
    }
}

/// Tool failures go back as error content, not JSON-RPC errors.
fn tool_response(result: Result<Vec<Content>>) -> CallToolResponse {
    match result {
        Ok(content) => CallToolResponse { content, isError: None },
        Err(e) => {
            tracing::warn!("Tool call failed: {:#}", e);
            CallToolResponse {
                content: vec![Content::Text {
                    text: format!("Error: {:#}", e),
                }],
                isError: Some(true),
            }
        }
    }
}

fn tool_list() -> ListToolsResponse {
    let tools = vec![
        Tool {
            name: "index_codebase".to_string(),
            description: r#"Index a codebase directory to enable semantic search.

⚠️ **IMPORTANT**:
- You MUST provide an absolute path to the target codebase.
- Relative paths will be automatically resolved to absolute paths.

✨ **Usage Guidance**:
- Source files are split along functions, classes and other declarations; other text files are split by lines.
- If indexing is attempted on an already indexed path, you MUST prompt the user to confirm whether to proceed with a force index."#
                .to_string(),
            inputSchema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "ABSOLUTE path to the codebase directory to index."
                    },
                    "force": {
                        "type": "boolean",
                        "description": "Force re-indexing even if already indexed",
                        "default": false
                    }
                },
                "required": ["path"]
            }),
        },
        Tool {
            name: "search_code".to_string(),
            description: r#"Search the indexed codebase using natural language queries.

⚠️ **IMPORTANT**:
- You MUST provide an absolute path.
- If the codebase is not indexed, this tool will return an error."#
                .to_string(),
            inputSchema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "ABSOLUTE path to the codebase directory to search in."
                    },
                    "query": {
                        "type": "string",
                        "description": "Natural language query to search for in the codebase"
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of results to return",
                        "default": 8,
                        "maximum": 50
                    }
                },
                "required": ["path", "query"]
            }),
        },
        Tool {
            name: "clear_index".to_string(),
            description: "Clear the search index for a codebase.".to_string(),
            inputSchema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "ABSOLUTE path to the codebase directory to clear."
                    }
                },
                "required": ["path"]
            }),
        },
        Tool {
            name: "get_indexing_status".to_string(),
            description: "Get the current indexing status of a codebase.".to_string(),
            inputSchema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "ABSOLUTE path to the codebase directory."
                    }
                },
                "required": ["path"]
            }),
        },
    ];

    ListToolsResponse { tools }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_list_names() {
        let names: Vec<String> = tool_list().tools.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["index_codebase", "search_code", "clear_index", "get_indexing_status"]);
    }

    #[test]
    fn test_tool_error_is_content() {
        let err = anyhow::anyhow!("connection refused").context("Failed to generate embeddings");
        let response = json!(tool_response(Err(err)));

        assert_eq!(response["isError"], true);
        assert_eq!(response["content"][0]["type"], "text");
        assert_eq!(
            response["content"][0]["text"],
            "Error: Failed to generate embeddings: connection refused"
        );
    }

    #[test]
    fn test_tool_success_omits_error_flag() {
        let response = json!(tool_response(Ok(vec![Content::Text {
            text: "ok".to_string()
        }])));
        assert!(response.get("isError").is_none());
        assert_eq!(response["content"][0]["text"], "ok");
    }
}
