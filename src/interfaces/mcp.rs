use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task;

use crate::{
    application::{
        dtos::{domain_matches, ConceptGroupDto, SearchResultDto},
        AlignmentService, CanonicalMappingRequest, CanonicalMappingResponse, CrossDomainRequest,
        CrossDomainResponse, ResolveRequest, ResolveResponse, SearchRequest, SearchResponse,
    },
    domain::DomainError,
};

const INSTRUCTIONS: &str = r#"Semantic MDM aligns business vocabulary across the Legal, Restaurant Development and Finance domains.

- search_terms: ranked semantic search over every term, optionally limited to one domain.
- resolve_terms: best matches per domain plus the canonical concepts they share.
- cross_domain_matches: equivalents of a term outside its own domain (default min_score depends on the embedding backend).
- canonical_mapping: canonical concept of a term, by exact text and by best semantic match.

Scores are cosine similarities in [-1, 1]; higher is closer."#;

#[derive(Clone)]
pub struct SemanticMdmMcpServer {
    service: Arc<AlignmentService>,
    tool_router: ToolRouter<Self>,
}

impl SemanticMdmMcpServer {
    pub fn new(service: Arc<AlignmentService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }

    async fn run<T, F>(&self, call: F) -> Result<CallToolResult, McpError>
    where
        T: Serialize + Send + 'static,
        F: FnOnce(&AlignmentService) -> Result<T, DomainError> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        let response = task::spawn_blocking(move || call(&service))
            .await
            .map_err(|err| internal_error(err.to_string()))?
            .map_err(map_domain_error)?;

        let value =
            serde_json::to_value(response).map_err(|err| internal_error(err.to_string()))?;
        Ok(CallToolResult::structured(value))
    }

    async fn search(&self, payload: SearchRequest) -> Result<CallToolResult, McpError> {
        self.run(move |service: &AlignmentService| {
            let results = service.semantic_search(
                &payload.query,
                payload.domain,
                payload.top_k,
                payload.min_score,
            )?;
            Ok(SearchResponse {
                results: results.iter().map(SearchResultDto::from).collect(),
                query: payload.query,
            })
        })
        .await
    }

    async fn resolve(&self, payload: ResolveRequest) -> Result<CallToolResult, McpError> {
        self.run(move |service: &AlignmentService| {
            let top_k = payload
                .top_k_per_domain
                .unwrap_or(service.config().default_top_k_per_domain);
            let resolved = service.resolve(&payload.query, top_k)?;
            Ok(ResolveResponse {
                concepts: AlignmentService::group_by_concept(&resolved)
                    .iter()
                    .map(ConceptGroupDto::from)
                    .collect(),
                matches: domain_matches(&resolved),
                query: payload.query,
            })
        })
        .await
    }

    async fn cross_domain(&self, payload: CrossDomainRequest) -> Result<CallToolResult, McpError> {
        self.run(move |service: &AlignmentService| {
            let matches = service.cross_domain_matches(
                &payload.term,
                payload.source_domain,
                payload.min_score,
            )?;
            Ok(CrossDomainResponse {
                term: payload.term,
                source_domain: payload.source_domain,
                matches: domain_matches(&matches),
            })
        })
        .await
    }

    async fn canonical(&self, payload: CanonicalMappingRequest) -> Result<CallToolResult, McpError> {
        self.run(move |service: &AlignmentService| {
            let best_match = service.canonical_mapping(&payload.term)?;
            Ok(CanonicalMappingResponse {
                exact_concepts: service.concepts_for(&payload.term).into_iter().collect(),
                term: payload.term,
                best_match,
            })
        })
        .await
    }

    async fn dispatch(&self, tool_name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        match tool_name {
            "search_terms" => self.search(parse_arguments(tool_name, arguments)?).await,
            "resolve_terms" => self.resolve(parse_arguments(tool_name, arguments)?).await,
            "cross_domain_matches" => {
                self.cross_domain(parse_arguments(tool_name, arguments)?)
                    .await
            }
            "canonical_mapping" => self.canonical(parse_arguments(tool_name, arguments)?).await,
            _ => Err(McpError::invalid_params(
                format!("Unknown tool: {tool_name}"),
                None,
            )),
        }
    }
}

#[tool_router]
impl SemanticMdmMcpServer {
    #[tool(
        name = "search_terms",
        description = "Rank every known term by semantic similarity to a query, optionally within one domain."
    )]
    async fn search_terms(
        &self,
        Parameters(payload): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.search(payload).await
    }

    #[tool(
        name = "resolve_terms",
        description = "Find the closest terms in each domain and group them by canonical concept."
    )]
    async fn resolve_terms(
        &self,
        Parameters(payload): Parameters<ResolveRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.resolve(payload).await
    }

    #[tool(
        name = "cross_domain_matches",
        description = "List equivalents of a term found in domains other than its source domain."
    )]
    async fn cross_domain_matches(
        &self,
        Parameters(payload): Parameters<CrossDomainRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.cross_domain(payload).await
    }

    #[tool(
        name = "canonical_mapping",
        description = "Map a term to its canonical concept by exact text and by best semantic match."
    )]
    async fn canonical_mapping(
        &self,
        Parameters(payload): Parameters<CanonicalMappingRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.canonical(payload).await
    }
}

impl ServerHandler for SemanticMdmMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: rmcp::model::Implementation {
                name: "semantic-mdm".into(),
                title: Some("Semantic MDM Term Resolver".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(INSTRUCTIONS.into()),
        }
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Value,
) -> Result<T, McpError> {
    serde_json::from_value(arguments).map_err(|err| {
        McpError::invalid_params(
            format!("Invalid {tool_name} arguments"),
            Some(json!({ "detail": err.to_string() })),
        )
    })
}

fn map_domain_error(err: DomainError) -> McpError {
    match err {
        DomainError::Validation(msg) => {
            McpError::invalid_params("invalid request", Some(json!({ "detail": msg })))
        }
        DomainError::NotFound(msg) => {
            McpError::resource_not_found("not found", Some(json!({ "detail": msg })))
        }
        other => McpError::internal_error(
            "internal error",
            Some(json!({ "detail": other.to_string() })),
        ),
    }
}

fn internal_error(message: impl Into<String>) -> McpError {
    McpError::internal_error(
        "internal MCP server error",
        Some(json!({ "detail": message.into() })),
    )
}

/// Serve MCP over stdio, one JSON-RPC message per line. Stdout carries only
/// protocol traffic; logs go to stderr.
pub async fn run_mcp_stdio_server(service: Arc<AlignmentService>) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tracing::{debug, error, info};

    info!(target: "semantic_mdm::mcp", "starting MCP stdio server");

    let server = SemanticMdmMcpServer::new(service);
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!(target: "semantic_mdm::mcp", "client closed stdio connection");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                debug!(target: "semantic_mdm::mcp", "received: {}", trimmed);

                let response = match serde_json::from_str::<Value>(trimmed) {
                    Ok(request) => match handle_jsonrpc_request(&server, request).await {
                        Some(response) => response,
                        None => continue,
                    },
                    Err(err) => {
                        error!(target: "semantic_mdm::mcp", "failed to parse JSON-RPC request: {}", err);
                        jsonrpc_error(None, -32700, format!("Parse error: {err}"))
                    }
                };

                let encoded = response.to_string();
                let written = async {
                    stdout.write_all(encoded.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await
                }
                .await;

                if let Err(err) = written {
                    error!(target: "semantic_mdm::mcp", "failed to write response: {}", err);
                    break;
                }
                debug!(target: "semantic_mdm::mcp", "sent: {}", encoded);
            }
            Err(err) => {
                error!(target: "semantic_mdm::mcp", "failed to read from stdin: {}", err);
                break;
            }
        }
    }

    info!(target: "semantic_mdm::mcp", "MCP stdio server terminated");
    Ok(())
}

/// Answer one JSON-RPC message. Notifications (no `id`) get no reply.
async fn handle_jsonrpc_request(server: &SemanticMdmMcpServer, request: Value) -> Option<Value> {
    let id = request.get("id").cloned();
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if id.is_none() {
        return None;
    }

    let response = match method {
        "initialize" => {
            let info = server.get_info();
            jsonrpc_result(
                id,
                json!({
                    "protocolVersion": info.protocol_version,
                    "capabilities": info.capabilities,
                    "serverInfo": info.server_info,
                    "instructions": info.instructions
                }),
            )
        }
        "ping" => jsonrpc_result(id, json!({})),
        "tools/list" => jsonrpc_result(id, json!({ "tools": server.tool_router.list_all() })),
        "tools/call" => match request.get("params") {
            Some(params) => {
                let tool_name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

                match server.dispatch(tool_name, arguments).await {
                    Ok(result) => jsonrpc_result(id, json!(result)),
                    Err(err) => json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {
                            "code": err.code,
                            "message": err.message,
                            "data": err.data
                        }
                    }),
                }
            }
            None => jsonrpc_error(id, -32602, "Invalid params".into()),
        },
        _ => jsonrpc_error(id, -32601, format!("Method not found: {method}")),
    };

    Some(response)
}

fn jsonrpc_result(id: Option<Value>, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn jsonrpc_error(id: Option<Value>, code: i32, message: String) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}
