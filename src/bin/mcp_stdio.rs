/// MCP server over stdio for process-spawning clients.
///
/// Reads newline-delimited JSON-RPC from stdin and writes responses to
/// stdout. Logs go to stderr.
///
/// ```json
/// {
///   "mcpServers": {
///     "semantic-mdm": {
///       "command": "/path/to/mcp-stdio",
///       "env": { "SEMANTIC_MDM_DATA_DIR": "/path/to/data" }
///     }
///   }
/// }
/// ```
#[cfg(feature = "mcp-server")]
#[tokio::main]
async fn main() {
    if let Err(err) = semantic_mdm::run_mcp_stdio().await {
        eprintln!("[semantic-mdm::mcp-stdio] runtime failed: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "mcp-server"))]
fn main() {
    eprintln!("[semantic-mdm::mcp-stdio] Build with `--features mcp-server` to enable the MCP stdio server.");
    eprintln!("Example: cargo build --release --bin mcp-stdio --features mcp-server");
    std::process::exit(1);
}
