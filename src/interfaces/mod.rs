// Query surfaces over the alignment service. Each is gated by its feature.
#[cfg(feature = "http-server")]
pub mod http;
#[cfg(feature = "mcp-server")]
pub mod mcp;
