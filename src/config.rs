use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;

/// Server configuration parsed from CLI arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "icon-api")]
#[command(about = "Icon serving API with multi-tier caching and search", long_about = None)]
pub struct Args {
    /// Address(es) to listen on. Can be host:port, :port, or Unix socket path.
    /// Can be specified multiple times.
    /// Examples: :8080, 0.0.0.0:8080, [::]:8080, /tmp/icon-api.sock
    #[arg(long, env = "LISTEN_ADDR", value_delimiter = ',', default_value = ":8080")]
    pub listen: Vec<ListenAddr>,

    /// Object-store (blob) endpoint, e.g. https://<account>.r2.cloudflarestorage.com
    #[arg(long, env = "BLOB_STORE_ENDPOINT")]
    pub blob_store_endpoint: Option<String>,
    #[arg(long, env = "BLOB_STORE_ACCESS_KEY_ID")]
    pub blob_store_access_key_id: Option<String>,
    #[arg(long, env = "BLOB_STORE_SECRET_ACCESS_KEY")]
    pub blob_store_secret_access_key: Option<String>,
    #[arg(long, env = "BLOB_STORE_BUCKET")]
    pub blob_store_bucket: Option<String>,

    /// Key-value (index) backend endpoint; same shape as the blob store,
    /// may point at a different bucket/account.
    #[arg(long, env = "INDEX_STORE_ENDPOINT")]
    pub index_store_endpoint: Option<String>,
    #[arg(long, env = "INDEX_STORE_ACCESS_KEY_ID")]
    pub index_store_access_key_id: Option<String>,
    #[arg(long, env = "INDEX_STORE_SECRET_ACCESS_KEY")]
    pub index_store_secret_access_key: Option<String>,
    #[arg(long, env = "INDEX_STORE_BUCKET")]
    pub index_store_bucket: Option<String>,

    /// Development-only local directory fallbacks, used when the
    /// corresponding object-store bucket is not configured.
    #[arg(long, env = "LOCAL_ICONS_DIR")]
    pub local_icons_dir: Option<PathBuf>,
    #[arg(long, env = "LOCAL_INDEX_DIR")]
    pub local_index_dir: Option<PathBuf>,

    /// CSV of origins allowed for CORS; `*` (the default) reflects any origin.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// Token-bucket rate limit: sustained requests/sec and burst size.
    #[arg(long, env = "RATE_LIMIT_RPS", default_value_t = 10.0)]
    pub rate_limit_rps: f64,
    #[arg(long, env = "RATE_LIMIT_BURST", default_value_t = 30)]
    pub rate_limit_burst: u32,

    /// Optional header name to trust for request IDs.
    #[arg(long, env = "TRUST_REQUEST_ID")]
    pub trust_request_id: Option<String>,
}

/// Address to listen on - either TCP or Unix socket
#[derive(Debug, Clone)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl FromStr for ListenAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Unix socket: starts with / or ./
        if s.starts_with('/') || s.starts_with("./") {
            return Ok(ListenAddr::Unix(PathBuf::from(s)));
        }

        // Shorthand :port -> 127.0.0.1:port
        if let Some(port_str) = s.strip_prefix(':') {
            let port: u16 = port_str
                .parse()
                .map_err(|_| format!("Invalid port number: {}", port_str))?;
            return Ok(ListenAddr::Tcp(SocketAddr::from(([127, 0, 0, 1], port))));
        }

        // Try parsing as a socket address (handles both IPv4 and IPv6)
        // This supports formats like: 0.0.0.0:8080, [::]:8080, 192.168.1.1:3000
        match s.parse::<SocketAddr>() {
            Ok(addr) => Ok(ListenAddr::Tcp(addr)),
            Err(_) => {
                // Try resolving as hostname:port
                match s.to_socket_addrs() {
                    Ok(mut addrs) => addrs
                        .next()
                        .ok_or_else(|| format!("Could not resolve address: {}", s))
                        .map(ListenAddr::Tcp),
                    Err(_) => Err(format!(
                        "Invalid address '{}'. Expected host:port, :port, or Unix socket path",
                        s
                    )),
                }
            }
        }
    }
}

impl std::fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenAddr::Tcp(addr) => write!(f, "{}", addr),
            ListenAddr::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Args {
    pub fn blob_store_config(&self) -> Option<crate::backend::BucketConfig> {
        Some(crate::backend::BucketConfig {
            endpoint: self.blob_store_endpoint.clone()?,
            access_key_id: self.blob_store_access_key_id.clone()?,
            secret_access_key: self.blob_store_secret_access_key.clone()?,
            bucket: self.blob_store_bucket.clone()?,
        })
    }

    pub fn index_store_config(&self) -> Option<crate::backend::BucketConfig> {
        Some(crate::backend::BucketConfig {
            endpoint: self.index_store_endpoint.clone()?,
            access_key_id: self.index_store_access_key_id.clone()?,
            secret_access_key: self.index_store_secret_access_key.clone()?,
            bucket: self.index_store_bucket.clone()?,
        })
    }

    pub fn allowed_origins_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand_port() {
        let addr: ListenAddr = ":8080".parse().unwrap();
        match addr {
            ListenAddr::Tcp(socket) => {
                assert_eq!(socket.port(), 8080);
                assert_eq!(socket.ip().to_string(), "127.0.0.1");
            }
            _ => panic!("Expected TCP address"),
        }
    }

    #[test]
    fn test_parse_ipv4() {
        let addr: ListenAddr = "0.0.0.0:8080".parse().unwrap();
        match addr {
            ListenAddr::Tcp(socket) => {
                assert_eq!(socket.port(), 8080);
                assert_eq!(socket.ip().to_string(), "0.0.0.0");
            }
            _ => panic!("Expected TCP address"),
        }
    }

    #[test]
    fn test_parse_ipv6() {
        let addr: ListenAddr = "[::]:8080".parse().unwrap();
        match addr {
            ListenAddr::Tcp(socket) => {
                assert_eq!(socket.port(), 8080);
                assert_eq!(socket.ip().to_string(), "::");
            }
            _ => panic!("Expected TCP address"),
        }
    }

    #[test]
    fn test_parse_unix_socket() {
        let addr: ListenAddr = "/tmp/api.sock".parse().unwrap();
        match addr {
            ListenAddr::Unix(path) => {
                assert_eq!(path, PathBuf::from("/tmp/api.sock"));
            }
            _ => panic!("Expected Unix socket"),
        }
    }

    #[test]
    fn test_parse_relative_unix_socket() {
        let addr: ListenAddr = "./api.sock".parse().unwrap();
        match addr {
            ListenAddr::Unix(path) => {
                assert_eq!(path, PathBuf::from("./api.sock"));
            }
            _ => panic!("Expected Unix socket"),
        }
    }
}
