use clap::{Parser, ValueEnum};
use snip_gateway::TrustedSubnet;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "SNIP_GATEWAY_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "SNIP_GATEWAY_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "SNIP_GATEWAY_STORAGE_BACKEND";
pub const FILE_PATH_ENV: &str = "SNIP_GATEWAY_FILE_PATH";
pub const MYSQL_DSN_ENV: &str = "SNIP_GATEWAY_MYSQL_DSN";
pub const OWNER_HEADER_ENV: &str = "SNIP_GATEWAY_OWNER_HEADER";
pub const DELETE_BATCH_SIZE_ENV: &str = "SNIP_GATEWAY_DELETE_BATCH_SIZE";
pub const DELETE_FLUSH_TIMEOUT_ENV: &str = "SNIP_GATEWAY_DELETE_FLUSH_TIMEOUT_SECS";
pub const MAX_ATTEMPTS_ENV: &str = "SNIP_GATEWAY_MAX_ATTEMPTS";
pub const JSON_LOGS_ENV: &str = "SNIP_GATEWAY_JSON_LOGS";
pub const TRUSTED_SUBNET_ENV: &str = "SNIP_GATEWAY_TRUSTED_SUBNET";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_FILE_PATH: &str = "short_urls.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snip-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix prepended to short codes in responses.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = FILE_PATH_ENV, default_value = DEFAULT_FILE_PATH)]
    pub file_path: PathBuf,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = OWNER_HEADER_ENV, default_value = snip_gateway::DEFAULT_OWNER_HEADER)]
    pub owner_header: String,

    #[arg(
        long,
        env = DELETE_BATCH_SIZE_ENV,
        default_value_t = snip_shortener::deletion::DEFAULT_BATCH_SIZE
    )]
    pub delete_batch_size: usize,

    #[arg(
        long,
        env = DELETE_FLUSH_TIMEOUT_ENV,
        default_value_t = snip_shortener::deletion::DEFAULT_FLUSH_TIMEOUT.as_secs()
    )]
    pub delete_flush_timeout_secs: u64,

    #[arg(
        long,
        env = MAX_ATTEMPTS_ENV,
        default_value_t = snip_shortener::service::DEFAULT_MAX_ATTEMPTS
    )]
    pub max_attempts: usize,

    /// CIDR block allowed to call `/api/internal/stats`. Unset denies everyone.
    #[arg(long, env = TRUSTED_SUBNET_ENV)]
    pub trusted_subnet: Option<TrustedSubnet>,

    #[arg(long, env = JSON_LOGS_ENV)]
    pub json_logs: bool,
}

impl CLI {
    pub fn delete_flush_timeout(&self) -> Duration {
        Duration::from_secs(self.delete_flush_timeout_secs)
    }
}
