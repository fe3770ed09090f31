//! Configuration for the Telegram tools and the DNS updater
//!
//! Loads `config.yml` (falling back to `../config.yml`, then to built-in
//! defaults). Values written as `${VAR}` are taken from the environment, and
//! a `.env` file is read first. The resulting [`Config`] is immutable and is
//! passed by reference to every command.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

pub const SESSION_NAME: &str = "telegram_tools";
pub const LOCK_SUFFIX: &str = ".lock";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 100;
pub const DEFAULT_DELETE_CHUNK: usize = 100;
pub const DEFAULT_GRAYLOG_PORT: u16 = 12201;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

pub const REGRU_API_URL: &str = "https://api.reg.ru";
pub const REGRU_API_PATH: &str = "/api/regru2/zone";
pub const REMOTE_IP_URL: &str = "https://ident.me";
pub const REMOTE_IP_PATH: &str = "/json";
pub const DEFAULT_WAN_INTERFACE: &str = "eth0";
pub const DEFAULT_HOOK_ACTIONS: [&str; 5] = ["ifupdate", "ifup", "up", "reload", "dhcp4-change"];

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    telegram: Option<YamlTelegram>,
    collector: Option<YamlCollector>,
    graylog: Option<YamlGraylog>,
    graph: Option<YamlGraph>,
    ddns: Option<YamlDdns>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlTelegram {
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    api_id: Option<String>,
    api_hash: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    phone: Option<String>,
    session_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlCollector {
    page_size: Option<usize>,
    page_delay_ms: Option<u64>,
    delete_chunk_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlGraylog {
    host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    port: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlGraph {
    channels_ignore: Option<Vec<i64>>,
    color: Option<YamlGraphColor>,
    title: Option<String>,
    wordwrap_length: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlGraphColor {
    client: Option<String>,
    channel: Option<String>,
    user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlDdns {
    api: Option<YamlDdnsApi>,
    host: Option<YamlDdnsHost>,
    remote_ip_check: Option<YamlEndpoint>,
    hook: Option<YamlHook>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlDdnsApi {
    url: Option<String>,
    path: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlDdnsHost {
    domain: Option<String>,
    record: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlEndpoint {
    url: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct YamlHook {
    actions: Option<Vec<String>>,
    wan_interface: Option<String>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Telegram API credentials and session location.
#[derive(Debug, Clone, PartialEq)]
pub struct TelegramConfig {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
    pub session_name: String,
}

impl TelegramConfig {
    pub fn session_file(&self) -> String {
        format!("{}.session", self.session_name)
    }

    pub fn lock_file(&self) -> String {
        format!("{}{}", self.session_name, LOCK_SUFFIX)
    }

    /// Fail early when the credentials needed to talk to Telegram are missing.
    pub fn validate(&self) -> Result<()> {
        if self.api_id <= 0 {
            return Err(Error::Config("telegram.api_id is not set".to_string()));
        }
        if self.api_hash.trim().is_empty() {
            return Err(Error::Config("telegram.api_hash is not set".to_string()));
        }
        Ok(())
    }
}

/// Pagination tuning for the range collector.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub page_size: usize,
    pub page_delay: Duration,
    pub delete_chunk_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraylogConfig {
    pub host: Option<String>,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphColors {
    pub client: String,
    pub channel: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    pub channels_ignore: Vec<i64>,
    pub colors: GraphColors,
    pub title: String,
    pub wordwrap_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DdnsApiConfig {
    pub url: String,
    pub path: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DdnsConfig {
    pub api: DdnsApiConfig,
    pub domain: String,
    pub record: String,
    pub remote_ip_url: String,
    pub remote_ip_path: String,
    pub hook_actions: Vec<String>,
    pub wan_interface: String,
    pub timeout: Duration,
}

impl DdnsConfig {
    /// Whether an `(interface, action)` hook invocation concerns the WAN link.
    pub fn accepts_hook(&self, interface: &str, action: &str) -> bool {
        interface == self.wan_interface && self.hook_actions.iter().any(|a| a == action)
    }
}

/// Main configuration struct
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub collector: CollectorConfig,
    pub graylog: GraylogConfig,
    pub graph: GraphConfig,
    pub ddns: DdnsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml string values
    pub fn load() -> Result<Self> {
        Self::load_first_existing(&[Path::new("config.yml"), Path::new("../config.yml")])
    }

    /// Load the first candidate that exists. Defaults apply only when none does;
    /// a file that exists but cannot be read or parsed is an error.
    pub fn load_first_existing(candidates: &[&Path]) -> Result<Self> {
        match candidates.iter().find(|path| path.exists()) {
            Some(path) => Self::load_from_file(path),
            None => {
                Self::load_dotenv();
                Ok(Self::from_yaml(YamlConfig::default()))
            }
        }
    }

    /// Load configuration from an explicit path, or search the defaults when `None`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> String {
        Self::resolve_env_opt(value, env_key).unwrap_or_default()
    }

    fn resolve_env_opt(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if let Some(var_name) = placeholder_name(v) {
                if let Ok(env_val) = std::env::var(var_name) {
                    return Some(env_val);
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return Some(env_val);
        }
        value.filter(|v| placeholder_name(v).is_none())
    }

    /// Resolve a numeric value from string config or env var.
    /// A literal number in YAML wins over the environment.
    fn resolve_env_num<T: std::str::FromStr>(value: Option<String>, env_key: &str) -> Option<T> {
        if let Some(ref v) = value {
            if let Some(var_name) = placeholder_name(v) {
                if let Some(parsed) = std::env::var(var_name).ok().and_then(|s| s.parse().ok()) {
                    return Some(parsed);
                }
            }
            if let Ok(parsed) = v.parse::<T>() {
                return Some(parsed);
            }
        }
        std::env::var(env_key).ok().and_then(|s| s.parse().ok())
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let telegram = yaml.telegram.unwrap_or_default();
        let collector = yaml.collector.unwrap_or_default();
        let graylog = yaml.graylog.unwrap_or_default();
        let graph = yaml.graph.unwrap_or_default();
        let colors = graph.color.unwrap_or_default();
        let ddns = yaml.ddns.unwrap_or_default();
        let api = ddns.api.unwrap_or_default();
        let host = ddns.host.unwrap_or_default();
        let remote = ddns.remote_ip_check.unwrap_or_default();
        let hook = ddns.hook.unwrap_or_default();

        Self {
            telegram: TelegramConfig {
                api_id: Self::resolve_env_num(telegram.api_id, "TELEGRAM_API_ID").unwrap_or(0),
                api_hash: Self::resolve_env_string(telegram.api_hash, "TELEGRAM_API_HASH"),
                phone: Self::resolve_env_string(telegram.phone, "TELEGRAM_PHONE"),
                session_name: Self::resolve_env_opt(telegram.session_name, "TELEGRAM_SESSION")
                    .unwrap_or_else(|| SESSION_NAME.to_string()),
            },
            collector: CollectorConfig {
                page_size: collector.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
                page_delay: Duration::from_millis(
                    collector.page_delay_ms.unwrap_or(DEFAULT_PAGE_DELAY_MS),
                ),
                delete_chunk_size: collector.delete_chunk_size.unwrap_or(DEFAULT_DELETE_CHUNK),
            },
            graylog: GraylogConfig {
                host: Self::resolve_env_opt(graylog.host, "GRAYLOG_HOST"),
                port: Self::resolve_env_num(graylog.port, "GRAYLOG_PORT")
                    .unwrap_or(DEFAULT_GRAYLOG_PORT),
            },
            graph: GraphConfig {
                channels_ignore: graph.channels_ignore.unwrap_or_default(),
                colors: GraphColors {
                    client: colors.client.unwrap_or_else(|| "gold".to_string()),
                    channel: colors.channel.unwrap_or_else(|| "technology".to_string()),
                    user: colors.user.unwrap_or_else(|| "lavender".to_string()),
                },
                title: graph
                    .title
                    .unwrap_or_else(|| "Telegram channels relationships".to_string()),
                wordwrap_length: graph.wordwrap_length.unwrap_or(15),
            },
            ddns: DdnsConfig {
                api: DdnsApiConfig {
                    url: api.url.unwrap_or_else(|| REGRU_API_URL.to_string()),
                    path: api.path.unwrap_or_else(|| REGRU_API_PATH.to_string()),
                    username: Self::resolve_env_string(api.username, "REGRU_USERNAME"),
                    password: Self::resolve_env_string(api.password, "REGRU_PASSWORD"),
                },
                domain: host.domain.unwrap_or_default(),
                record: host.record.unwrap_or_default(),
                remote_ip_url: remote.url.unwrap_or_else(|| REMOTE_IP_URL.to_string()),
                remote_ip_path: remote.path.unwrap_or_else(|| REMOTE_IP_PATH.to_string()),
                hook_actions: hook.actions.unwrap_or_else(|| {
                    DEFAULT_HOOK_ACTIONS.iter().map(|a| a.to_string()).collect()
                }),
                wan_interface: hook
                    .wan_interface
                    .unwrap_or_else(|| DEFAULT_WAN_INTERFACE.to_string()),
                timeout: Duration::from_secs(ddns.timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)),
            },
        }
    }

    /// Built-in defaults, ignoring config files and the environment.
    pub fn defaults() -> Self {
        Self {
            telegram: TelegramConfig {
                api_id: 0,
                api_hash: String::new(),
                phone: String::new(),
                session_name: SESSION_NAME.to_string(),
            },
            collector: CollectorConfig {
                page_size: DEFAULT_PAGE_SIZE,
                page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
                delete_chunk_size: DEFAULT_DELETE_CHUNK,
            },
            graylog: GraylogConfig {
                host: None,
                port: DEFAULT_GRAYLOG_PORT,
            },
            graph: GraphConfig {
                channels_ignore: Vec::new(),
                colors: GraphColors {
                    client: "gold".to_string(),
                    channel: "technology".to_string(),
                    user: "lavender".to_string(),
                },
                title: "Telegram channels relationships".to_string(),
                wordwrap_length: 15,
            },
            ddns: DdnsConfig {
                api: DdnsApiConfig {
                    url: REGRU_API_URL.to_string(),
                    path: REGRU_API_PATH.to_string(),
                    username: String::new(),
                    password: String::new(),
                },
                domain: String::new(),
                record: String::new(),
                remote_ip_url: REMOTE_IP_URL.to_string(),
                remote_ip_path: REMOTE_IP_PATH.to_string(),
                hook_actions: DEFAULT_HOOK_ACTIONS.iter().map(|a| a.to_string()).collect(),
                wan_interface: DEFAULT_WAN_INTERFACE.to_string(),
                timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            },
        }
    }
}

/// `${NAME}` -> `Some("NAME")`
fn placeholder_name(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
}
