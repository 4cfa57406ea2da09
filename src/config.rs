//! Configuration loading and types for tenantfs.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct: the object store connection, logging and
//! observability. Connection settings are fixed for the lifetime of a
//! storage instance once loaded.

use garde::Validate;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Object store connection settings.
    pub storage: StoreConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// S3-compatible object store connection settings.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StoreConfig {
    /// Host name, or a full URL (`http://minio:9000`).
    #[garde(length(min = 1))]
    pub endpoint: String,

    /// Port appended to a bare host endpoint.
    #[serde(default)]
    #[garde(skip)]
    pub port: Option<u16>,

    /// Static access key. Falls back to the default credential chain when unset.
    #[serde(default, alias = "accessKey")]
    #[garde(skip)]
    pub access_key: Option<String>,

    /// Static secret key.
    #[serde(default, alias = "secretKey")]
    #[garde(skip)]
    pub secret_key: Option<String>,

    /// Region (defaults to `us-east-1`).
    #[serde(default)]
    #[garde(skip)]
    pub region: Option<String>,

    /// Use HTTPS for a bare host endpoint.
    #[serde(default)]
    #[garde(skip)]
    pub secure: bool,

    /// Bucket holding every tenant's objects.
    #[garde(length(min = 3, max = 63))]
    pub bucket: String,

    /// Virtual-host style addressing (`bucket.host`) instead of path style.
    #[serde(default)]
    #[garde(skip)]
    pub vhost: bool,

    /// Multipart threshold and part size.
    #[serde(default, alias = "partSize")]
    #[garde(skip)]
    pub part_size: ByteSize,

    /// Optional outbound proxy.
    #[serde(default, alias = "proxyConfiguration")]
    #[garde(skip)]
    pub proxy: Option<ProxyConfig>,

    /// PEM encoded CA certificate.
    #[serde(default, alias = "caPem")]
    #[garde(skip)]
    pub ca_pem: Option<String>,

    /// PEM encoded client certificate and private key.
    #[serde(default, alias = "clientPem")]
    #[garde(skip)]
    pub client_pem: Option<String>,

    /// TLS verification switches.
    #[serde(default, alias = "sslOptions")]
    #[garde(skip)]
    pub ssl_options: SslOptions,
}

impl StoreConfig {
    /// Run field validation plus the cross-field rules garde cannot express.
    pub fn verify(&self) -> anyhow::Result<()> {
        self.validate()
            .map_err(|report| anyhow::anyhow!("invalid storage configuration: {report}"))?;

        if self.access_key.is_some() != self.secret_key.is_some() {
            anyhow::bail!("storage.access_key and storage.secret_key must be set together");
        }

        let part_size = self.part_size.value();
        if !(MIN_PART_SIZE_BYTES..=MAX_PART_SIZE_BYTES).contains(&part_size) {
            anyhow::bail!(
                "storage.part_size must be between {} and {} bytes, got {}",
                MIN_PART_SIZE_BYTES,
                MAX_PART_SIZE_BYTES,
                part_size
            );
        }

        if let Some(proxy) = &self.proxy {
            if proxy.proxy_type != ProxyType::Direct
                && (proxy.address.is_none() || proxy.port.is_none())
            {
                anyhow::bail!(
                    "storage.proxy of type {:?} requires both address and port",
                    proxy.proxy_type
                );
            }
        }

        Ok(())
    }

    /// Endpoint URL handed to the S3 client.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.trim_end_matches('/').to_string();
        }
        let scheme = if self.secure { "https" } else { "http" };
        match self.port {
            Some(port) => format!("{scheme}://{}:{port}", self.endpoint),
            None => format!("{scheme}://{}", self.endpoint),
        }
    }

    /// Region, defaulting to `us-east-1`.
    pub fn region(&self) -> String {
        self.region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string())
    }

    /// Static credentials, when both keys are configured.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(ak), Some(sk)) => Some((ak.as_str(), sk.as_str())),
            _ => None,
        }
    }

    /// Whether any transport-level TLS/proxy setting is configured.
    pub fn has_transport_overrides(&self) -> bool {
        self.ca_pem.is_some()
            || self.client_pem.is_some()
            || self.ssl_options.insecure_trust_all_certificates == Some(true)
            || self
                .proxy
                .as_ref()
                .is_some_and(|p| p.proxy_type != ProxyType::Direct)
    }
}

/// Outbound proxy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Proxy kind.
    #[serde(default, rename = "type")]
    pub proxy_type: ProxyType,
    /// Proxy host.
    #[serde(default)]
    pub address: Option<String>,
    /// Proxy port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Proxy username.
    #[serde(default)]
    pub username: Option<String>,
    /// Proxy password.
    #[serde(default)]
    pub password: Option<String>,
}

/// Proxy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProxyType {
    #[default]
    Direct,
    Http,
    Socks,
}

/// TLS verification switches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SslOptions {
    /// Skip remote certificate checks. Testing only.
    #[serde(default, alias = "insecureTrustAllCertificates")]
    pub insecure_trust_all_certificates: Option<bool>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Install the Prometheus recorder for operation metrics.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

// -- Byte sizes --------------------------------------------------------------

const KB_UNIT: u64 = 1024;

/// Smallest part S3 accepts for every part but the last (5 MiB).
pub const MIN_PART_SIZE_BYTES: u64 = 5 * KB_UNIT * KB_UNIT;

/// Largest part S3 accepts (5 GiB).
pub const MAX_PART_SIZE_BYTES: u64 = 5 * KB_UNIT * KB_UNIT * KB_UNIT;

/// A byte count, configurable as a number or as `"<n>KB"`, `"<n>MB"`, `"<n>GB"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawByteSize")]
pub struct ByteSize(u64);

impl ByteSize {
    /// Wrap a raw byte count.
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// The byte count.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Default for ByteSize {
    fn default() -> Self {
        Self(5 * KB_UNIT * KB_UNIT)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error for byte size strings that cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Cannot convert '{0}' to long bytes size.")]
pub struct InvalidByteSize(String);

impl FromStr for ByteSize {
    type Err = InvalidByteSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidByteSize(s.to_string());
        let upper = s.trim().to_ascii_uppercase();

        let (number, multiplier) = if let Some(n) = upper.strip_suffix("KB") {
            (n, KB_UNIT)
        } else if let Some(n) = upper.strip_suffix("MB") {
            (n, KB_UNIT * KB_UNIT)
        } else if let Some(n) = upper.strip_suffix("GB") {
            (n, KB_UNIT * KB_UNIT * KB_UNIT)
        } else {
            (upper.as_str(), 1)
        };

        let number: u64 = number.trim().parse().map_err(|_| invalid())?;
        number
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(invalid)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawByteSize {
    Number(u64),
    Text(String),
}

impl TryFrom<RawByteSize> for ByteSize {
    type Error = InvalidByteSize;

    fn try_from(raw: RawByteSize) -> Result<Self, Self::Error> {
        match raw {
            RawByteSize::Number(n) => Ok(ByteSize(n)),
            RawByteSize::Text(s) => s.parse(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load, parse and validate configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    config.storage.verify()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = "
storage:
  endpoint: localhost
  port: 9000
  bucket: unittest
  access_key: test-access-key
  secret_key: test-secret-key
";

    fn parse(yaml: &str) -> anyhow::Result<Config> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.storage.verify()?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.storage.part_size, ByteSize::new(5 * 1024 * 1024));
        assert!(!config.storage.secure);
        assert!(!config.storage.vhost);
        assert_eq!(config.storage.region(), "us-east-1");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "text");
        assert!(config.observability.metrics);
        assert!(!config.storage.has_transport_overrides());
    }

    #[test]
    fn test_part_size_as_number() {
        let config = parse(&format!("{MINIMAL}  part_size: 6291456\n")).unwrap();
        assert_eq!(config.storage.part_size, ByteSize::new(6 * 1024 * 1024));
    }

    #[test]
    fn test_part_size_out_of_range_rejected() {
        let err = parse(&format!("{MINIMAL}  part_size: 1024\n")).unwrap_err();
        assert!(err.to_string().contains("storage.part_size"));
        assert!(parse(&format!("{MINIMAL}  part_size: 6GB\n")).is_err());

        assert!(parse(&format!("{MINIMAL}  part_size: 5MB\n")).is_ok());
        assert!(parse(&format!("{MINIMAL}  part_size: 5GB\n")).is_ok());
    }

    #[test]
    fn test_part_size_as_string() {
        let config = parse(&format!("{MINIMAL}  partSize: 50MB\n")).unwrap();
        assert_eq!(config.storage.part_size, ByteSize::new(1024 * 1024 * 50));
    }

    #[test]
    fn test_part_size_unsupported_unit() {
        assert!(parse(&format!("{MINIMAL}  part_size: 50TB\n")).is_err());
    }

    #[test]
    fn test_byte_size_parse() {
        assert_eq!("1KB".parse::<ByteSize>().unwrap().value(), 1024);
        assert_eq!("2gb".parse::<ByteSize>().unwrap().value(), 2 * 1024 * 1024 * 1024);
        assert_eq!("77".parse::<ByteSize>().unwrap().value(), 77);
        assert_eq!(
            "50TB".parse::<ByteSize>(),
            Err(InvalidByteSize("50TB".to_string()))
        );
        assert!("".parse::<ByteSize>().is_err());
        assert!("MB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_endpoint_url() {
        let mut config = parse(MINIMAL).unwrap().storage;
        assert_eq!(config.endpoint_url(), "http://localhost:9000");

        config.secure = true;
        config.port = None;
        assert_eq!(config.endpoint_url(), "https://localhost");

        config.endpoint = "http://minio:9000/".to_string();
        assert_eq!(config.endpoint_url(), "http://minio:9000");
    }

    #[test]
    fn test_static_credentials() {
        let config = parse(MINIMAL).unwrap().storage;
        assert_eq!(
            config.static_credentials(),
            Some(("test-access-key", "test-secret-key"))
        );
    }

    #[test]
    fn test_half_credentials_rejected() {
        let yaml = "
storage:
  endpoint: localhost
  bucket: unittest
  access_key: only-access
";
        assert!(parse(yaml).is_err());
    }

    #[test]
    fn test_short_bucket_rejected() {
        let yaml = "
storage:
  endpoint: localhost
  bucket: ab
";
        assert!(parse(yaml).is_err());
    }

    #[test]
    fn test_proxy_requires_address() {
        let yaml = format!("{MINIMAL}  proxy:\n    type: HTTP\n    port: 3128\n");
        assert!(parse(&yaml).is_err());

        let yaml = format!(
            "{MINIMAL}  proxy:\n    type: HTTP\n    address: proxy.local\n    port: 3128\n"
        );
        let config = parse(&yaml).unwrap();
        assert!(config.storage.has_transport_overrides());
    }

    #[test]
    fn test_direct_proxy_needs_nothing() {
        let yaml = format!("{MINIMAL}  proxy:\n    type: DIRECT\n");
        let config = parse(&yaml).unwrap();
        assert!(!config.storage.has_transport_overrides());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{MINIMAL}logging:\n  level: debug\n  format: json\nobservability:\n  metrics: false\n"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.storage.bucket, "unittest");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert!(!config.observability.metrics);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/tenantfs.yaml").is_err());
    }
}
