use crate::error::{BigIpError, ErrorPatterns, Result};
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use url::Url;

/// Default ceiling for a single file-transfer chunk (512 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Default root of the file upload namespace
pub const DEFAULT_UPLOAD_ROOT: &str = "mgmt/shared/file-transfer/bulk/uploads";

/// Default root of the file download namespace
pub const DEFAULT_DOWNLOAD_ROOT: &str = "mgmt/shared/file-transfer/bulk";

/// Create the HTTP client for appliance requests
pub fn create_rest_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| BigIpError::Config(format!("invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| BigIpError::Config(format!("invalid value for header {}", name)))?;
        headers.insert(name, value);
    }

    let client = ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .danger_accept_invalid_certs(config.cert_verify_disable)
        .build()?;
    Ok(client)
}

/// Configuration for an appliance session
#[derive(Clone)]
pub struct Config {
    /// Management address, `https://host[:port]` or a bare host
    pub address: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Authentication provider named in token logins
    pub login_provider: String,
    /// Skip TLS certificate verification (lab appliances)
    pub cert_verify_disable: bool,
    /// User-Agent header
    pub user_agent: String,
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Upper bound for a single HTTP call
    pub timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// Lifetime requested for issued tokens; the appliance default is kept when unset
    pub token_timeout: Option<Duration>,
    /// Message fragments used by error classification
    pub error_patterns: ErrorPatterns,
    /// Largest payload sent or requested in one file-transfer chunk
    pub chunk_size: usize,
    /// Root of the upload namespace
    pub upload_root: String,
    /// Root of the download namespace
    pub download_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: String::new(),
            username: String::new(),
            password: String::new(),
            login_provider: "tmos".to_string(),
            cert_verify_disable: false,
            user_agent: format!("bigip-rs/{}", env!("CARGO_PKG_VERSION")),
            headers: Vec::new(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            token_timeout: None,
            error_patterns: ErrorPatterns::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_root: DEFAULT_UPLOAD_ROOT.to_string(),
            download_root: DEFAULT_DOWNLOAD_ROOT.to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration for the given address and credentials
    pub fn new(address: &str, username: &str, password: &str) -> Self {
        Config {
            address: address.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            ..Config::default()
        }
    }

    /// Build a configuration from `BIGIP_HOST`, `BIGIP_USER`, `BIGIP_PASSWORD`,
    /// `BIGIP_CERT_VERIFY_DISABLE` and `BIGIP_TOKEN_TIMEOUT` (seconds).
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| BigIpError::Config(format!("{} is not set", name)))
        };
        let mut config = Config::new(&var("BIGIP_HOST")?, &var("BIGIP_USER")?, &var("BIGIP_PASSWORD")?);

        if let Ok(flag) = std::env::var("BIGIP_CERT_VERIFY_DISABLE") {
            config.cert_verify_disable = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(secs) = std::env::var("BIGIP_TOKEN_TIMEOUT") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| BigIpError::Config(format!("BIGIP_TOKEN_TIMEOUT is not a number: {}", secs)))?;
            config.token_timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Disable or enable TLS certificate verification
    pub fn with_cert_verify_disable(mut self, disable: bool) -> Self {
        self.cert_verify_disable = disable;
        self
    }

    /// Set the login provider
    pub fn with_login_provider(mut self, provider: &str) -> Self {
        self.login_provider = provider.to_string();
        self
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request a token lifetime after login
    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = Some(timeout);
        self
    }

    /// Replace the error classification patterns
    pub fn with_error_patterns(mut self, patterns: ErrorPatterns) -> Self {
        self.error_patterns = patterns;
        self
    }

    /// Set the file-transfer chunk ceiling
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> Result<Url> {
        let address = self.address.trim().trim_end_matches('/');
        if address.is_empty() {
            return Err(BigIpError::Config("appliance address is empty".to_string()));
        }
        let url = if address.contains("://") {
            Url::parse(address)?
        } else {
            Url::parse(&format!("https://{}", address))?
        };
        Ok(url)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("login_provider", &self.login_provider)
            .field("cert_verify_disable", &self.cert_verify_disable)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("token_timeout", &self.token_timeout)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}
