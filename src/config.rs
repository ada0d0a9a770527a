use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_ENV: &str = "TURNSTILE_CONFIG";
/// Overrides the listen port.
pub const PORT_ENV: &str = "TURNSTILE_PORT";
/// Overrides the upstream list (comma-separated).
pub const UPSTREAMS_ENV: &str = "TURNSTILE_UPSTREAMS";
/// Overrides `preserve_host` (`true`/`false`).
pub const PRESERVE_HOST_ENV: &str = "TURNSTILE_PRESERVE_HOST";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid listen port {0:?}")]
    InvalidPort(String),

    #[error("no upstreams configured")]
    NoUpstreams,

    #[error("invalid value {value:?} for {name}")]
    InvalidFlag { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_port: String,
    pub upstreams: Vec<String>,
    /// Forward the client's `Host` header instead of each upstream's own.
    pub preserve_host: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: "8080".to_string(),
            upstreams: vec![
                "https://www.facebook.com".to_string(),
                "https://www.google.com".to_string(),
                "https://www.duckduckgo.com".to_string(),
            ],
            preserve_host: false,
        }
    }
}

impl Config {
    /// Load configuration from the optional YAML file and the environment.
    ///
    /// Environment overrides win over the file, which wins over defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Read { path, source })?;
                Self::from_yaml(&raw)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            cfg.listen_port = port;
        }

        if let Ok(list) = std::env::var(UPSTREAMS_ENV) {
            cfg.upstreams = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(flag) = std::env::var(PRESERVE_HOST_ENV) {
            cfg.preserve_host = flag.trim().parse().map_err(|_| ConfigError::InvalidFlag {
                name: PRESERVE_HOST_ENV,
                value: flag,
            })?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a YAML document; missing keys fall back to defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(raw)?;
        Ok(cfg)
    }

    /// Checks the port and that at least one upstream is listed.
    ///
    /// Upstream addresses themselves are checked when targets are built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.listen_port.parse::<u16>() {
            Ok(port) if port != 0 => {}
            _ => return Err(ConfigError::InvalidPort(self.listen_port.clone())),
        }

        if self.upstreams.is_empty() {
            return Err(ConfigError::NoUpstreams);
        }

        Ok(())
    }

    /// Address the listener binds to, on all interfaces.
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }
}
