use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use rand::Rng;
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::domain::Identifier;
use crate::error::CoverError;
use crate::sanitize::DEFAULT_MAX_TITLE_LEN;

pub const CONFIG_FILE_NAME: &str = "cover-fetcher.json";
pub const DEFAULT_CATALOG_URL: &str = "https://www.javbus.com";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_STAGGER_MS: u64 = 100;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub accept_language: Option<String>,
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub retry_delay_ms: Option<WindowMs>,
    #[serde(default)]
    pub throttle_ms: Option<WindowMs>,
    #[serde(default)]
    pub stagger_ms: Option<u64>,
    #[serde(default)]
    pub max_title_len: Option<usize>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct WindowMs {
    pub min_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root: Option<PathBuf>,
    pub proxy: Option<String>,
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    min: Duration,
    max: Duration,
}

impl DelayWindow {
    pub const ZERO: DelayWindow = DelayWindow {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn new(min: Duration, max: Duration) -> Result<Self, CoverError> {
        if min > max {
            return Err(CoverError::InvalidConfig(format!(
                "delay window minimum {min:?} exceeds maximum {max:?}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    fn from_ms(window: WindowMs) -> Result<Self, CoverError> {
        Self::new(
            Duration::from_millis(window.min_ms),
            Duration::from_millis(window.max_ms),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    timeout: Duration,
    backoff: DelayWindow,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        timeout: Duration,
        backoff: DelayWindow,
    ) -> Result<Self, CoverError> {
        if max_attempts == 0 {
            return Err(CoverError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(CoverError::InvalidConfig(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            timeout,
            backoff,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backoff(&self) -> DelayWindow {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            backoff: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    base_url: String,
    headers: HeaderMap,
}

impl CatalogSettings {
    pub fn new(
        base_url: &str,
        user_agent: &str,
        accept_language: &str,
        cookie: Option<&str>,
    ) -> Result<Self, CoverError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CoverError::InvalidConfig(format!(
                "catalog_url must be an http(s) URL: {base_url}"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("user_agent", user_agent)?);
        headers.insert(ACCEPT_LANGUAGE, header_value("accept_language", accept_language)?);
        if let Some(cookie) = cookie.filter(|value| !value.trim().is_empty()) {
            headers.insert(COOKIE, header_value("cookie", cookie.trim())?);
        }

        Ok(Self { base_url, headers })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_url(&self, identifier: &Identifier) -> String {
        format!("{}/{}", self.base_url, identifier.as_str())
    }

    pub fn request_headers(&self, identifier: &Identifier) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Ok(referer) = HeaderValue::from_str(&self.page_url(identifier)) {
            headers.insert(REFERER, referer);
        }
        headers
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(default_user_agent()));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
        Self {
            base_url: DEFAULT_CATALOG_URL.to_string(),
            headers,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    pub root: PathBuf,
    pub proxy: Option<String>,
    pub concurrency: usize,
    pub catalog: CatalogSettings,
    pub retry: RetryPolicy,
    pub throttle: DelayWindow,
    pub stagger: Duration,
    pub max_title_len: usize,
}

impl RunSettings {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            proxy: None,
            concurrency: DEFAULT_CONCURRENCY,
            catalog: CatalogSettings::default(),
            retry: RetryPolicy::default(),
            throttle: default_throttle(),
            stagger: Duration::from_millis(DEFAULT_STAGGER_MS),
            max_title_len: DEFAULT_MAX_TITLE_LEN,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<RunSettings, CoverError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::discover() {
                Some(found) => Self::load(&found)?,
                None => Config::default(),
            },
        };
        Self::resolve_config(config, overrides)
    }

    pub fn load(path: &Path) -> Result<Config, CoverError> {
        let content =
            fs::read_to_string(path).map_err(|_| CoverError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| CoverError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<RunSettings, CoverError> {
        let root = overrides
            .root
            .or(config.root)
            .ok_or_else(|| CoverError::InvalidConfig("no root directory given".to_string()))?;
        if root.as_os_str().is_empty() {
            return Err(CoverError::InvalidConfig("root directory is empty".to_string()));
        }

        let concurrency = overrides
            .concurrency
            .or(config.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(CoverError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let proxy = overrides
            .proxy
            .or(config.proxy)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let catalog = CatalogSettings::new(
            config.catalog_url.as_deref().unwrap_or(DEFAULT_CATALOG_URL),
            config.user_agent.as_deref().unwrap_or(default_user_agent()),
            config
                .accept_language
                .as_deref()
                .unwrap_or(DEFAULT_ACCEPT_LANGUAGE),
            config.cookie.as_deref(),
        )?;

        let retry = RetryPolicy::new(
            overrides
                .max_attempts
                .or(config.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            Duration::from_secs(config.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            config
                .retry_delay_ms
                .map(DelayWindow::from_ms)
                .transpose()?
                .unwrap_or_else(default_retry_delay),
        )?;

        let throttle = config
            .throttle_ms
            .map(DelayWindow::from_ms)
            .transpose()?
            .unwrap_or_else(default_throttle);

        let max_title_len = config.max_title_len.unwrap_or(DEFAULT_MAX_TITLE_LEN);
        if max_title_len == 0 {
            return Err(CoverError::InvalidConfig(
                "max_title_len must be at least 1".to_string(),
            ));
        }

        Ok(RunSettings {
            root,
            proxy,
            concurrency,
            catalog,
            retry,
            throttle,
            stagger: Duration::from_millis(config.stagger_ms.unwrap_or(DEFAULT_STAGGER_MS)),
            max_title_len,
        })
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "cover-fetcher")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue, CoverError> {
    HeaderValue::from_str(value).map_err(|err| {
        CoverError::InvalidConfig(format!("{field} is not a valid header value: {err}"))
    })
}

fn default_user_agent() -> &'static str {
    concat!("cover-fetcher/", env!("CARGO_PKG_VERSION"))
}

fn default_retry_delay() -> DelayWindow {
    DelayWindow {
        min: Duration::from_secs(2),
        max: Duration::from_secs(5),
    }
}

fn default_throttle() -> DelayWindow {
    DelayWindow {
        min: Duration::from_secs(3),
        max: Duration::from_secs(6),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_follow_documented_values() {
        let config = Config {
            root: Some(PathBuf::from("/media/videos")),
            ..Config::default()
        };
        let settings = ConfigLoader::resolve_config(config, ConfigOverrides::default()).unwrap();
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.retry.max_attempts(), 3);
        assert_eq!(settings.retry.timeout(), Duration::from_secs(20));
        assert_eq!(settings.retry.backoff().min(), Duration::from_secs(2));
        assert_eq!(settings.retry.backoff().max(), Duration::from_secs(5));
        assert_eq!(settings.throttle.min(), Duration::from_secs(3));
        assert_eq!(settings.stagger, Duration::from_millis(100));
        assert_eq!(settings.max_title_len, 150);
        assert!(settings.proxy.is_none());
    }

    #[test]
    fn overrides_win_over_file() {
        let config = Config {
            root: Some(PathBuf::from("/from/file")),
            concurrency: Some(4),
            proxy: Some("socks5h://127.0.0.1:7897".to_string()),
            ..Config::default()
        };
        let overrides = ConfigOverrides {
            root: Some(PathBuf::from("/from/cli")),
            concurrency: Some(1),
            proxy: None,
            max_attempts: Some(5),
        };
        let settings = ConfigLoader::resolve_config(config, overrides).unwrap();
        assert_eq!(settings.root, PathBuf::from("/from/cli"));
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.retry.max_attempts(), 5);
        assert_eq!(settings.proxy.as_deref(), Some("socks5h://127.0.0.1:7897"));
    }

    #[test]
    fn rejects_zero_limits() {
        let config = Config {
            root: Some(PathBuf::from("/x")),
            concurrency: Some(0),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config, ConfigOverrides::default()).unwrap_err();
        assert_matches!(err, CoverError::InvalidConfig(_));

        let err = RetryPolicy::new(0, Duration::from_secs(1), DelayWindow::ZERO).unwrap_err();
        assert_matches!(err, CoverError::InvalidConfig(_));

        let err = RetryPolicy::new(1, Duration::ZERO, DelayWindow::ZERO).unwrap_err();
        assert_matches!(err, CoverError::InvalidConfig(_));
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let err = ConfigLoader::resolve_config(Config::default(), ConfigOverrides::default())
            .unwrap_err();
        assert_matches!(err, CoverError::InvalidConfig(_));
    }

    #[test]
    fn delay_window_samples_within_bounds() {
        let window =
            DelayWindow::new(Duration::from_millis(20), Duration::from_millis(50)).unwrap();
        for _ in 0..200 {
            let delay = window.sample();
            assert!(delay >= window.min() && delay <= window.max());
        }
        assert!(DelayWindow::new(Duration::from_secs(2), Duration::from_secs(1)).is_err());
    }

    #[test]
    fn request_headers_carry_referer() {
        let catalog =
            CatalogSettings::new("https://catalog.test/", "agent/1.0", "en", Some("a=b")).unwrap();
        let id: Identifier = "ABC-123".parse().unwrap();
        assert_eq!(catalog.page_url(&id), "https://catalog.test/ABC-123");

        let headers = catalog.request_headers(&id);
        assert_eq!(headers[REFERER], "https://catalog.test/ABC-123");
        assert_eq!(headers[USER_AGENT], "agent/1.0");
        assert_eq!(headers[COOKIE], "a=b");
    }

    #[test]
    fn rejects_non_http_catalog() {
        let err = CatalogSettings::new("ftp://catalog.test", "a", "en", None).unwrap_err();
        assert_matches!(err, CoverError::InvalidConfig(_));
    }
}
