//! Correlation and logging configuration.
//!
//! The middleware never reads ambient process state on the request path.
//! Build a [`CorrelationConfig`] once at startup, either explicitly or from
//! the environment, and hand it to
//! [`RequestLogger`](crate::middleware::RequestLogger).
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `APP_NAME` | Application name, slugged into the id prefix | — |
//! | `APP_ENV` | Deployment environment, slugged into the id prefix | — |
//! | `REQUEST_ID_HEADER` | Correlation header name | `x-request-id` |

use http::HeaderName;

use crate::error::ConfigError;
use crate::middleware::correlation::slugify;

/// Default correlation header.
pub const DEFAULT_HEADER: &str = "x-request-id";

/// Header values replaced by [`REDACTED`](crate::middleware::logging::REDACTED)
/// in logged header maps unless overridden.
pub const DEFAULT_REDACTED_HEADERS: [&str; 4] =
    ["authorization", "proxy-authorization", "cookie", "set-cookie"];

/// Identity and header settings for the correlation middleware.
#[derive(Clone, Debug)]
pub struct CorrelationConfig {
    app_name: String,
    app_env: String,
    header: HeaderName,
    redacted_headers: Vec<HeaderName>,
}

impl CorrelationConfig {
    /// Builds a config for `app_name` running in `app_env`.
    ///
    /// Fails with [`ConfigError::MissingIdentity`] when both values slug to an
    /// empty string, since every generated id would then lack a prefix.
    ///
    /// ```rust
    /// use stitch::CorrelationConfig;
    ///
    /// let config = CorrelationConfig::new("My App", "Production").unwrap();
    /// assert_eq!(config.header().as_str(), "x-request-id");
    /// ```
    pub fn new(app_name: impl Into<String>, app_env: impl Into<String>) -> Result<Self, ConfigError> {
        let app_name = app_name.into();
        let app_env = app_env.into();

        if slugify(&app_name).is_empty() && slugify(&app_env).is_empty() {
            return Err(ConfigError::MissingIdentity);
        }

        Ok(Self {
            app_name,
            app_env,
            header: HeaderName::from_static(DEFAULT_HEADER),
            redacted_headers: DEFAULT_REDACTED_HEADERS
                .into_iter()
                .map(HeaderName::from_static)
                .collect(),
        })
    }

    /// Reads `APP_NAME`, `APP_ENV` and `REQUEST_ID_HEADER` from the process
    /// environment. Unset name/env are treated as empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary variable source.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let name = lookup("APP_NAME").unwrap_or_default();
        let env = lookup("APP_ENV").unwrap_or_default();
        let config = Self::new(name, env)?;

        match lookup("REQUEST_ID_HEADER") {
            Some(header) if !header.trim().is_empty() => config.with_header(header.trim()),
            _ => Ok(config),
        }
    }

    /// Overrides the correlation header name. Header names are
    /// case-insensitive and stored lower-cased.
    pub fn with_header(mut self, name: &str) -> Result<Self, ConfigError> {
        self.header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(name.to_owned()))?;
        Ok(self)
    }

    /// Replaces the set of headers whose values are masked in log entries.
    /// Pass an empty slice to log every header verbatim.
    pub fn with_redacted_headers(mut self, names: &[&str]) -> Result<Self, ConfigError> {
        self.redacted_headers = names
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ConfigError::InvalidHeaderName((*name).to_owned()))
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    /// The raw application name.
    pub fn app_name(&self) -> &str { &self.app_name }

    /// The raw environment name, logged verbatim as `environment`.
    pub fn app_env(&self) -> &str { &self.app_env }

    pub fn header(&self) -> &HeaderName { &self.header }

    pub fn redacted_headers(&self) -> &[HeaderName] { &self.redacted_headers }
}
