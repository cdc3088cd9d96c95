use crate::heroic::DISTRIBUTED_AGGREGATIONS;
use crate::{Error, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Datasource configuration, normally loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub datasource: DatasourceConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasourceConfig {
    /// Base URL of the Heroic API
    pub url: String,
    /// Request deadline, as a humantime duration
    #[serde(default = "default_timeout")]
    timeout: String,
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuth {
    pub user: String,
    #[serde(default)]
    pub password: String,
}

// keep the password out of logs
impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    #[serde(default = "default_distributed_aggregation_feature")]
    pub distributed_aggregation_feature: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            distributed_aggregation_feature: default_distributed_aggregation_feature(),
        }
    }
}

fn default_timeout() -> String {
    "60s".into()
}

fn default_distributed_aggregation_feature() -> String {
    DISTRIBUTED_AGGREGATIONS.into()
}

impl Config {
    /// A config for `url` with every other setting at its default.
    pub fn new(url: &str) -> Self {
        Self {
            datasource: DatasourceConfig {
                url: url.to_string(),
                timeout: default_timeout(),
                basic_auth: None,
            },
            query: QueryConfig::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("unable to open config file {}: {e}", path.display())))?;

        content.parse()
    }

    pub fn validate(&self) -> Result<()> {
        self.datasource.base_url()?;

        if self.datasource.timeout()?.is_zero() {
            return Err(Error::Config("datasource timeout must be greater than zero".into()));
        }

        Ok(())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.datasource.timeout = humantime::format_duration(timeout).to_string();
        self
    }

    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Self {
        self.datasource.basic_auth = Some(BasicAuth {
            user: user.to_string(),
            password: password.to_string(),
        });
        self
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config file: {e}")))?;

        config.validate()?;
        Ok(config)
    }
}

impl DatasourceConfig {
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.url).map_err(|e| Error::Config(format!("invalid datasource url {:?}: {e}", self.url)))
    }

    /// The batch endpoint, keeping any path prefix on the base URL.
    pub fn batch_url(&self) -> Result<Url> {
        let mut url = self.base_url()?;
        let path = format!("{}/query/batch", url.path().trim_end_matches('/'));
        url.set_path(&path);
        Ok(url)
    }

    pub fn timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.timeout)
            .map_err(|e| Error::Config(format!("invalid datasource timeout {:?}: {e}", self.timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config: Config = "[datasource]\nurl = \"http://heroic:8080\"".parse().unwrap();

        assert_eq!(config.datasource.timeout().unwrap(), Duration::from_secs(60));
        assert!(config.datasource.basic_auth.is_none());
        assert_eq!(config.query.distributed_aggregation_feature, DISTRIBUTED_AGGREGATIONS);
    }

    #[test]
    fn full_config() {
        let config: Config = r#"
            [datasource]
            url = "https://metrics.example.com/heroic/"
            timeout = "2m 30s"

            [datasource.basic_auth]
            user = "grafana"
            password = "hunter2"

            [query]
            distributed_aggregation_feature = "example.distributed"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.datasource.timeout().unwrap(), Duration::from_secs(150));
        assert_eq!(
            config.datasource.basic_auth,
            Some(BasicAuth {
                user: "grafana".into(),
                password: "hunter2".into(),
            })
        );
        assert_eq!(
            config.datasource.batch_url().unwrap().as_str(),
            "https://metrics.example.com/heroic/query/batch"
        );
        assert_eq!(config.query.distributed_aggregation_feature, "example.distributed");
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn batch_url_without_path() {
        let config = Config::new("http://heroic:8080");
        assert_eq!(
            config.datasource.batch_url().unwrap().as_str(),
            "http://heroic:8080/query/batch"
        );
    }

    #[test]
    fn rejects_bad_values() {
        for content in [
            "[datasource]\nurl = \"not a url\"",
            "[datasource]\nurl = \"http://h\"\ntimeout = \"soon\"",
            "[datasource]\nurl = \"http://h\"\ntimeout = \"0s\"",
            "[datasource]\nurl = \"http://h\"\nretries = 3",
            "[query]\n",
        ] {
            assert!(
                matches!(content.parse::<Config>(), Err(Error::Config(_))),
                "accepted: {content}"
            );
        }
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[datasource]\nurl = \"http://heroic:8080\"\ntimeout = \"5s\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.datasource.timeout().unwrap(), Duration::from_secs(5));

        assert!(matches!(
            Config::load(Path::new("/nonexistent/heroic.toml")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn builder_overrides() {
        let config = Config::new("http://h")
            .with_timeout(Duration::from_millis(250))
            .with_basic_auth("u", "p");

        assert_eq!(config.datasource.timeout().unwrap(), Duration::from_millis(250));
        assert_eq!(config.datasource.basic_auth.unwrap().user, "u");
    }
}
