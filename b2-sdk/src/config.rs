//! 客户端配置
//!
//! 可以通过builder、环境变量或者任意serde格式（例如toml）得到。

use crate::Error;
use crate::types_rs::TestMode;
use crate::webifier::DEFAULT_MASTER_URL;
use bon::bon;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("b2-sdk-rust/", env!("CARGO_PKG_VERSION"));

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_owned()
}

fn default_master_url() -> String {
    DEFAULT_MASTER_URL.to_owned()
}

#[derive(Deserialize, Clone)]
pub struct ClientConfig {
    pub account_id: String,
    pub application_key: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_master_url")]
    pub master_url: String,
    #[serde(default)]
    pub test_mode: Option<TestMode>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// 整个请求的超时时间，不设置则不限制
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[bon]
impl ClientConfig {
    #[builder(on(String, into))]
    pub fn new(
        account_id: String,
        application_key: String,
        #[builder(default = default_user_agent())] user_agent: String,
        #[builder(default = default_master_url())] master_url: String,
        test_mode: Option<TestMode>,
        connect_timeout_secs: Option<u64>,
        timeout_secs: Option<u64>,
    ) -> Result<Self, Error> {
        let config = Self {
            account_id,
            application_key,
            user_agent,
            master_url,
            test_mode,
            connect_timeout_secs,
            timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    /// 从环境变量读取
    ///
    /// - 必须：`B2_ACCOUNT_ID`、`B2_APPLICATION_KEY`
    /// - 可选：`B2_USER_AGENT`、`B2_MASTER_URL`、`B2_TEST_MODE`
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Common(format!("environment variable {key} is not set")))
        };
        let test_mode = lookup("B2_TEST_MODE")
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<TestMode>().map_err(Error::Common))
            .transpose()?;

        Self::builder()
            .account_id(required("B2_ACCOUNT_ID")?)
            .application_key(required("B2_APPLICATION_KEY")?)
            .user_agent(lookup("B2_USER_AGENT").unwrap_or_else(default_user_agent))
            .master_url(lookup("B2_MASTER_URL").unwrap_or_else(default_master_url))
            .maybe_test_mode(test_mode)
            .build()
    }

    /// `master_url`必须是http(s)的绝对url；反序列化得到的配置在使用前也会检查
    pub fn validate(&self) -> Result<(), Error> {
        let url = url::Url::parse(&self.master_url)
            .map_err(|e| Error::Common(format!("invalid master url {}: {e}", self.master_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Common(format!(
                "invalid master url {}: scheme must be http or https",
                self.master_url
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("account_id", &self.account_id)
            .field("application_key", &"***")
            .field("user_agent", &self.user_agent)
            .field("master_url", &self.master_url)
            .field("test_mode", &self.test_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
