//! HTTP client configuration

use std::time::Duration;

/// Settings for [`crate::HttpClient`] and its retry middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Retries after the first attempt
    pub retry_count: u32,
    /// First backoff delay; doubled on each retry
    pub retry_delay: Duration,
    /// Upper bound on a single backoff delay
    pub max_retry_delay: Duration,
    /// Proxy URL applied to every scheme
    pub proxy: Option<String>,
    pub user_agent: String,
    /// Redirects followed per request; 0 disables following
    pub max_redirects: usize,
    /// Idle time before a pooled connection is closed; `None` disables pooling
    pub pool_idle_timeout: Option<Duration>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry_count: 2,
            retry_delay: Duration::from_millis(250),
            max_retry_delay: Duration::from_secs(5),
            proxy: None,
            user_agent: format!("elementkit/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
            pool_idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Set the first backoff delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Cap every backoff delay at `delay`
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Keep idle connections for `idle_timeout`, or never with `None`
    pub fn with_pool_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self
    }
}
