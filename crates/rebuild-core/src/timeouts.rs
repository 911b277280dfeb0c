use std::time::Duration;

/// Upper bounds for every external command the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// `reg export` / `reg import`.
    pub registry: Duration,
    /// Tool CLIs listing their extensions.
    pub cli: Duration,
    /// Quick `--version` style availability checks.
    pub cli_check: Duration,
    pub extension_install: Duration,
    /// Package manager queries such as `winget list`.
    pub package_query: Duration,
    pub install: Duration,
    /// A whole installer download, from request to last byte.
    pub download: Duration,
    pub detect: Duration,
    pub env_write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            registry: Duration::from_secs(30),
            cli: Duration::from_secs(30),
            cli_check: Duration::from_secs(10),
            extension_install: Duration::from_secs(60),
            package_query: Duration::from_secs(30),
            install: Duration::from_secs(600),
            download: Duration::from_secs(900),
            detect: Duration::from_secs(60),
            env_write: Duration::from_secs(10),
        }
    }
}
