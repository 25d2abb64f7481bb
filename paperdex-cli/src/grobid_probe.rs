//! GROBID Probe - locate and health-check the extraction server
//!
//! The CLI never starts GROBID itself. It only decides which server to talk
//! to and waits for it to answer `isalive`.

use anyhow::{anyhow, Result};
use paperdex_core::config::GrobidConfig;
use paperdex_core::GrobidBackend;
use std::thread;
use std::time::{Duration, Instant};

/// Environment variable consulted when `--server` is not given
pub const GROBID_URL_ENV: &str = "GROBID_URL";

/// Pick the server URL: explicit argument, then `GROBID_URL`, then config.
pub fn resolve_server_url(arg: Option<&str>, config: &GrobidConfig) -> String {
    pick_server_url(arg, std::env::var(GROBID_URL_ENV).ok(), config)
}

fn pick_server_url(arg: Option<&str>, env: Option<String>, config: &GrobidConfig) -> String {
    let non_empty = |s: &str| {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    };
    arg.and_then(non_empty)
        .or_else(|| env.as_deref().and_then(non_empty))
        .unwrap_or_else(|| config.server_url.clone())
}

/// Health checks against one GROBID server
pub struct GrobidProbe {
    backend: GrobidBackend,
}

impl GrobidProbe {
    pub fn new(config: &GrobidConfig) -> Result<Self> {
        Ok(Self {
            backend: GrobidBackend::new(config)?,
        })
    }

    pub fn server_url(&self) -> &str {
        self.backend.server_url()
    }

    pub fn is_alive(&self) -> bool {
        self.backend.check_alive().is_ok()
    }

    pub fn version(&self) -> Result<String> {
        Ok(self.backend.version()?)
    }

    /// Poll `isalive` until it answers or `timeout` elapses.
    pub fn wait_until_alive(&self, timeout: Duration, poll: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            match self.backend.check_alive() {
                Ok(()) => return Ok(()),
                Err(e) if started.elapsed() >= timeout => {
                    return Err(anyhow!(
                        "GROBID at {} not available after {}s: {}",
                        self.server_url(),
                        timeout.as_secs(),
                        e
                    ));
                }
                Err(_) => thread::sleep(poll),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url_precedence() {
        let config = GrobidConfig::default();
        assert_eq!(
            pick_server_url(Some("http://arg:1"), Some("http://env:2".into()), &config),
            "http://arg:1"
        );
        assert_eq!(
            pick_server_url(None, Some("http://env:2".into()), &config),
            "http://env:2"
        );
        assert_eq!(pick_server_url(None, None, &config), "http://localhost:8070");
    }

    #[test]
    fn test_blank_values_fall_through() {
        let config = GrobidConfig::default();
        assert_eq!(
            pick_server_url(Some("  "), Some(String::new()), &config),
            "http://localhost:8070"
        );
    }

    #[test]
    fn test_wait_gives_up_on_dead_server() {
        let config = GrobidConfig {
            server_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let probe = GrobidProbe::new(&config).unwrap();
        assert!(!probe.is_alive());
        let err = probe
            .wait_until_alive(Duration::ZERO, Duration::from_millis(10))
            .unwrap_err();
        assert!(err.to_string().contains("127.0.0.1:9"));
    }
}
