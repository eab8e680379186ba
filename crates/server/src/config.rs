use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Server configuration. Every field has a default; a TOML file overrides the
/// defaults and environment variables override the file (for paths that
/// differ per deployment).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    /// Directory of exported `.eml` files standing in for the mailbox.
    pub mail_dir: PathBuf,
    pub review_log: PathBuf,
    /// Rows per persistence batch; also the cancellation granularity.
    pub batch_size: usize,
    /// How far back a fetch looks, in days.
    pub lookback_days: u64,
    pub bind: String,
    /// Keyword pre-filter handed to the mail source.
    pub keywords: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("paisa.db"),
            mail_dir: PathBuf::from("intake"),
            review_log: PathBuf::from("review.log"),
            batch_size: 50,
            lookback_days: 3,
            bind: "127.0.0.1:5000".to_string(),
            keywords: [
                "transaction",
                "credited",
                "debited",
                "account",
                "balance",
                "payment",
                "received",
                "spent",
                "withdrawn",
                "ICICI",
                "SBI",
                "HDFC",
                "Axis",
                "KOTAK",
                "RBL",
                "UPI",
                "NEFT",
                "IMPS",
            ]
            .map(str::to_string)
            .to_vec(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config file {}", p.display()))?
            }
            None => Self::default(),
        };

        if let Ok(v) = std::env::var("PAISA_DATABASE_PATH") {
            config.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PAISA_MAIL_DIR") {
            config.mail_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PAISA_BIND") {
            config.bind = v;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.batch_size, 50);
        assert_eq!(c.lookback_days, 3);
        assert!(c.keywords.iter().any(|k| k == "debited"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("paisa.toml");
        std::fs::write(&path, "batch_size = 10\nbind = \"0.0.0.0:8080\"\n").unwrap();
        let c = Config::load(Some(&path)).unwrap();
        assert_eq!(c.batch_size, 10);
        assert_eq!(c.bind, "0.0.0.0:8080");
        assert_eq!(c.lookback_days, 3);
        assert_eq!(c.database_path, PathBuf::from("paisa.db"));
    }

    #[test]
    fn bad_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("paisa.toml");
        std::fs::write(&path, "batch_size = \"many\"").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
