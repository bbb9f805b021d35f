use log::{info, warn};
use std::{env, path::PathBuf, str::FromStr};
use thiserror::Error;

const SESSION_KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("REELMARK_SESSION_KEY must be at least {} bytes", SESSION_KEY_LEN)]
    ShortSessionKey,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    /// `None` runs on a throwaway database.
    pub database: Option<PathBuf>,
    pub session_key: Vec<u8>,
    pub secure_cookie: bool,
    pub bcrypt_cost: u32,
    pub seed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1:8080".to_owned(),
            database: None,
            session_key: vec![0; SESSION_KEY_LEN],
            secure_cookie: false,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            seed: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let session_key = match lookup("REELMARK_SESSION_KEY") {
            Some(key) if key.len() >= SESSION_KEY_LEN => key.into_bytes(),
            Some(_) => return Err(ConfigError::ShortSessionKey),
            None => {
                warn!("REELMARK_SESSION_KEY not set, sessions use an all-zero key");
                defaults.session_key
            }
        };
        Ok(Config {
            bind: lookup("REELMARK_BIND").unwrap_or(defaults.bind),
            database: lookup("REELMARK_DB").map(PathBuf::from),
            session_key,
            secure_cookie: parse(&lookup, "REELMARK_SECURE_COOKIE", defaults.secure_cookie)?,
            bcrypt_cost: parse(&lookup, "REELMARK_BCRYPT_COST", defaults.bcrypt_cost)?,
            seed: parse(&lookup, "REELMARK_SEED", defaults.seed)?,
        })
    }

    pub fn open_database(&self) -> sled::Result<sled::Db> {
        match &self.database {
            Some(path) => {
                info!("Opening database at {}", path.display());
                sled::open(path)
            }
            None => {
                info!("REELMARK_DB not set, using a temporary database");
                sled::Config::new().temporary(true).open()
            }
        }
    }
}

fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => {
            info!("{} not set, using default: {:?}", key, default);
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert!(config.database.is_none());
        assert_eq!(config.session_key.len(), 32);
        assert!(!config.secure_cookie);
        assert!(config.seed);
    }

    #[test]
    fn overrides() {
        let key = "k".repeat(40);
        let config = load(&[
            ("REELMARK_BIND", "0.0.0.0:9000"),
            ("REELMARK_DB", "/var/lib/reelmark"),
            ("REELMARK_SESSION_KEY", &key),
            ("REELMARK_SECURE_COOKIE", "true"),
            ("REELMARK_BCRYPT_COST", "6"),
            ("REELMARK_SEED", "false"),
        ])
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.database, Some(PathBuf::from("/var/lib/reelmark")));
        assert_eq!(config.session_key, key.into_bytes());
        assert!(config.secure_cookie);
        assert_eq!(config.bcrypt_cost, 6);
        assert!(!config.seed);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            load(&[("REELMARK_SESSION_KEY", "short")]),
            Err(ConfigError::ShortSessionKey)
        ));
        assert!(matches!(
            load(&[("REELMARK_BCRYPT_COST", "lots")]),
            Err(ConfigError::Invalid { key: "REELMARK_BCRYPT_COST", .. })
        ));
    }
}
