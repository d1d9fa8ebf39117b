use std::{env, time::Duration};

use crate::error::ConfigurationError;

const DATABASE_URL: &str = "DATABASE_URL";
const LOCK_TIMEOUT: &str = "MIGRATION_LOCK_TIMEOUT_MS";
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Process configuration, read once at startup.
#[derive(Clone)]
pub struct Configuration {
    pub database_url: String,
    pub lock_timeout: Duration,
}

// The connection string carries credentials.
impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("database_url", &"<redacted>")
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

impl Configuration {
    /// Reads the process environment, after loading `.env` if one exists.
    /// Values passed in take precedence over the environment.
    pub fn load(
        database_url: Option<String>,
        lock_timeout: Option<Duration>,
    ) -> Result<Self, ConfigurationError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok(), database_url, lock_timeout)
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(
        lookup: F,
        database_url: Option<String>,
        lock_timeout: Option<Duration>,
    ) -> Result<Self, ConfigurationError> {
        let database_url = database_url
            .or_else(|| lookup(DATABASE_URL))
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigurationError::Missing(DATABASE_URL))?;

        let lock_timeout = match lock_timeout {
            Some(lock_timeout) => lock_timeout,
            None => match lookup(LOCK_TIMEOUT) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigurationError::Invalid {
                        name: LOCK_TIMEOUT,
                        value,
                    })?,
                None => DEFAULT_LOCK_TIMEOUT,
            },
        };

        Ok(Self {
            database_url,
            lock_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(
            Configuration::from_lookup(lookup(&[]), None, None),
            Err(ConfigurationError::Missing("DATABASE_URL"))
        ));
        assert!(matches!(
            Configuration::from_lookup(lookup(&[("DATABASE_URL", "  ")]), None, None),
            Err(ConfigurationError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn explicit_values_win() -> Result<(), ConfigurationError> {
        let configuration = Configuration::from_lookup(
            lookup(&[
                ("DATABASE_URL", "postgres://env/learning"),
                ("MIGRATION_LOCK_TIMEOUT_MS", "1500"),
            ]),
            Some(String::from("postgres://cli/learning")),
            None,
        )?;
        assert_eq!(configuration.database_url, "postgres://cli/learning");
        assert_eq!(configuration.lock_timeout, Duration::from_millis(1500));
        assert!(!format!("{:?}", configuration).contains("postgres://"));
        Ok(())
    }

    #[test]
    fn invalid_lock_timeout() {
        assert!(matches!(
            Configuration::from_lookup(
                lookup(&[("DATABASE_URL", "postgres://localhost/learning"), ("MIGRATION_LOCK_TIMEOUT_MS", "soon")]),
                None,
                None
            ),
            Err(ConfigurationError::Invalid { value, .. }) if value == "soon"
        ));
    }
}
