use anyhow::{bail, Context};

pub const DEFAULT_BULK_WORKERS: usize = 8;

/// Runtime settings read from the environment (a `.env` file is honoured by
/// the binary before this is called).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub database_url: String,
    /// Concurrent per-area workers in a bulk run.
    pub bulk_workers: usize,
    /// Pool size. At least one connection per worker plus one for area
    /// discovery; smaller pools are rejected.
    pub max_connections: u32,
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .context("DATABASE_URL must be set to the Postgres instance holding weather and case data")?;

        let bulk_workers = match lookup("DENGUE_BULK_WORKERS") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("DENGUE_BULK_WORKERS is not a number: {raw:?}"))?,
            None => DEFAULT_BULK_WORKERS,
        };

        let max_connections = match lookup("DENGUE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DENGUE_MAX_CONNECTIONS is not a number: {raw:?}"))?,
            None => default_connections(bulk_workers),
        };

        let config = Self {
            database_url,
            bulk_workers,
            max_connections,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_bulk_workers(mut self, workers: usize) -> anyhow::Result<Self> {
        self.bulk_workers = workers;
        self.max_connections = self.max_connections.max(default_connections(workers));
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.bulk_workers == 0 {
            bail!("bulk worker count must be at least 1");
        }
        let required = default_connections(self.bulk_workers);
        if self.max_connections < required {
            bail!(
                "DENGUE_MAX_CONNECTIONS is {} but {} bulk workers need at least {required} connections",
                self.max_connections,
                self.bulk_workers
            );
        }
        Ok(())
    }
}

fn default_connections(workers: usize) -> u32 {
    u32::try_from(workers).unwrap_or(u32::MAX).saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_only_url_is_set() {
        let config = EngineConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/dengue")])).unwrap();
        assert_eq!(config.bulk_workers, DEFAULT_BULK_WORKERS);
        assert_eq!(config.max_connections, 9);
    }

    #[test]
    fn database_url_is_required() {
        assert!(EngineConfig::from_lookup(lookup(&[])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dengue"),
            ("DENGUE_BULK_WORKERS", "3"),
            ("DENGUE_MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();
        assert_eq!(config.bulk_workers, 3);
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn rejects_zero_workers() {
        let result = EngineConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dengue"),
            ("DENGUE_BULK_WORKERS", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn pool_smaller_than_worker_count_is_rejected() {
        let result = EngineConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dengue"),
            ("DENGUE_BULK_WORKERS", "16"),
            ("DENGUE_MAX_CONNECTIONS", "2"),
        ]));
        assert!(result.is_err());

        let exact = EngineConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/dengue"),
            ("DENGUE_BULK_WORKERS", "4"),
            ("DENGUE_MAX_CONNECTIONS", "5"),
        ]))
        .unwrap();
        assert_eq!(exact.max_connections, 5);
    }

    #[test]
    fn worker_override_grows_pool() {
        let config = EngineConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/dengue")]))
            .unwrap()
            .with_bulk_workers(16)
            .unwrap();
        assert_eq!(config.max_connections, 17);
    }
}
