use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::engine::bucket::RuleSet;

const DEFAULT_SWEEP_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub application_id: u64,
    pub token: String,
    pub database_url: String,
    pub rule_set: RuleSet,
    pub sweep_every: Duration,
}

impl Config {
    /// Reads `LOOTPOLL_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
        where F: Fn(&str) -> Option<String>
    {
        let required = |key: &str| get(key).ok_or_else(|| anyhow!("expected {}", key));

        let application_id = required("LOOTPOLL_APPL")?
            .parse::<u64>()
            .context("LOOTPOLL_APPL is not a valid application ID")?;

        let rule_set = match get("LOOTPOLL_RULESET") {
            None => RuleSet::Standard,
            Some(v) => v.parse::<RuleSet>().context("LOOTPOLL_RULESET is invalid")?,
        };

        let sweep_secs = match get("LOOTPOLL_SWEEP_SECS") {
            None => DEFAULT_SWEEP_SECS,
            Some(v) => v.parse::<u64>().context("LOOTPOLL_SWEEP_SECS is not a number")?,
        };
        if sweep_secs == 0 {
            return Err(anyhow!("LOOTPOLL_SWEEP_SECS must be positive"));
        }

        Ok(Self {
            application_id,
            token: required("LOOTPOLL_TOKEN")?,
            database_url: required("LOOTPOLL_DATABASE_URL")?,
            rule_set,
            sweep_every: Duration::from_secs(sweep_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |k| map.get(k).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("LOOTPOLL_APPL", "881234567890"),
        ("LOOTPOLL_TOKEN", "token"),
        ("LOOTPOLL_DATABASE_URL", "postgres://localhost/lootpoll"),
    ];

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();

        assert_eq!(config.application_id, 881234567890);
        assert_eq!(config.rule_set, RuleSet::Standard);
        assert_eq!(config.sweep_every, Duration::from_secs(60));
    }

    #[test]
    fn overrides() {
        let mut pairs = BASE.to_vec();
        pairs.push(("LOOTPOLL_RULESET", "legacy"));
        pairs.push(("LOOTPOLL_SWEEP_SECS", "5"));

        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.rule_set, RuleSet::Legacy);
        assert_eq!(config.sweep_every, Duration::from_secs(5));
    }

    #[test]
    fn missing_token() {
        let err = Config::from_lookup(lookup(&BASE[..1])).unwrap_err();

        assert!(err.to_string().contains("LOOTPOLL_TOKEN"));
    }

    #[test]
    fn invalid_values() {
        let mut pairs = BASE.to_vec();
        pairs[0] = ("LOOTPOLL_APPL", "not-a-number");
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("LOOTPOLL_SWEEP_SECS", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("LOOTPOLL_RULESET", "strict"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
