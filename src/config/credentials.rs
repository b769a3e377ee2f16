//! Credential resolution
//!
//! Secrets never live in the TOML file. A source names the environment
//! variable holding its token and the value is read once, before any
//! network call, so a missing key aborts the run up front.

use crate::config::types::Config;
use crate::ConfigError;
use std::collections::HashMap;

/// Resolved per-source bearer tokens, keyed by source name
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    tokens: HashMap<String, String>,
}

impl Credentials {
    /// Returns the token configured for a source, if it declared one
    pub fn token(&self, source: &str) -> Option<&str> {
        self.tokens.get(source).map(String::as_str)
    }

    pub fn insert(&mut self, source: impl Into<String>, token: impl Into<String>) {
        self.tokens.insert(source.into(), token.into());
    }
}

/// Reads every declared credential for the selected sources
///
/// `lookup` is the variable reader (normally `std::env::var`), injectable
/// so tests don't have to mutate the process environment.
pub fn resolve_credentials<F>(
    config: &Config,
    selected: &[String],
    lookup: F,
) -> Result<Credentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut credentials = Credentials::default();

    for source in &config.sources {
        if !selected.is_empty() && !selected.contains(&source.name) {
            continue;
        }

        let Some(variable) = source.api_key_env.as_deref() else {
            continue;
        };

        match lookup(variable).filter(|v| !v.trim().is_empty()) {
            Some(token) => credentials.insert(source.name.clone(), token),
            None => {
                return Err(ConfigError::MissingCredential {
                    source_name: source.name.clone(),
                    variable: variable.to_string(),
                })
            }
        }
    }

    Ok(credentials)
}
