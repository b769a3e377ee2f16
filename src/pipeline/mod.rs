//! Ingestion pipeline
//!
//! This module ties adapters, extraction and the store together:
//! - `classify`: batch existence check of a page of candidates
//! - `reconcile`: merge rules for one page
//! - `run_source`: the per-source page loop and its stop conditions
//! - `run_sources`: concurrent runs of several sources, one store connection each

mod classifier;
mod driver;
mod reconciler;
mod report;

pub use classifier::classify;
pub use driver::run_source;
pub use reconciler::{reconcile, Outcome, ReconcileCounts};
pub use report::RunReport;

use crate::config::{Config, Credentials, SourceConfig};
use crate::source::build_adapter;
use crate::storage::{SqliteStore, Store};
use crate::{ConfigError, LedgerError};
use std::path::PathBuf;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Resolves `--source` names against the configuration
///
/// An empty selection means every configured source, in file order.
pub fn selected_sources(config: &Config, selected: &[String]) -> Result<Vec<SourceConfig>, ConfigError> {
    if selected.is_empty() {
        return Ok(config.sources.clone());
    }

    selected
        .iter()
        .map(|name| {
            config
                .source(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownSource(name.clone()))
        })
        .collect()
}

/// Runs every selected source concurrently and persists each run report
///
/// All adapters are built before any task starts, so a configuration
/// problem aborts the whole invocation before the first network call.
/// Once running, a failing source never affects the others.
///
/// # Returns
///
/// Reports in the order the sources were selected. A source whose store
/// could not be opened, or whose task panicked, has no report.
pub async fn run_sources(
    config: &Config,
    credentials: &Credentials,
    selected: &[String],
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<Vec<RunReport>, LedgerError> {
    let sources = selected_sources(config, selected)?;

    let mut adapters = Vec::with_capacity(sources.len());
    for source in sources {
        adapters.push(build_adapter(source, &config.client, credentials)?);
    }

    let database_path = PathBuf::from(&config.store.database_path);
    let mut tasks = JoinSet::new();

    for (index, mut adapter) in adapters.into_iter().enumerate() {
        let path = database_path.clone();
        let cancel = cancel.clone();
        let config_hash = config_hash.to_string();

        tasks.spawn(async move {
            let mut store = match SqliteStore::new(&path) {
                Ok(store) => store,
                Err(e) => {
                    error!("{}: cannot open store {}: {}", adapter.name(), path.display(), e);
                    return (index, None);
                }
            };

            let report = run_source(adapter.as_mut(), &mut store, &cancel).await;
            if let Err(e) = store.record_run(&report.to_record(&config_hash)) {
                warn!("{}: failed to record run: {}", report.source, e);
            }
            (index, Some(report))
        });
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Some(report))) => reports.push((index, report)),
            Ok((_, None)) => {}
            Err(e) => error!("Source task failed: {}", e),
        }
    }

    reports.sort_by_key(|(index, _)| *index);
    Ok(reports.into_iter().map(|(_, report)| report).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
[store]
database-path = "./wipes.db"

[[source]]
name = "recent"
kind = "just-wiped"
base-url = "https://just-wiped.net/rust_servers"

[[source]]
name = "upcoming"
kind = "just-wiped"
base-url = "https://just-wiped.net/rust_servers?min_rating=40"
"#;

    #[test]
    fn test_empty_selection_is_all_sources() {
        let config = parse_config(CONFIG).unwrap();
        let sources = selected_sources(&config, &[]).unwrap();
        let names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["recent", "upcoming"]);
    }

    #[test]
    fn test_selection_keeps_order() {
        let config = parse_config(CONFIG).unwrap();
        let sources =
            selected_sources(&config, &["upcoming".to_string(), "recent".to_string()]).unwrap();
        assert_eq!(sources[0].name, "upcoming");
    }

    #[test]
    fn test_unknown_source() {
        let config = parse_config(CONFIG).unwrap();
        assert!(matches!(
            selected_sources(&config, &["nope".to_string()]),
            Err(ConfigError::UnknownSource(name)) if name == "nope"
        ));
    }
}
