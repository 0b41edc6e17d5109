//! Wiring: config + override table + environment secrets → [`Reconciler`].

use std::path::Path;
use std::sync::Arc;

use pickup_core::{config, overrides, Config, OverrideTable};
use pickup_remote::{SourceClient, TargetClient, TokenStore};
use pickup_sync::{EngineSettings, IdentifierResolver, Reconciler};

use crate::error::DaemonError;

/// Admin API token for the commerce platform.
pub const TARGET_TOKEN_ENV: &str = "SHOPIFY_ACCESS_TOKEN";

/// A ready-to-run engine plus the handles the daemon needs beside it.
pub struct Engine {
    pub config: Config,
    /// Shared with the reconciler; written by `authorize`.
    pub credentials: Arc<TokenStore>,
    pub reconciler: Arc<Reconciler>,
}

/// Build the engine from `<home>/.pickup/` and the process environment.
pub fn build_engine(home: &Path) -> Result<Engine, DaemonError> {
    let config = config::load_at(home)?;
    let overrides = overrides::load_at(home)?;
    let target_token = std::env::var(TARGET_TOKEN_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(DaemonError::MissingSecret(TARGET_TOKEN_ENV))?;
    Ok(build_engine_with(
        config,
        overrides,
        Arc::new(TokenStore::from_env()),
        target_token.trim(),
    ))
}

pub fn build_engine_with(
    config: Config,
    overrides: OverrideTable,
    credentials: Arc<TokenStore>,
    target_token: &str,
) -> Engine {
    let timeout = config.reconcile.request_timeout();
    let source = SourceClient::new(config.source.clone(), timeout);
    let target = TargetClient::new(config.target.clone(), target_token, timeout);
    let resolver = IdentifierResolver::new(config.source.cross_reference_field, overrides);
    tracing::debug!(
        cross_reference_field = config.source.cross_reference_field.wire_name(),
        overrides = resolver.overrides().len(),
        "engine wired",
    );

    let reconciler = Reconciler::new(
        credentials.clone(),
        Arc::new(source),
        Arc::new(target),
        resolver,
        EngineSettings::from_config(&config),
    );
    Engine {
        config,
        credentials,
        reconciler: Arc::new(reconciler),
    }
}
