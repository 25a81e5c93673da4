use std::sync::Arc;

use color_eyre::eyre::{Context, Result};

use crate::config::Config;
use crate::registry::{Identity, MemoryStore, RedisStore, Registry, RegistryStore};
use crate::server::{AppState, auth::TokenAuthenticator};

/// Opens the registry on the configured backend and builds the API state.
pub async fn setup(config: &Config) -> Result<AppState> {
    let store: Arc<dyn RegistryStore> = if let Some(redis_config) = &config.redis {
        tracing::info!("Redis URI provided, using Redis for registry storage.");
        let redis_conn = redis_config
            .start()
            .await
            .wrap_err("Failed to start Redis")?;

        let store = match &redis_config.prefix {
            Some(prefix) => RedisStore::new(redis_conn).with_prefix(prefix),
            None => RedisStore::new(redis_conn),
        };
        Arc::new(store)
    } else {
        tracing::warn!("No Redis URI, registry state will not survive a restart.");
        Arc::new(MemoryStore::new())
    };

    let owner = Identity::new(&config.registry.owner).wrap_err("Invalid registry owner")?;
    let registry = Registry::open_with_capacity(owner, store, config.registry.event_capacity)
        .await
        .wrap_err("Failed to open registry")?;

    let auth = TokenAuthenticator::from_config(&config.auth).wrap_err("Invalid token table")?;
    if auth.is_empty() {
        tracing::warn!("No API tokens configured, the registry is read-only over HTTP.");
    }

    Ok(AppState::new(registry, auth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_setup_with_memory_store() {
        let mut env_vars = HashMap::new();
        env_vars.insert("registry.owner".to_string(), "admin".to_string());
        let config = Config::load_with_sources(Some(env_vars)).unwrap();

        let state = setup(&config).await.unwrap();
        assert_eq!(state.registry.owner().as_str(), "admin");
        assert!(state.auth.is_empty());
        assert_eq!(state.registry.revocation_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_setup_rejects_invalid_owner() {
        let mut env_vars = HashMap::new();
        env_vars.insert("registry.owner".to_string(), " ".to_string());
        let config = Config::load_with_sources(Some(env_vars)).unwrap();

        assert!(setup(&config).await.is_err());
    }
}
