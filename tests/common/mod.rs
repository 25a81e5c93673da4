use std::sync::Arc;

use revocation_registry::{
    config::Config,
    registry::{Identity, MemoryStore, Registry},
    server::{AppState, Server, auth::TokenAuthenticator},
    telemetry,
};

pub const OWNER_TOKEN: &str = "owner-token";
pub const TRUSTED_CA_TOKEN: &str = "trusted-ca-token";
pub const UNTRUSTED_CA_TOKEN: &str = "untrusted-ca-token";

// Helper function to spawn a test server on a random port
pub async fn spawn_server() -> String {
    telemetry::init_tracing();

    let config = {
        let mut config = Config::load_with_sources(Some(Default::default())).unwrap();
        config.server.host = "localhost".to_string();
        // Use a random OS port
        config.server.port = 0;
        config
    };

    let owner = Identity::new("owner").unwrap();
    let registry = Registry::open(owner.clone(), Arc::new(MemoryStore::new()))
        .await
        .unwrap();

    let mut auth = TokenAuthenticator::default();
    auth.insert(owner, OWNER_TOKEN).unwrap();
    auth.insert(Identity::new("trusted-ca").unwrap(), TRUSTED_CA_TOKEN)
        .unwrap();
    auth.insert(Identity::new("untrusted-ca").unwrap(), UNTRUSTED_CA_TOKEN)
        .unwrap();

    let server = Server::new(AppState::new(registry, auth), &config.server)
        .await
        .unwrap();

    let port = server.port().unwrap();
    tokio::spawn(async move {
        server.run().await.expect("failed to run server");
    });

    format!("http://{}:{}", config.server.host, port)
}
