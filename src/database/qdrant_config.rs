use qdrant_client::{config::QdrantConfig, Qdrant};
use std::time::Duration;

use super::store::VectorStoreError;
use crate::config::StoreSettings;

/// Normalises a Qdrant URL to the gRPC endpoint the client speaks.
///
/// Accepts URLs with or without a scheme and swaps the REST port 6333 for 6334.
pub fn grpc_url(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", url),
    };
    let rest = rest.trim_end_matches('/');

    let rest = match rest.strip_suffix(":6333") {
        Some(host) => format!("{}:6334", host),
        None => rest.to_string(),
    };

    format!("{}://{}", scheme, rest)
}

pub async fn create_qdrant_client(settings: &StoreSettings) -> Result<Qdrant, VectorStoreError> {
    let url = grpc_url(&settings.qdrant_url);
    log::info!("Attempting to connect to Qdrant with URL: {}", url);

    let mut config = QdrantConfig::from_url(&url);
    config.check_compatibility = false;
    config.timeout = Duration::from_secs(30);
    config.connect_timeout = Duration::from_secs(10);
    config.api_key = settings.qdrant_api_key.clone();

    let client = Qdrant::new(config).map_err(|e| VectorStoreError::Connection(e.to_string()))?;

    match client.health_check().await {
        Ok(_) => {
            log::info!("Successfully connected to Qdrant");
            Ok(client)
        }
        Err(e) => {
            log::error!("Connection test failed: {}", e);
            Err(VectorStoreError::Connection(format!(
                "Failed to connect to Qdrant at {}: {}",
                url, e
            )))
        }
    }
}
