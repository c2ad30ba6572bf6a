mod mock;
mod traits;

#[cfg(feature = "reqwest-client")]
mod reqwest_client;

pub use mock::*;
pub use traits::*;

#[cfg(feature = "reqwest-client")]
pub use reqwest_client::*;

use std::sync::Arc;

/// Create a default HTTP client based on enabled features
pub fn create_default_client() -> Result<Arc<dyn HttpClient>, String> {
    create_client_with_config(HttpConfig::default())
}

/// Create an HTTP client with custom configuration
pub fn create_client_with_config(config: HttpConfig) -> Result<Arc<dyn HttpClient>, String> {
    #[cfg(feature = "reqwest-client")]
    {
        ReqwestClient::with_config(config)
            .map(|client| Arc::new(client) as Arc<dyn HttpClient>)
            .map_err(|e| format!("Failed to create reqwest client: {}", e))
    }

    #[cfg(not(feature = "reqwest-client"))]
    {
        let _ = config;
        Err("No HTTP client feature enabled. Enable the 'reqwest-client' feature".to_string())
    }
}
