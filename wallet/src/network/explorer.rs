use reqwest::Url;

use super::NetworkProfile;
use crate::errors::{WalletError, WalletResult};

pub const DEFAULT_EXPLORER_HOST: &str = "explorer.solana.com";

/// Link to a transaction on the block explorer for the given network.
///
/// Built-in clusters use `?cluster=<id>`; custom endpoints are passed as
/// `cluster=custom&customUrl=<endpoint>` so the explorer queries the same node.
pub fn explorer_url(host: &str, signature: &str, profile: &NetworkProfile) -> WalletResult<String> {
    let host = host.trim().trim_end_matches('/');
    let host = if host.is_empty() { DEFAULT_EXPLORER_HOST } else { host };
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };

    let mut url = Url::parse(&format!("{}/tx/{}", base, signature))
        .map_err(|e| WalletError::ValidationError(format!("Invalid explorer URL: {}", e)))?;
    {
        let mut query = url.query_pairs_mut();
        if profile.is_custom {
            query.append_pair("cluster", "custom");
            query.append_pair("customUrl", &profile.endpoint);
        } else {
            query.append_pair("cluster", &profile.id);
        }
    }
    Ok(url.to_string())
}
