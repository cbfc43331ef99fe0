//! Archive download through the relay, with the direct URL as fallback

use sdk::errors::PluginError;
use tracing::{info, warn};

use crate::registry::{proxy_url, RegistryClient};

const PROXY_SEGMENT: &str = "/proxy/";

/// Download a plugin archive into memory
///
/// `url` may be a direct archive URL or an already-proxied
/// `/proxy/<encoded>` path as produced by discovery. The relay is tried
/// first whenever it resolves to an absolute URL; if it errors or answers
/// with a non-success status the direct URL is fetched instead.
///
/// # Errors
///
/// Returns [`PluginError::Network`] with `HTTP <status>` when the final
/// attempt is not successful, or the transport error message.
pub async fn download_archive(client: &RegistryClient, url: &str) -> Result<Vec<u8>, PluginError> {
    let direct = direct_target(url);

    if let Some(relay) = relay_target(&client.settings().relay_base, url, &direct) {
        match fetch(client.http(), &relay).await {
            Ok(bytes) => {
                info!("Downloaded {} bytes through relay", bytes.len());
                return Ok(bytes);
            }
            Err(e) => warn!("Relay download failed, falling back to direct URL: {}", e),
        }
    }

    let bytes = fetch(client.http(), &direct).await?;
    info!("Downloaded {} bytes from {}", bytes.len(), direct);
    Ok(bytes)
}

async fn fetch(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, PluginError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| PluginError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(PluginError::Network(format!("HTTP {}", status.as_u16())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PluginError::Network(e.to_string()))?;

    Ok(bytes.to_vec())
}

/// The archive URL with any relay wrapping removed
pub fn direct_target(url: &str) -> String {
    unwrap_relay(url).unwrap_or_else(|| url.to_string())
}

/// Target of a relay URL
///
/// A URL is relay-wrapped only when its path starts with `/proxy/` and the
/// rest decodes to an absolute http(s) URL. Anything else is not.
fn unwrap_relay(url: &str) -> Option<String> {
    let encoded = match url.strip_prefix(PROXY_SEGMENT) {
        Some(rest) => rest.to_string(),
        None => url::Url::parse(url)
            .ok()?
            .path()
            .strip_prefix(PROXY_SEGMENT)?
            .to_string(),
    };

    // Encoded targets contain no raw `&` or `=`, so the first key is the whole value
    let target = url::form_urlencoded::parse(encoded.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()?;

    is_absolute(&target).then_some(target)
}

fn relay_target(relay_base: &str, url: &str, direct: &str) -> Option<String> {
    let relay = if unwrap_relay(url).is_some() {
        if url.starts_with('/') {
            format!("{}{}", relay_base.trim_end_matches('/'), url)
        } else {
            url.to_string()
        }
    } else {
        proxy_url(relay_base, direct)
    };

    is_absolute(&relay).then_some(relay)
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_target_unwraps_proxy_path() {
        let proxied = proxy_url("", "https://github.com/a/b/archive/refs/heads/main.zip");
        assert_eq!(
            direct_target(&proxied),
            "https://github.com/a/b/archive/refs/heads/main.zip"
        );
    }

    #[test]
    fn test_direct_target_passes_plain_url() {
        assert_eq!(direct_target("https://x.test/a.zip"), "https://x.test/a.zip");
    }

    #[test]
    fn test_direct_target_unwraps_absolute_relay_url() {
        let proxied = proxy_url("https://relay.test", "https://x.test/a.zip");
        assert_eq!(direct_target(&proxied), "https://x.test/a.zip");
    }

    #[test]
    fn test_repository_named_proxy_is_not_a_relay_url() {
        let url = "https://github.com/proxy/tools/archive/refs/heads/main.zip";
        assert_eq!(direct_target(url), url);
        assert_eq!(
            relay_target("https://relay.test", url, url),
            Some(proxy_url("https://relay.test", url))
        );

        let nested = "https://github.com/acme/proxy/archive/refs/heads/main.zip";
        assert_eq!(direct_target(nested), nested);
    }

    #[test]
    fn test_relative_relay_without_base_is_skipped() {
        let proxied = proxy_url("", "https://x.test/a.zip");
        assert_eq!(relay_target("", &proxied, "https://x.test/a.zip"), None);
    }

    #[test]
    fn test_relative_relay_with_base_is_prefixed() {
        let proxied = proxy_url("", "https://x.test/a.zip");
        let relay = relay_target("https://relay.test/", &proxied, "https://x.test/a.zip");
        assert_eq!(
            relay.as_deref(),
            Some("https://relay.test/proxy/https%3A%2F%2Fx.test%2Fa.zip")
        );
    }
}
