//! Background update check against GitHub releases.
//!
//! Best-effort: a 2 s HTTP timeout and any failure is silently ignored.
//! Results are cached on disk for a day so most invocations never touch
//! the network.

use corral_state::Store;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RELEASES_URL: &str = "https://api.github.com/repos/corral-dev/corral/releases/latest";
const HTTP_TIMEOUT: Duration = Duration::from_secs(2);
const CHECK_INTERVAL_SECS: u64 = 24 * 3600;

#[derive(Debug, Serialize, Deserialize)]
struct UpdateCache {
    last_check: u64,
    latest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns a newer released version than the running one, if known.
/// Never blocks for more than the HTTP timeout; never errors.
pub fn newer_release(store: &Store) -> Option<String> {
    let cache_path = store.home().join("update-check.json");

    let cached: Option<UpdateCache> = fs::read_to_string(&cache_path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok());
    let latest = match &cached {
        Some(cache) if now_secs().saturating_sub(cache.last_check) < CHECK_INTERVAL_SECS => {
            cache.latest.clone()
        }
        _ => {
            let latest = fetch_latest();
            let cache = UpdateCache {
                last_check: now_secs(),
                latest: latest.clone(),
            };
            if let Ok(text) = serde_json::to_string(&cache) {
                let _ = fs::write(&cache_path, text);
            }
            latest
        }
    };

    let latest = latest?;
    let current = semver::Version::parse(env!("CARGO_PKG_VERSION")).ok()?;
    let released = semver::Version::parse(latest.trim_start_matches('v')).ok()?;
    (released > current).then(|| released.to_string())
}

fn fetch_latest() -> Option<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent("corral")
        .build()
        .ok()?;
    let release: Release = client.get(RELEASES_URL).send().ok()?.json().ok()?;
    Some(release.tag_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_cache_short_circuits_the_network() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path());
        let cache = UpdateCache {
            last_check: now_secs(),
            latest: Some("v99.0.0".into()),
        };
        fs::write(
            store.home().join("update-check.json"),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();

        assert_eq!(newer_release(&store).as_deref(), Some("99.0.0"));
    }

    #[test]
    fn cached_older_version_is_not_an_update() {
        let tmp = tempdir().unwrap();
        let store = Store::at(tmp.path());
        let cache = UpdateCache {
            last_check: now_secs(),
            latest: Some("v0.0.1".into()),
        };
        fs::write(
            store.home().join("update-check.json"),
            serde_json::to_string(&cache).unwrap(),
        )
        .unwrap();

        assert_eq!(newer_release(&store), None);
    }
}
