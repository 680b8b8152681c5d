//! Property-based tests for cache key derivation.
//!
//! Keys must be stable for a logical resource regardless of policy or query
//! string, and an explicit key always wins.

use elementkit_images::{resolve, CachePolicy, ImageRequest};
use proptest::prelude::*;

fn file_name_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,16}\\.(png|jpg|gif|webp)"
}

fn host_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,10}\\.(com|org|net)"
}

proptest! {
    #[test]
    fn prop_remote_key_is_last_path_component(
        host in host_strategy(),
        dirs in prop::collection::vec("[a-z0-9]{1,8}", 0..4),
        name in file_name_strategy(),
        query in prop::option::of("[a-z]{1,6}=[0-9]{1,4}"),
    ) {
        let mut locator = format!("https://{}/", host);
        for dir in &dirs {
            locator.push_str(dir);
            locator.push('/');
        }
        locator.push_str(&name);
        if let Some(query) = &query {
            locator.push('?');
            locator.push_str(query);
        }

        let (source, key) = resolve(&locator, None).unwrap();
        prop_assert!(!source.is_local());
        prop_assert_eq!(key.as_str(), name.as_str());
    }

    #[test]
    fn prop_custom_key_wins(
        host in host_strategy(),
        name in file_name_strategy(),
        custom in "[A-Za-z0-9_-]{1,24}",
    ) {
        let locator = format!("https://{}/{}", host, name);
        let (_, key) = resolve(&locator, Some(&custom)).unwrap();
        prop_assert_eq!(key.as_str(), custom.as_str());
    }

    #[test]
    fn prop_key_independent_of_policy(
        host in host_strategy(),
        name in file_name_strategy(),
    ) {
        let locator = format!("https://{}/{}", host, name);
        let cached = ImageRequest::new(locator.clone()).with_policy(CachePolicy::Cached);
        let reload = ImageRequest::new(locator).with_policy(CachePolicy::Reload);

        let (_, cached_key) = resolve(&cached.locator, cached.custom_key.as_deref()).unwrap();
        let (_, reload_key) = resolve(&reload.locator, reload.custom_key.as_deref()).unwrap();
        prop_assert_eq!(cached_key, reload_key);
    }

    #[test]
    fn prop_directory_locators_hash_deterministically(host in host_strategy()) {
        let locator = format!("https://{}/", host);
        let (_, first) = resolve(&locator, None).unwrap();
        let (_, second) = resolve(&locator, None).unwrap();

        prop_assert_eq!(first.as_str().len(), 64);
        prop_assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_local_paths_force_reload(
        dirs in prop::collection::vec("[a-z0-9]{1,8}", 1..4),
        name in file_name_strategy(),
    ) {
        let locator = format!("/{}/{}", dirs.join("/"), name);
        let (source, key) = resolve(&locator, None).unwrap();

        prop_assert!(source.is_local());
        prop_assert_eq!(source.effective_policy(CachePolicy::Cached), CachePolicy::Reload);
        prop_assert_eq!(key.as_str(), name.as_str());
    }
}
