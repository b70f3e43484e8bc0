//! Property-based tests for the pure parts of sitestack.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use sitestack::core::config::{ConfigError, ConfigurationRegistry};
use sitestack::edge::rewrite_uri;
use sitestack::invalidation::select_paths;
use sitestack::topology;

/// Strategy for URI path characters, with `/` and `.` weighted up.
fn uri_char() -> impl Strategy<Value = char> {
    prop_oneof![
        4 => prop::char::range('a', 'z'),
        1 => prop::char::range('0', '9'),
        2 => Just('/'),
        1 => Just('.'),
        1 => Just('-'),
        1 => Just('_'),
    ]
}

fn uri() -> impl Strategy<Value = String> {
    prop::collection::vec(uri_char(), 0..40).prop_map(|chars| {
        let mut uri = String::from("/");
        uri.extend(chars);
        uri
    })
}

proptest! {
    #[test]
    fn rewrite_only_appends(uri in uri()) {
        let rewritten = rewrite_uri(&uri);
        prop_assert!(rewritten.starts_with(uri.as_str()));
    }

    #[test]
    fn rewrite_result_names_a_file(uri in uri()) {
        let rewritten = rewrite_uri(&uri);
        prop_assert!(!rewritten.ends_with('/'));
        prop_assert!(rewritten.contains('.'));
    }

    #[test]
    fn rewrite_is_idempotent(uri in uri()) {
        let once = rewrite_uri(&uri).into_owned();
        let twice = rewrite_uri(&once).into_owned();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn dotted_uris_without_trailing_slash_pass_through(uri in uri()) {
        prop_assume!(uri.contains('.') && !uri.ends_with('/'));
        let rewritten = rewrite_uri(&uri);
        prop_assert_eq!(rewritten.as_ref(), uri.as_str());
    }

    #[test]
    fn only_production_narrows_invalidation(env in "[a-zA-Z]{0,12}") {
        let paths = select_paths(Some(&env));
        if env == "production" {
            prop_assert_eq!(paths, &["/index.html", "/version.json"][..]);
        } else {
            prop_assert_eq!(paths, &["/*"][..]);
        }
    }

    #[test]
    fn unknown_branches_never_resolve(branch in "[a-z0-9/_-]{0,24}") {
        let registry = ConfigurationRegistry::builtin();
        prop_assume!(!registry.branch_names().any(|known| known == branch));
        let is_not_found = matches!(
            registry.resolve(&branch),
            Err(ConfigError::ConfigurationNotFound { .. })
        );
        prop_assert!(is_not_found);
    }
}

#[test]
fn builds_are_deterministic() {
    let registry = ConfigurationRegistry::builtin();
    for config in registry.configurations() {
        let first = topology::build(config).unwrap();
        let second = topology::build(config).unwrap();
        assert_eq!(first.digest().unwrap(), second.digest().unwrap(), "{}", config.name);
        assert_eq!(first.waves(), second.waves(), "{}", config.name);
    }
}

#[test]
fn configurations_build_distinct_topologies() {
    let registry = ConfigurationRegistry::builtin();
    let mut digests: Vec<String> = registry
        .configurations()
        .iter()
        .map(|config| topology::build(config).unwrap().digest().unwrap())
        .collect();
    digests.sort();
    digests.dedup();
    assert_eq!(digests.len(), registry.configurations().len());
}
