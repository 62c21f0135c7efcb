// crates/switchboard-core/src/namespace/tests.rs
// ============================================================================
// Module: Namespace Derivation Tests
// Description: Unit and property tests for namespace handling.
// Purpose: Validate derivation determinism and prefix resolution boundaries.
// Dependencies: switchboard-core, proptest
// ============================================================================

//! ## Overview
//! Covers the derivation rule (lowercase, whitespace runs to one underscore),
//! its idempotence, and the longest-prefix resolution including the exact
//! underscore boundary the router depends on.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use proptest::proptest;

use super::derive_namespace;
use super::namespaced_tool_name;
use super::resolve_namespace_prefix;

// ============================================================================
// SECTION: Derivation
// ============================================================================

#[test]
fn derivation_lowercases_and_collapses_whitespace() {
    assert_eq!(derive_namespace("Foo Bar"), "foo_bar");
    assert_eq!(derive_namespace("foo"), "foo");
    assert_eq!(derive_namespace("Foo\t \nBar"), "foo_bar");
    assert_eq!(derive_namespace("GitHub Tools v2"), "github_tools_v2");
}

#[test]
fn derivation_keeps_leading_and_trailing_runs() {
    assert_eq!(derive_namespace(" Foo "), "_foo_");
    assert_eq!(derive_namespace("  "), "_");
}

#[test]
fn distinct_names_may_collide() {
    assert_eq!(derive_namespace("Foo Bar"), derive_namespace("foo\tbar"));
}

#[test]
fn namespaced_name_joins_with_underscore() {
    assert_eq!(namespaced_tool_name("foo_bar", "ping"), "foo_bar_ping");
}

proptest! {
    #[test]
    fn derivation_is_deterministic(name in ".{0,64}") {
        assert_eq!(derive_namespace(&name), derive_namespace(&name));
    }

    #[test]
    fn derivation_is_idempotent(name in ".{0,64}") {
        let once = derive_namespace(&name);
        assert_eq!(derive_namespace(&once), once);
    }

    #[test]
    fn derived_namespaces_contain_no_whitespace(name in ".{0,64}") {
        assert!(!derive_namespace(&name).chars().any(char::is_whitespace));
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

#[test]
fn resolution_requires_underscore_boundary() {
    let namespaces = ["foo"];
    assert_eq!(resolve_namespace_prefix("foo_x", namespaces), Some(("foo", "x")));
    assert_eq!(resolve_namespace_prefix("foobar_x", namespaces), None);
    assert_eq!(resolve_namespace_prefix("foo", namespaces), None);
    assert_eq!(resolve_namespace_prefix("foo_", namespaces), None);
}

#[test]
fn resolution_prefers_longest_match() {
    let namespaces = ["foo", "foo_bar"];
    assert_eq!(resolve_namespace_prefix("foo_bar_ping", namespaces), Some(("foo_bar", "ping")));
    assert_eq!(resolve_namespace_prefix("foo_x", namespaces), Some(("foo", "x")));
}

#[test]
fn strict_prefix_namespace_still_resolves() {
    let namespaces = ["foo", "foo_bar"];
    assert_eq!(resolve_namespace_prefix("foo_baz", namespaces), Some(("foo", "baz")));
}

#[test]
fn resolution_skips_unrelated_namespaces() {
    let namespaces = ["alpha", "beta"];
    assert_eq!(resolve_namespace_prefix("gamma_x", namespaces), None);
}
