// crates/switchboard-core/src/namespace.rs
// ============================================================================
// Module: Namespace Derivation
// Description: Deterministic namespace handling for downstream server names.
// Purpose: Provide the single derivation and resolution used everywhere.
// Dependencies: none
// ============================================================================

//! ## Overview
//! A downstream's administrative name is mapped to a namespace by lowercasing
//! it and collapsing every maximal run of whitespace into one underscore.
//! Aggregated tools are exposed as `<namespace>_<original_name>`, and the
//! router resolves a call back to its downstream by the longest namespace
//! prefix with an exact underscore boundary. This module is the only place
//! either rule is written down.

// ============================================================================
// SECTION: Derivation
// ============================================================================

/// Derives the namespace for a downstream server name.
///
/// Lowercases the name and replaces each maximal whitespace run with a single
/// underscore. The derivation is deterministic and idempotent; two distinct
/// names may still collide, which the config store flags at load time.
#[must_use]
pub fn derive_namespace(server_name: &str) -> String {
    let mut namespace = String::with_capacity(server_name.len());
    let mut in_whitespace = false;
    for ch in server_name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                namespace.push('_');
                in_whitespace = true;
            }
        } else {
            in_whitespace = false;
            for lowered in ch.to_lowercase() {
                namespace.push(lowered);
            }
        }
    }
    namespace
}

/// Joins a namespace and an original tool name into the exposed name.
#[must_use]
pub fn namespaced_tool_name(namespace: &str, tool_name: &str) -> String {
    format!("{namespace}_{tool_name}")
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves a namespaced tool name against a set of candidate namespaces.
///
/// Returns the longest candidate that is a prefix of `tool_name` followed by
/// an underscore and a non-empty remainder, together with that remainder. An
/// exact boundary is required: `"foo"` does not match `"foobar_x"`, and two
/// namespaces where one prefixes the other tie-break by longest match.
#[must_use]
pub fn resolve_namespace_prefix<'a, I>(tool_name: &'a str, namespaces: I) -> Option<(&'a str, &'a str)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<&str> = None;
    for namespace in namespaces {
        if namespace.is_empty() || tool_name.len() <= namespace.len() + 1 {
            continue;
        }
        if !tool_name.starts_with(namespace) {
            continue;
        }
        if tool_name.as_bytes()[namespace.len()] != b'_' {
            continue;
        }
        if best.is_none_or(|current| namespace.len() > current.len()) {
            best = Some(namespace);
        }
    }
    let namespace = best?;
    let original = &tool_name[namespace.len() + 1..];
    Some((namespace, original))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
