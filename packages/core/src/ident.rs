//! Identifier case conversions for fragment names, node names, and IDs.
//!
//! Thin wrappers over `heck` with the validation rules the fragment
//! protocol requires: a hyphenated fragment converts to a capitalized-word
//! component name only when every hyphen-separated segment is non-empty
//! and free of embedded spaces; anything else invalidates the conversion
//! and the caller falls back to the default component.

use heck::{ToKebabCase, ToUpperCamelCase};

/// Converts a hyphenated fragment name to a capitalized-word component
/// name: `recent-stats` becomes `RecentStats`.
///
/// Returns `None` when the fragment is empty, any hyphen segment is empty
/// (leading, trailing, or doubled hyphens), or a segment contains
/// whitespace.
#[must_use]
pub fn fragment_to_component(fragment: &str) -> Option<String> {
    if fragment.is_empty() {
        return None;
    }
    let mut name = String::new();
    for segment in fragment.split('-') {
        if segment.is_empty() || segment.contains(char::is_whitespace) {
            return None;
        }
        name.push_str(&segment.to_upper_camel_case());
    }
    Some(name)
}

/// Converts a capitalized-word name to its hyphenated form:
/// `RecentStats` becomes `recent-stats`.
#[must_use]
pub fn kebab_name(name: &str) -> String {
    name.to_kebab_case()
}

/// Hyphenated display name for a type: the last path segment of the type
/// name in kebab case. `myapp::pages::UserPage` becomes `user-page`.
#[must_use]
pub fn type_kebab_name(full_type_name: &str) -> String {
    let last = full_type_name
        .rsplit("::")
        .next()
        .unwrap_or(full_type_name);
    last.to_kebab_case()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
