// src/script/placeholder.rs

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"__([A-Z0-9]+(?:_[A-Z0-9]+)*)__").expect("placeholder regex is valid")
});

/// The literal token a variable named `name` replaces: `__NAME__`.
pub fn placeholder_token(name: &str) -> String {
    format!("__{}__", name.to_uppercase())
}

/// Replace every occurrence of each variable's token, one variable at a time,
/// in the order given.
///
/// Tokens with no matching variable are left in place, and variables whose
/// token never appears are ignored.
pub fn substitute<K, V>(text: &str, variables: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = text.to_string();
    for (name, value) in variables {
        let token = placeholder_token(name.as_ref());
        if out.contains(&token) {
            out = out.replace(&token, value.as_ref());
        }
    }
    out
}

/// Names of placeholders still present in `text`, in first-seen order.
pub fn unresolved_placeholders(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PLACEHOLDER_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
