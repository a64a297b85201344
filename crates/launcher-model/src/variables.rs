//! Variable substitution for descriptor values.
//!
//! Values may embed `${name}` tokens. Resolution is recursive: a resolved
//! value may itself contain tokens. A token whose name is unknown, or whose
//! expansion would revisit a name already being expanded, resolves to the
//! empty string, so substitution always terminates. The literal sequence
//! `{dollar}` stands for a dollar sign and is only rewritten where a caller
//! asks for it via [`unescape`].

use serde_json::Value;

/// Escape sequence for a literal `$`, applied after substitution.
pub const DOLLAR_ESCAPE: &str = "{dollar}";

/// Substitutes every `${name}` token in `template` using `lookup`.
///
/// Unknown names and cyclic references expand to the empty string. A `${`
/// without a closing brace is kept verbatim.
///
/// # Example
///
/// ```
/// use launcher_model::variables;
///
/// let value = variables::resolve("port ${port}", &|name| {
///     (name == "port").then(|| "8080".to_string())
/// });
/// assert_eq!(value, "port 8080");
/// ```
pub fn resolve<F>(template: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut active = Vec::new();
    resolve_inner(template, lookup, &mut active)
}

fn resolve_inner<F>(template: &str, lookup: &F, active: &mut Vec<String>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated token, keep the tail verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if active.iter().any(|seen| seen == name) {
            // A name already being expanded resolves to nothing.
        } else if let Some(value) = lookup(name) {
            active.push(name.to_string());
            let expanded = resolve_inner(&value, lookup, active);
            active.pop();
            out.push_str(&expanded);
        }
        // Unknown names also resolve to nothing.
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Applies [`resolve`] to every string value nested inside a JSON value.
pub fn resolve_json<F>(value: &Value, lookup: &F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => Value::String(resolve(s, lookup)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_json(v, lookup)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_json(v, lookup)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Rewrites the `{dollar}` escape to a literal `$`.
pub fn unescape(value: &str) -> String {
    value.replace(DOLLAR_ESCAPE, "$")
}
