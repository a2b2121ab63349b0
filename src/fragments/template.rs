//! Parameter substitution - `{{ params.name }}` in fragment bodies
//!
//! Platform expressions (`${{ ... }}`) are left untouched. A string that is
//! exactly one placeholder takes the argument's scalar type, so numeric
//! fields such as `timeout_minutes` can be parameterized.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;
use smallvec::SmallVec;

/// `{{ params.name }}`, optionally preceded by `$` (which disables it)
static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$?)\{\{\s*params\.([A-Za-z_][A-Za-z0-9_-]*)\s*\}\}").expect("valid regex")
});

/// Parameter names referenced but not supplied
pub type MissingParams = SmallVec<[String; 4]>;

/// Substitute placeholders in one string
pub fn substitute<'a>(
    template: &'a str,
    args: &BTreeMap<String, String>,
    missing: &mut MissingParams,
) -> Cow<'a, str> {
    if !template.contains("params.") {
        return Cow::Borrowed(template);
    }

    let mut result = String::with_capacity(template.len() + 32);
    let mut last_end = 0;
    for caps in PARAM_RE.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        result.push_str(&template[last_end..whole.start()]);
        last_end = whole.end();

        if !caps[1].is_empty() {
            result.push_str(whole.as_str());
            continue;
        }
        let name = &caps[2];
        match args.get(name) {
            Some(value) => result.push_str(value),
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                result.push_str(whole.as_str());
            }
        }
    }
    result.push_str(&template[last_end..]);
    Cow::Owned(result)
}

/// Substitute placeholders in every string (keys included) of a YAML tree
pub fn substitute_value(
    value: &Value,
    args: &BTreeMap<String, String>,
    missing: &mut MissingParams,
) -> Value {
    match value {
        Value::String(s) => {
            if let Some(typed) = whole_placeholder(s, args) {
                return typed;
            }
            Value::String(substitute(s, args, missing).into_owned())
        }
        Value::Sequence(items) => Value::Sequence(
            items
                .iter()
                .map(|item| substitute_value(item, args, missing))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| {
                    (
                        substitute_value(k, args, missing),
                        substitute_value(v, args, missing),
                    )
                })
                .collect(),
        ),
        Value::Tagged(tagged) => substitute_value(&tagged.value, args, missing),
        other => other.clone(),
    }
}

/// A string that is exactly one known placeholder with a number/bool argument
fn whole_placeholder(s: &str, args: &BTreeMap<String, String>) -> Option<Value> {
    let caps = PARAM_RE.captures(s.trim())?;
    let whole = caps.get(0)?;
    if whole.as_str().len() != s.trim().len() || !caps[1].is_empty() {
        return None;
    }
    let arg = args.get(&caps[2])?;
    match serde_yaml::from_str::<Value>(arg) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_replaces_params_only() {
        let mut missing = MissingParams::new();
        let out = substitute(
            "cargo clippy -p {{ params.crate }} -- ${{ matrix.flag }}",
            &args(&[("crate", "core")]),
            &mut missing,
        );
        assert_eq!(out, "cargo clippy -p core -- ${{ matrix.flag }}");
        assert!(missing.is_empty());
    }

    #[test]
    fn test_dollar_prefixed_placeholder_untouched() {
        let mut missing = MissingParams::new();
        let out = substitute("${{ params.x }}", &args(&[("x", "1")]), &mut missing);
        assert_eq!(out, "${{ params.x }}");
    }

    #[test]
    fn test_missing_params_collected_once() {
        let mut missing = MissingParams::new();
        let out = substitute("{{params.a}} {{ params.a }}", &args(&[]), &mut missing);
        assert_eq!(out, "{{params.a}} {{ params.a }}");
        assert_eq!(missing.as_slice(), ["a".to_string()]);
    }

    #[test]
    fn test_no_placeholder_borrows() {
        let mut missing = MissingParams::new();
        assert!(matches!(
            substitute("plain", &args(&[]), &mut missing),
            Cow::Borrowed("plain")
        ));
    }

    #[test]
    fn test_whole_placeholder_keeps_scalar_type() {
        let template: Value =
            serde_yaml::from_str("timeout_minutes: '{{ params.t }}'\nname: 'job-{{ params.t }}'\n")
                .unwrap();
        let mut missing = MissingParams::new();
        let out = substitute_value(&template, &args(&[("t", "30")]), &mut missing);
        assert_eq!(out["timeout_minutes"].as_u64(), Some(30));
        assert_eq!(out["name"].as_str(), Some("job-30"));
    }
}
