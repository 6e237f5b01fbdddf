//! `${KEY}` placeholder expansion.
//!
//! Two flavours share one scanner:
//! * [`expand`] is strict and used per request for proxy path and query
//!   templates. Any placeholder whose key cannot be resolved fails the whole
//!   expansion; no partially substituted string is ever returned.
//! * [`expand_lenient`] is used once at startup to pull environment variables
//!   into the raw configuration text. Unknown keys are left untouched so that
//!   request-time templates survive, and `$${KEY}` yields a literal `${KEY}`.
use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([^{}]*)\}").expect("placeholder regex is valid"));

/// Errors raised while expanding a template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateError {
    /// A placeholder referenced a key the lookup could not resolve
    #[error("variable ${{{key}}} not set")]
    Unresolved { key: String },
}

/// Result type for template expansion
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Returns true when `template` contains at least one `${KEY}` placeholder.
pub fn has_placeholders(template: &str) -> bool {
    PLACEHOLDER.is_match(template)
}

/// Expand every `${KEY}` in `template` using `lookup`.
///
/// `$${KEY}` is not treated as an escape here: the leading `$` is kept and the
/// placeholder is expanded like any other.
pub fn expand<'t, F, V>(template: &'t str, lookup: F) -> TemplateResult<Cow<'t, str>>
where
    F: Fn(&str) -> Option<V>,
    V: AsRef<str>,
{
    if !has_placeholders(template) {
        return Ok(Cow::Borrowed(template));
    }

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let key = &caps[2];
        let value = lookup(key).ok_or_else(|| TemplateError::Unresolved {
            key: key.to_string(),
        })?;

        out.push_str(&template[last..whole.start()]);
        out.push_str(&caps[1]);
        out.push_str(value.as_ref());
        last = whole.end();
    }
    out.push_str(&template[last..]);

    Ok(Cow::Owned(out))
}

/// Expand the placeholders `lookup` knows about and keep the rest verbatim.
pub fn expand_lenient<F, V>(template: &str, lookup: F) -> Cow<'_, str>
where
    F: Fn(&str) -> Option<V>,
    V: AsRef<str>,
{
    PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let key = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{key}}}");
        }
        match lookup(key) {
            Some(value) => value.as_ref().to_string(),
            None => caps[0].to_string(),
        }
    })
}
