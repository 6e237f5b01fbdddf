//! Outbound path and query rewriting for proxy routes.
use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use thiserror::Error;
use url::form_urlencoded;

use crate::core::{
    mapper::VariableMapper,
    route::{ProxyTarget, QueryRewrite},
    template::{self, TemplateError},
};

/// Bytes escaped in a value substituted into the path. `/` is kept so a
/// catch-all capture still spans segments.
const PATH_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Why a request could not be rewritten. Surfaced to the caller as a 500.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("failed to substitute path: {0}")]
    Path(#[source] TemplateError),

    #[error("failed to substitute query parameter '{param}': {source}")]
    Query {
        param: String,
        #[source]
        source: TemplateError,
    },
}

/// The rewritten request target, relative to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenTarget {
    pub path: String,
    /// Encoded query string, without the leading `?`
    pub query: Option<String>,
}

impl RewrittenTarget {
    /// `path?query` as it is logged.
    pub fn path_and_query(&self) -> String {
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => format!("{}?{q}", self.path),
            _ => self.path.clone(),
        }
    }
}

/// Apply the path template, then the query rules, of `target`.
///
/// `path` and `raw_query` are the inbound request's; every template is
/// resolved against `mapper`, which reflects the inbound request as well.
/// Values substituted into the path are re-escaped, since captures arrive
/// percent-decoded.
pub fn rewrite(
    target: &ProxyTarget,
    mapper: &VariableMapper<'_>,
    path: &str,
    raw_query: Option<&str>,
) -> Result<RewrittenTarget, RewriteError> {
    let path = match &target.path {
        Some(tpl) => template::expand(tpl, |k| {
            mapper
                .lookup(k)
                .map(|v| utf8_percent_encode(v, PATH_VALUE).to_string())
        })
        .map_err(RewriteError::Path)?
        .into_owned(),
        None => path.to_string(),
    };

    let query = match &target.query {
        Some(rules) => Some(rewrite_query(rules, mapper, raw_query)?),
        None => raw_query.map(str::to_string),
    };

    Ok(RewrittenTarget { path, query })
}

/// Overwrite every parameter named in `rules` and re-encode the whole query.
///
/// Each rule sets a single value, replacing all existing values of that name.
/// Re-encoding sorts parameters by name and normalises escaping; the relative
/// order of repeated values is kept.
pub fn rewrite_query(
    rules: &QueryRewrite,
    mapper: &VariableMapper<'_>,
    raw_query: Option<&str>,
) -> Result<String, RewriteError> {
    let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in form_urlencoded::parse(raw_query.unwrap_or_default().as_bytes()) {
        values.entry(k.into_owned()).or_default().push(v.into_owned());
    }

    for (param, tpl) in &rules.set {
        let value = template::expand(tpl, |k| mapper.lookup(k)).map_err(|source| {
            RewriteError::Query {
                param: param.clone(),
                source,
            }
        })?;
        values.insert(param.clone(), vec![value.into_owned()]);
    }

    let mut encoded = form_urlencoded::Serializer::new(String::new());
    for (k, vs) in &values {
        for v in vs {
            encoded.append_pair(k, v);
        }
    }
    Ok(encoded.finish())
}
