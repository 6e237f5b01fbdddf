//! Per-request variable lookup for template expansion.
use std::borrow::Cow;

/// Resolves template keys against one inbound request.
///
/// Resolution order:
/// 1. path parameter captured by the dispatcher, if non-empty
/// 2. for `*`, the catch-all capture, if non-empty
/// 3. first query parameter with that name, if non-empty
/// 4. `*` falls back to `""`
///
/// A path parameter therefore shadows a query parameter of the same name.
/// The mapper only borrows request data and is dropped with the request.
#[derive(Debug)]
pub struct VariableMapper<'r> {
    path_params: &'r [(String, String)],
    query: Vec<(Cow<'r, str>, Cow<'r, str>)>,
    wildcard_param: Option<&'r str>,
}

impl<'r> VariableMapper<'r> {
    pub fn new(
        path_params: &'r [(String, String)],
        raw_query: Option<&'r str>,
        wildcard_param: Option<&'r str>,
    ) -> Self {
        let query = raw_query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).collect())
            .unwrap_or_default();
        Self {
            path_params,
            query,
            wildcard_param,
        }
    }

    fn path_param(&self, key: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_ref())
    }

    /// Look up `key`; `None` means the key is unknown for this request.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        if let Some(v) = self.path_param(key).filter(|v| !v.is_empty()) {
            return Some(v);
        }
        let catch_all = (key == "*")
            .then(|| self.wildcard_param.and_then(|name| self.path_param(name)))
            .flatten();
        if let Some(v) = catch_all.filter(|v| !v.is_empty()) {
            return Some(v);
        }
        if let Some(v) = self.query_param(key).filter(|v| !v.is_empty()) {
            return Some(v);
        }
        if key == "*" {
            return Some("");
        }
        None
    }
}
