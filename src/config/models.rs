//! Configuration data structures.
//!
//! These types map one to one onto the YAML configuration file. They are
//! deliberately loose (every route field optional) so that a malformed route
//! can be reported and skipped instead of failing the whole file; the strict
//! shape lives in [`crate::core::route`].
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level gateway configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    /// TCP port to listen on
    pub listen: u16,
    /// Route entries, registered in order
    #[serde(default)]
    pub apis: Vec<ApiConfig>,
}

impl GatewayConfig {
    /// Create a new gateway configuration builder
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

/// One configured route: an input selector plus a proxy or static target.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl ApiConfig {
    /// A route answered by forwarding to `proxy`
    pub fn proxy(input: InputConfig, proxy: ProxyConfig) -> Self {
        Self {
            input,
            proxy: Some(proxy),
            http: None,
        }
    }

    /// A route answered with a fixed status and body
    pub fn status(input: InputConfig, status: u16, body: impl Into<String>) -> Self {
        Self {
            input,
            proxy: None,
            http: Some(HttpConfig {
                status,
                body: body.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InputConfig {
    /// Single verb; mutually exclusive with `methods`
    pub method: String,
    /// Several verbs; `*` or `ALL` matches any method
    pub methods: Vec<String>,
    /// Router pattern, e.g. `/users/{id}`
    pub path: String,
}

impl InputConfig {
    pub fn method(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            methods: Vec::new(),
            path: path.into(),
        }
    }

    pub fn methods<I, S>(methods: I, path: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method: String::new(),
            methods: methods.into_iter().map(Into::into).collect(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Defaults to `http`
    pub scheme: String,
    /// Defaults to `localhost`
    pub host: String,
    /// Required
    pub port: u16,
    /// Path template; the inbound path is forwarded when empty
    pub path: String,
    pub query: Option<QueryConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct QueryConfig {
    /// Parameter name to value template
    pub set: BTreeMap<String, String>,
}

/// Static response target
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HttpConfig {
    pub status: u16,
    pub body: String,
}

/// Builder for GatewayConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct GatewayConfigBuilder {
    listen: Option<u16>,
    apis: Vec<ApiConfig>,
}

impl GatewayConfigBuilder {
    /// Set the listen port
    pub fn listen(mut self, port: u16) -> Self {
        self.listen = Some(port);
        self
    }

    /// Append a route
    pub fn api(mut self, api: ApiConfig) -> Self {
        self.apis.push(api);
        self
    }

    /// Build the final GatewayConfig
    pub fn build(self) -> Result<GatewayConfig, String> {
        let listen = self
            .listen
            .filter(|port| *port != 0)
            .ok_or_else(|| "listen port is required".to_string())?;

        Ok(GatewayConfig {
            listen,
            apis: self.apis,
        })
    }
}
