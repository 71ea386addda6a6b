//! Sonarr v3 API client.
//!
//! The HTTP round-trip sits behind the [`Transport`] trait so every
//! reconciliation path can run against an in-memory fake. [`ArrClient`]
//! is the facade the settings sections use: a generic per-endpoint
//! resource client, the tag label to id resolver, and get/put access to
//! the singleton `config/*` resources.

use crate::error::{Error, Result};
use crate::secrets::Secrets;
use reconcile::Attrs;
use serde_json::Value;
use std::collections::BTreeMap;

/// Blocking JSON transport to one instance.
///
/// Paths are absolute (`/api/v3/tag`, `/initialize.json`); the transport
/// owns the host URL and credentials.
pub trait Transport {
    /// GET a JSON document.
    fn get(&self, path: &str) -> Result<Value>;
    /// POST a JSON body, returning the created representation.
    fn post(&self, path: &str, body: &Value) -> Result<Value>;
    /// PUT a JSON body, returning the updated representation.
    fn put(&self, path: &str, body: &Value) -> Result<Value>;
    /// DELETE a resource.
    fn delete(&self, path: &str) -> Result<()>;
}

/// Transport implementation over a real HTTP connection.
pub struct HttpTransport {
    agent: ureq::Agent,
    host_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    /// Create a transport for a host URL, optionally authenticated.
    pub fn new(host_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            host_url: host_url.into(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host_url, path)
    }

    fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or("")
    }
}

/// Convert a ureq failure into the application error taxonomy.
fn request_error(err: ureq::Error, method: &str, path: &str) -> Error {
    match err {
        ureq::Error::StatusCode(status) => Error::Api {
            status,
            message: format!("{method} {path}"),
        },
        other => Error::Transport(other.to_string()),
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> Result<Value> {
        self.agent
            .get(self.url(path))
            .header("Accept", "application/json")
            .header("X-Api-Key", self.api_key())
            .call()
            .map_err(|e| request_error(e, "GET", path))?
            .body_mut()
            .read_json()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.agent
            .post(self.url(path))
            .header("Accept", "application/json")
            .header("X-Api-Key", self.api_key())
            .send_json(body)
            .map_err(|e| request_error(e, "POST", path))?
            .body_mut()
            .read_json()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.agent
            .put(self.url(path))
            .header("Accept", "application/json")
            .header("X-Api-Key", self.api_key())
            .send_json(body)
            .map_err(|e| request_error(e, "PUT", path))?
            .body_mut()
            .read_json()
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.agent
            .delete(self.url(path))
            .header("Accept", "application/json")
            .header("X-Api-Key", self.api_key())
            .call()
            .map_err(|e| request_error(e, "DELETE", path))?;
        Ok(())
    }
}

/// Transport wrapper that reads from the wrapped transport but never
/// writes: mutations are acknowledged with a synthesized response so the
/// diff pass can run to completion without touching the instance.
pub struct DryRunTransport {
    inner: Box<dyn Transport>,
}

impl DryRunTransport {
    /// Wrap a transport.
    pub fn new(inner: Box<dyn Transport>) -> Self {
        Self { inner }
    }
}

impl Transport for DryRunTransport {
    fn get(&self, path: &str) -> Result<Value> {
        self.inner.get(path)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        log::debug!("dry run: skipping POST {path}");
        let mut created = body.as_object().cloned().unwrap_or_default();
        created.entry("id").or_insert(Value::from(0));
        Ok(Value::Object(created))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value> {
        log::debug!("dry run: skipping PUT {path}");
        Ok(body.clone())
    }

    fn delete(&self, path: &str) -> Result<()> {
        log::debug!("dry run: skipping DELETE {path}");
        Ok(())
    }
}

/// API facade used by the settings sections.
pub struct ArrClient {
    transport: Box<dyn Transport>,
}

impl ArrClient {
    /// Create a client over an arbitrary transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create an authenticated HTTP client for an instance.
    pub fn from_secrets(secrets: &Secrets) -> Self {
        Self::new(Box::new(HttpTransport::new(
            secrets.host_url(),
            Some(secrets.api_key.clone()),
        )))
    }

    /// Wrap this client's transport so mutations become no-ops.
    pub fn into_dry_run(self) -> Self {
        Self::new(Box::new(DryRunTransport::new(self.transport)))
    }

    /// Client for one resource collection endpoint (`indexer`,
    /// `downloadclient`, `tag`, ...).
    pub fn resources(&self, endpoint: &'static str) -> ResourceClient<'_> {
        ResourceClient {
            transport: self.transport.as_ref(),
            endpoint,
        }
    }

    /// Resolve tag labels to their remote ids.
    pub fn tag_ids(&self) -> Result<BTreeMap<String, i64>> {
        let mut ids = BTreeMap::new();
        for tag in self.resources("tag").list()? {
            let label = attr_str(&tag, "label")?;
            ids.insert(label.to_string(), resource_id(&tag)?);
        }
        Ok(ids)
    }

    /// Fetch a singleton configuration resource (`/config/{slug}`).
    pub fn config_get(&self, slug: &str) -> Result<Attrs> {
        into_attrs(self.transport.get(&format!("/api/v3/config/{slug}"))?)
    }

    /// Replace a singleton configuration resource.
    pub fn config_put(&self, slug: &str, id: i64, attrs: &Attrs) -> Result<Attrs> {
        into_attrs(self.transport.put(
            &format!("/api/v3/config/{slug}/{id}"),
            &Value::Object(attrs.clone()),
        )?)
    }
}

/// Generic client for one resource collection endpoint.
pub struct ResourceClient<'a> {
    transport: &'a dyn Transport,
    endpoint: &'static str,
}

impl ResourceClient<'_> {
    /// List all resources.
    pub fn list(&self) -> Result<Vec<Attrs>> {
        let listing = self.transport.get(&format!("/api/v3/{}", self.endpoint))?;
        match listing {
            Value::Array(items) => items.into_iter().map(into_attrs).collect(),
            other => Err(Error::UnexpectedResponse(format!(
                "{} listing is not an array: {other}",
                self.endpoint
            ))),
        }
    }

    /// List the available implementation schemas for this endpoint.
    pub fn schemas(&self) -> Result<Vec<Attrs>> {
        let listing = self
            .transport
            .get(&format!("/api/v3/{}/schema", self.endpoint))?;
        match listing {
            Value::Array(items) => items.into_iter().map(into_attrs).collect(),
            other => Err(Error::UnexpectedResponse(format!(
                "{} schema listing is not an array: {other}",
                self.endpoint
            ))),
        }
    }

    /// Create a resource.
    pub fn create(&self, attrs: &Attrs) -> Result<Attrs> {
        into_attrs(self.transport.post(
            &format!("/api/v3/{}", self.endpoint),
            &Value::Object(attrs.clone()),
        )?)
    }

    /// Update a resource by its remote id.
    pub fn update(&self, id: i64, attrs: &Attrs) -> Result<Attrs> {
        into_attrs(self.transport.put(
            &format!("/api/v3/{}/{id}", self.endpoint),
            &Value::Object(attrs.clone()),
        )?)
    }

    /// Delete a resource by its remote id.
    pub fn delete(&self, id: i64) -> Result<()> {
        self.transport
            .delete(&format!("/api/v3/{}/{id}", self.endpoint))
    }
}

/// Read a resource's remote-assigned integer id.
pub fn resource_id(attrs: &Attrs) -> Result<i64> {
    attrs
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::UnexpectedResponse("resource has no integer id".to_string()))
}

/// Read a required string attribute from a resource.
pub fn attr_str<'a>(attrs: &'a Attrs, name: &str) -> Result<&'a str> {
    attrs
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::UnexpectedResponse(format!("resource has no '{name}' attribute")))
}

fn into_attrs(value: Value) -> Result<Attrs> {
    match value {
        Value::Object(attrs) => Ok(attrs),
        other => Err(Error::UnexpectedResponse(format!(
            "expected a JSON object, got: {other}"
        ))),
    }
}
