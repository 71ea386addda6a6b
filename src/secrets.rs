//! Instance connection secrets.
//!
//! A [`Secrets`] handle pins down everything needed to talk to one
//! instance: the resolved host URL, a working API key, and the remote
//! version discovered while probing the connection. Reconciliation code
//! only ever forwards the handle; it never inspects it.

use crate::api::{HttpTransport, Transport};
use crate::config::{InstanceConfig, Protocol};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection descriptor for one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secrets {
    /// Hostname the instance is reachable at
    pub hostname: String,
    /// Port number
    pub port: u16,
    /// `http` or `https`
    pub protocol: Protocol,
    /// URL base path when the instance sits behind a reverse proxy
    pub url_base: Option<String>,
    /// API key, configured or auto-retrieved
    pub api_key: String,
    /// Version reported by the instance
    pub version: String,
}

impl Secrets {
    /// Root URL of the instance, without a trailing slash.
    pub fn host_url(&self) -> String {
        host_url(
            self.protocol,
            &self.hostname,
            self.port,
            self.url_base.as_deref(),
        )
    }

    /// Resolve the secrets for an instance over HTTP.
    ///
    /// When the configuration carries no API key, it is retrieved from
    /// the instance's `initialize.json` document, which only works while
    /// authentication is disabled. Either way the connection is probed
    /// through the system status endpoint before the handle is returned.
    pub fn get(config: &InstanceConfig, instance_name: &str) -> Result<Self> {
        let hostname = config.resolved_hostname(instance_name);
        let url = host_url(
            config.protocol,
            &hostname,
            config.port,
            config.url_base.as_deref(),
        );
        Self::get_via(config, instance_name, |api_key| {
            Box::new(HttpTransport::new(&url, api_key))
        })
    }

    /// Resolve the secrets through a caller-supplied transport factory.
    ///
    /// The factory is invoked once without credentials for API key
    /// retrieval (when needed) and once with the resolved key for the
    /// connection probe.
    pub fn get_via(
        config: &InstanceConfig,
        instance_name: &str,
        make_transport: impl Fn(Option<String>) -> Box<dyn Transport>,
    ) -> Result<Self> {
        let hostname = config.resolved_hostname(instance_name);
        let url = host_url(
            config.protocol,
            &hostname,
            config.port,
            config.url_base.as_deref(),
        );

        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => fetch_api_key(make_transport(None).as_ref(), &url)?,
        };

        let transport = make_transport(Some(api_key.clone()));
        let status = match transport.get("/api/v3/system/status") {
            Ok(status) => status,
            Err(err) if err.status() == Some(401) => {
                return Err(Error::SecretsUnauthorized(format!(
                    "Incorrect API key for the instance at '{url}'. \
                     Check that the configured key matches the value shown under \
                     'Settings -> General -> API Key' on the instance."
                )));
            }
            Err(err) => return Err(err),
        };
        let version = status
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            hostname,
            port: config.port,
            protocol: config.protocol,
            url_base: config.url_base.clone(),
            api_key,
            version,
        })
    }
}

/// Retrieve the API key from the unauthenticated bootstrap document.
fn fetch_api_key(transport: &dyn Transport, url: &str) -> Result<String> {
    let initialize = match transport.get("/initialize.json") {
        Ok(doc) => doc,
        Err(err) if err.status() == Some(401) => {
            return Err(Error::SecretsUnauthorized(format!(
                "Unable to retrieve the API key for the instance at '{url}': \
                 authentication is enabled. Set \
                 'Settings -> General -> Authentication Required' to \
                 'Disabled for Local Addresses', or define the API key \
                 explicitly in the configuration file."
            )));
        }
        Err(err) => return Err(err),
    };
    initialize
        .get("apiKey")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::UnexpectedResponse("initialize.json carries no 'apiKey'".to_string())
        })
}

/// Render a root URL from its connection parts.
fn host_url(protocol: Protocol, hostname: &str, port: u16, url_base: Option<&str>) -> String {
    format!("{protocol}://{hostname}:{port}{}", url_base.unwrap_or(""))
}
