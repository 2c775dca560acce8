//! Vault HTTP client and the term source built on it.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::USER_AGENT;
use crate::error::VaultError;
use crate::filter::KeyFilter;

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct KeyList {
    keys: Vec<String>,
}

/// Minimal client for the Vault KV HTTP API.
pub struct VaultClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    /// Creates a client for the server at `base_url`.
    pub fn new(base_url: &str, token: &str) -> Result<Self, VaultError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| VaultError::ClientInit(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path.trim_matches('/'))
    }

    /// Lists the keys under `path`.
    ///
    /// Returns `None` when Vault answers 404, which means `path` is not a
    /// directory (it may still be a secret).
    pub async fn list(&self, path: &str) -> Result<Option<Vec<String>>, VaultError> {
        let response = self
            .http
            .get(self.url(path))
            .header(TOKEN_HEADER, &self.token)
            .query(&[("list", "true")])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let envelope: Envelope = response.json().await?;
                let data = envelope.data.ok_or_else(|| invalid(path, "missing 'data'"))?;
                let list: KeyList = serde_json::from_value(data).map_err(|err| {
                    debug!(path, error = %err, "unexpected listing payload");
                    invalid(path, "missing 'data.keys'")
                })?;
                Ok(Some(list.keys))
            }
            status => Err(VaultError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Reads the secret at `path`.
    ///
    /// Accepts both KV v1 (`data`) and KV v2 (`data.data`) payloads.
    pub async fn read(&self, path: &str) -> Result<Map<String, Value>, VaultError> {
        let response = self
            .http
            .get(self.url(path))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VaultError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let envelope: Envelope = response.json().await?;
        match envelope.data {
            Some(Value::Object(mut data)) => match data.remove("data") {
                Some(Value::Object(inner)) if data.contains_key("metadata") => Ok(inner),
                Some(other) => {
                    data.insert("data".to_string(), other);
                    Ok(data)
                }
                None => Ok(data),
            },
            _ => Err(invalid(path, "missing 'data' object")),
        }
    }

    /// Every secret directly under `path`, or the secret at `path` itself
    /// when it is not a directory. Sub-directories are not descended into.
    pub async fn secrets(&self, path: &str) -> Result<Vec<Map<String, Value>>, VaultError> {
        let Some(keys) = self.list(path).await? else {
            debug!(path, "not a directory, reading as a secret");
            return Ok(vec![self.read(path).await?]);
        };

        let base = path.trim_end_matches('/');
        let mut secrets = Vec::with_capacity(keys.len());
        for key in keys.iter().filter(|key| !key.ends_with('/')) {
            secrets.push(self.read(&format!("{base}/{key}")).await?);
        }

        debug!(path, keys = keys.len(), read = secrets.len(), "read vault secrets");
        Ok(secrets)
    }
}

fn invalid(path: &str, reason: &'static str) -> VaultError {
    VaultError::InvalidPayload {
        path: path.to_string(),
        reason,
    }
}

/// Turns the secrets under one Vault path into search terms.
#[derive(Debug)]
pub struct VaultSource {
    client: VaultClient,
    secret_path: String,
    filter: KeyFilter,
}

impl VaultSource {
    /// Creates a source from connection settings and field-name patterns.
    pub fn new<I, S>(url: &str, token: &str, secret_path: &str, key_list: I) -> Result<Self, VaultError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            client: VaultClient::new(url, token)?,
            secret_path: secret_path.to_string(),
            filter: KeyFilter::new(key_list)?,
        })
    }

    /// Fetches the values of the selected fields, duplicates removed, in
    /// the order they were found.
    pub async fn fetch_terms(&self) -> Result<Vec<String>, VaultError> {
        let secrets = self.client.secrets(&self.secret_path).await?;

        let mut seen = HashSet::new();
        let terms: Vec<String> = secrets
            .iter()
            .flat_map(|secret| self.filter.select(secret))
            .filter(|value| seen.insert(*value))
            .map(str::to_string)
            .collect();

        info!(path = %self.secret_path, secrets = secrets.len(), terms = terms.len(), "fetched search terms from vault");
        Ok(terms)
    }
}
