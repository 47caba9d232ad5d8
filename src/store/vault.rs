//! Blocking client for the Vault HTTP API.
//!
//! Only the logical endpoints under `/v1/` are used:
//! - `GET /v1/<path>?list=true` lists a directory node
//! - `GET /v1/<path>` reads a leaf
//! - `PUT /v1/<path>` replaces a leaf
//! - `DELETE /v1/<path>` removes a leaf
//!
//! A 404 on list or read is treated as "nothing here" rather than an error,
//! matching how the official clients report missing secrets.

use std::path::PathBuf;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{KvStore, StoreError};
use crate::document::Values;

/// Address used when neither configuration nor `VAULT_ADDR` provide one.
pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";

pub const ENV_ADDRESS: &str = "VAULT_ADDR";
pub const ENV_TOKEN: &str = "VAULT_TOKEN";
pub const ENV_NAMESPACE: &str = "VAULT_NAMESPACE";

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

#[derive(Debug, Deserialize)]
struct SecretResponse<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault client implementing [`KvStore`].
#[derive(Clone)]
pub struct VaultClient {
    address: String,
    token: String,
    namespace: Option<String>,
    http: Client,
}

impl VaultClient {
    /// Creates a client for `address` authenticating with `token`.
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Result<Self, StoreError> {
        let http = Client::builder().build()?;
        Self::with_http_client(address.into(), token.into(), http)
    }

    fn with_http_client(address: String, token: String, http: Client) -> Result<Self, StoreError> {
        let address = address.trim().trim_end_matches('/').to_string();
        if address.is_empty() {
            return Err(StoreError::Config("Vault address is empty".to_string()));
        }

        Ok(Self {
            address,
            token,
            namespace: None,
            http,
        })
    }

    /// Creates a client configured purely from the process environment.
    ///
    /// Uses `VAULT_ADDR` (or [`DEFAULT_ADDRESS`]), `VAULT_TOKEN` falling back
    /// to `~/.vault-token`, and `VAULT_NAMESPACE`.
    pub fn from_env() -> Result<Self, StoreError> {
        let address = non_empty_env(ENV_ADDRESS).unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let token = non_empty_env(ENV_TOKEN)
            .or_else(token_from_file)
            .unwrap_or_default();

        Ok(Self::new(address, token)?.with_namespace(non_empty_env(ENV_NAMESPACE)))
    }

    /// Sets the namespace sent with every request.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    /// Returns the server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Builds the API URL for a logical path.
    fn build_url(&self, path: &str) -> String {
        let base_url = if self.address.starts_with("http://") || self.address.starts_with("https://")
        {
            self.address.clone()
        } else {
            format!("https://{}", self.address)
        };

        format!("{}/v1/{}", base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(TOKEN_HEADER, &self.token);
        match &self.namespace {
            Some(namespace) => request.header(NAMESPACE_HEADER, namespace),
            None => request,
        }
    }

    /// Fetches a secret body, mapping 404 to `None`.
    fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<SecretResponse<T>>, StoreError> {
        let response = self.authorize(request).send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = check_status(response)?.text()?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }
}

impl std::fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address)
            .field("token", &"<redacted>")
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl KvStore for VaultClient {
    fn list(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let request = self
            .http
            .get(self.build_url(path))
            .query(&[("list", "true")]);
        let response: Option<SecretResponse<ListData>> = self.get_data(request)?;

        Ok(response
            .and_then(|r| r.data)
            .map(|data| data.keys)
            .unwrap_or_default())
    }

    fn read(&self, path: &str) -> Result<Option<Values>, StoreError> {
        let request = self.http.get(self.build_url(path));
        let response: Option<SecretResponse<Values>> = self.get_data(request)?;

        Ok(response.map(|r| r.data.unwrap_or_default()))
    }

    fn write(&self, path: &str, values: &Values) -> Result<(), StoreError> {
        let request = self.http.put(self.build_url(path)).json(values);
        check_status(self.authorize(request).send()?)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let request = self.http.delete(self.build_url(path));
        check_status(self.authorize(request).send()?)?;
        Ok(())
    }
}

/// Turns a non-success response into [`StoreError::Api`].
fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

fn api_error(status: u16, body: &str) -> StoreError {
    let mut errors = serde_json::from_str::<ErrorResponse>(body)
        .unwrap_or_default()
        .errors;
    if errors.is_empty() && !body.trim().is_empty() {
        errors.push(body.trim().to_string());
    }
    StoreError::Api { status, errors }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Path of the token file written by `vault login`.
pub fn token_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vault-token"))
}

/// Reads the token stored by `vault login`, if any.
pub fn token_from_file() -> Option<String> {
    let contents = std::fs::read_to_string(token_file_path()?).ok()?;
    let token = contents.trim();
    (!token.is_empty()).then(|| token.to_string())
}
