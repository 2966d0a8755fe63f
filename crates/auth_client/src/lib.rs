use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// `estatus` value of a successful login.
pub const LOGIN_OK: i64 = 200;

/// Where the credential-exchange service lives.
#[derive(Debug, Clone)]
pub struct CredentialClientConfig {
    pub base_url: String,
    pub company_id: i64,
}

impl CredentialClientConfig {
    /// Loads config from env vars:
    /// - `ABONOS_AUTH_URL`     (default: `http://localhost:8080/api/`)
    /// - `ABONOS_AUTH_COMPANY` (default: `0`)
    pub fn from_env() -> Self {
        let base_url = std::env::var("ABONOS_AUTH_URL")
            .unwrap_or_else(|_| "http://localhost:8080/api/".to_string());
        let company_id = std::env::var("ABONOS_AUTH_COMPANY")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        Self {
            base_url,
            company_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginRequest {
    pub agente: String,
    pub contrasena: String,
    pub idempresas: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub idusuario: i64,
    #[serde(default)]
    pub idacceso: String,
    #[serde(default)]
    pub fotop: String,
    #[serde(default)]
    pub estatus: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub msystem: String,
}

impl LoginResponse {
    pub fn is_success(&self) -> bool {
        self.estatus == LOGIN_OK
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub idusuario: i64,
    pub idacceso: String,
    pub fotop: String,
    #[serde(rename = "isAuthenticated")]
    pub is_authenticated: bool,
}

impl UserSession {
    pub fn from_login(response: &LoginResponse) -> Self {
        Self {
            idusuario: response.idusuario,
            idacceso: response.idacceso.clone(),
            fotop: response.fotop.clone(),
            is_authenticated: true,
        }
    }
}

/// Blocking client for the login endpoint.
#[derive(Debug, Clone)]
pub struct CredentialClient {
    http: Client,
    base_url: Url,
    company_id: i64,
}

impl CredentialClient {
    pub fn new(config: CredentialClientConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            company_id: config.company_id,
        })
    }

    pub fn login_url(&self) -> Result<Url> {
        self.base_url
            .join("Eventos/Login")
            .context("Failed to build /Eventos/Login URL")
    }

    /// Exchanges credentials for a [`LoginResponse`]. A rejected login is
    /// still `Ok`; check [`LoginResponse::is_success`].
    pub fn login(&self, agente: &str, contrasena: &str) -> Result<LoginResponse> {
        let endpoint = self.login_url()?;
        let request = LoginRequest {
            agente: agente.trim().to_string(),
            contrasena: contrasena.to_string(),
            idempresas: self.company_id,
        };

        let response = self
            .http
            .post(endpoint.clone())
            .json(&request)
            .send()
            .with_context(|| format!("POST {endpoint} failed"))?;
        let status = response.status();

        response
            .json()
            .with_context(|| format!("Failed to parse JSON response from {endpoint} ({status})"))
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let mut normalized = base_url.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let url = Url::parse(&normalized).with_context(|| format!("Invalid auth base URL: {base_url}"))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("Unsupported scheme '{other}' for auth base URL")),
    }
}

/// Persistence of the signed-in session.
pub trait SessionStore {
    fn save(&self, session: &UserSession) -> Result<()>;

    /// `None` when nothing is stored or the stored data is unreadable.
    fn load(&self) -> Result<Option<UserSession>>;

    fn clear(&self) -> Result<()>;

    fn is_authenticated(&self) -> bool {
        matches!(self.load(), Ok(Some(session)) if session.is_authenticated)
    }
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<UserSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &UserSession) -> Result<()> {
        let mut slot = self
            .session
            .lock()
            .map_err(|_| anyhow!("Session store lock poisoned"))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<UserSession>> {
        let slot = self
            .session
            .lock()
            .map_err(|_| anyhow!("Session store lock poisoned"))?;
        Ok(slot.clone())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .session
            .lock()
            .map_err(|_| anyhow!("Session store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// Session kept as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &UserSession) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, body)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))
    }

    fn load(&self) -> Result<Option<UserSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        Ok(serde_json::from_str(&raw).ok())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file {}", self.path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(estatus: i64) -> LoginResponse {
        serde_json::from_value(json!({
            "idusuario": 42,
            "idacceso": "tok-123",
            "fotop": "foto.png",
            "estatus": estatus,
            "message": "ok",
            "msystem": ""
        }))
        .unwrap()
    }

    #[test]
    fn test_login_request_shape() {
        let request = LoginRequest {
            agente: "ana".to_string(),
            contrasena: "secreto".to_string(),
            idempresas: 0,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"agente": "ana", "contrasena": "secreto", "idempresas": 0})
        );
    }

    #[test]
    fn test_login_response_status() {
        assert!(response(200).is_success());
        assert!(!response(401).is_success());

        let partial: LoginResponse =
            serde_json::from_value(json!({"estatus": 500, "message": "Credenciales invalidas"}))
                .unwrap();
        assert!(!partial.is_success());
        assert_eq!(partial.idacceso, "");
    }

    #[test]
    fn test_session_uses_camel_case_flag() {
        let session = UserSession::from_login(&response(200));
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["isAuthenticated"], true);
        assert_eq!(value["idusuario"], 42);
    }

    #[test]
    fn test_login_url_joins_base() {
        let client = CredentialClient::new(CredentialClientConfig {
            base_url: "https://auth.example.com/api".to_string(),
            company_id: 0,
        })
        .unwrap();
        assert_eq!(
            client.login_url().unwrap().as_str(),
            "https://auth.example.com/api/Eventos/Login"
        );
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let result = CredentialClient::new(CredentialClientConfig {
            base_url: "ftp://auth.example.com".to_string(),
            company_id: 0,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert!(!store.is_authenticated());
        store.save(&UserSession::from_login(&response(200))).unwrap();
        assert!(store.is_authenticated());
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_tolerates_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session").join("user.json"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&UserSession::from_login(&response(200))).unwrap();
        assert!(store.is_authenticated());

        fs::write(dir.path().join("session").join("user.json"), "{broken").unwrap();
        assert_eq!(store.load().unwrap(), None);
        assert!(!store.is_authenticated());

        store.clear().unwrap();
        store.clear().unwrap();
    }
}
