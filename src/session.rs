//! Session token and its client-side persistence.
//!
//! The token is the only state the storefront persists. It lives under the
//! single key `token` of a small JSON document.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TOKEN_KEY: &str = "token";

/// Opaque bearer credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("SessionToken(..)") }
}

/// A logged-in shopper: the token plus the identity it carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    token: SessionToken,
    user_id: Option<String>,
}

impl Session {
    pub fn new(token: SessionToken) -> Self {
        let user_id = decode_user_id(token.as_str());
        Self { token, user_id }
    }

    pub fn token(&self) -> &SessionToken { &self.token }
    pub fn user_id(&self) -> Option<&str> { self.user_id.as_deref() }
}

#[derive(Deserialize)]
struct Claims {
    #[serde(alias = "_id", alias = "sub")]
    id: Option<serde_json::Value>,
}

/// Reads the `id` claim from a JWT payload. The signature is the backend's
/// business; an undecodable token simply has no identity.
fn decode_user_id(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    match claims.id? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("no data directory available for the session file")]
    NoDataDir,

    #[error("session file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub trait TokenStore: Send + Sync + fmt::Debug {
    fn load(&self) -> Result<Option<SessionToken>, SessionStoreError>;
    fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Token kept in a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    /// `<data dir>/storefront/session.json`
    pub fn default_path() -> Result<PathBuf, SessionStoreError> {
        dirs::data_dir().map(|d| d.join("storefront").join("session.json")).ok_or(SessionStoreError::NoDataDir)
    }

    pub fn path(&self) -> &Path { &self.path }

    fn read_document(&self) -> Result<BTreeMap<String, String>, SessionStoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, doc: &BTreeMap<String, String>) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(doc)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<SessionToken>, SessionStoreError> {
        Ok(self.read_document()?.remove(TOKEN_KEY).filter(|t| !t.is_empty()).map(SessionToken::new))
    }

    fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        let mut doc = self.read_document()?;
        doc.insert(TOKEN_KEY.to_string(), token.as_str().to_string());
        self.write_document(&doc)
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        let mut doc = self.read_document()?;
        if doc.remove(TOKEN_KEY).is_some() {
            self.write_document(&doc)?;
        }
        Ok(())
    }
}

/// In-process store for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<SessionToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self { Self::default() }
    pub fn with_token(token: SessionToken) -> Self { Self { token: Mutex::new(Some(token)) } }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SessionToken>, SessionStoreError> { Ok(self.token.lock().clone()) }
    fn save(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        *self.token.lock() = Some(token.clone());
        Ok(())
    }
    fn clear(&self) -> Result<(), SessionStoreError> {
        *self.token.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(claims: &str) -> String {
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", URL_SAFE_NO_PAD.encode(claims))
    }

    #[test]
    fn test_user_id_from_token() {
        let session = Session::new(SessionToken::new(jwt(r#"{"id":"u-42","iat":1}"#)));
        assert_eq!(session.user_id(), Some("u-42"));
    }

    #[test]
    fn test_opaque_token_has_no_identity() {
        assert_eq!(Session::new(SessionToken::new("opaque")).user_id(), None);
        assert_eq!(Session::new(SessionToken::new("a.!!!.c")).user_id(), None);
    }

    #[test]
    fn test_debug_hides_token() {
        assert!(!format!("{:?}", SessionToken::new("secret")).contains("secret"));
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("session.json"));
        assert_eq!(store.load().unwrap(), None);
        store.save(&SessionToken::new("abc")).unwrap();
        assert_eq!(store.load().unwrap(), Some(SessionToken::new("abc")));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"theme":"dark","token":"abc"}"#).unwrap();
        let store = FileTokenStore::new(&path);
        store.clear().unwrap();
        let doc: BTreeMap<String, String> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc.get("theme").map(String::as_str), Some("dark"));
        assert!(!doc.contains_key("token"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(FileTokenStore::new(&path).load(), Err(SessionStoreError::Corrupt(_))));
    }
}
