//! Durable extension storage and the sign-in handoff slot.
//!
//! Both are small JSON key/value files. The extension store has a fixed
//! set of typed keys, and each key may only be written by the contexts
//! that own it.

use crate::auth::AuthToken;
use crate::error::StoreError;
use crate::record::MangaRecord;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const STORE_FILENAME: &str = "storage.json";
const HANDOFF_FILENAME: &str = "handoff.json";

/// Handoff slot key holding the freshly issued token.
pub const HANDOFF_TOKEN_KEY: &str = "thelibExtensionToken";
/// Handoff slot key set to "true" once the token is ready.
pub const HANDOFF_READY_KEY: &str = "thelibExtensionAuth";

/// A JSON object on disk, read and rewritten as a whole.
#[derive(Debug)]
struct JsonFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(key))
    }

    async fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        f(&mut map);
        self.write_map(&map).await
    }
}

/// The context performing a store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Background,
    Popup,
    Content,
}

impl StoreScope {
    pub fn name(self) -> &'static str {
        match self {
            StoreScope::Background => "background",
            StoreScope::Popup => "popup",
            StoreScope::Content => "content",
        }
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keys of the extension store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKey {
    AuthToken,
    ServerUrl,
    PendingManga,
}

impl StoreKey {
    /// Name of the key in the store file.
    pub fn name(self) -> &'static str {
        match self {
            StoreKey::AuthToken => "thelibAuthToken",
            StoreKey::ServerUrl => "thelibServerUrl",
            StoreKey::PendingManga => "pendingManga",
        }
    }

    /// Contexts allowed to set or remove this key.
    pub fn writers(self) -> &'static [StoreScope] {
        match self {
            StoreKey::AuthToken => &[StoreScope::Background],
            StoreKey::ServerUrl => &[StoreScope::Popup],
            StoreKey::PendingManga => &[StoreScope::Background, StoreScope::Popup],
        }
    }
}

/// Durable key/value storage shared by every context.
#[derive(Debug)]
pub struct ExtensionStore {
    file: JsonFile,
}

impl ExtensionStore {
    /// Opens (or lazily creates) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            file: JsonFile::new(path.into()),
        })
    }

    /// Opens the store file inside `dir`.
    pub fn in_dir(dir: &Path) -> Arc<Self> {
        Self::open(dir.join(STORE_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Returns a handle that performs operations as `scope`.
    pub fn scoped(self: &Arc<Self>, scope: StoreScope) -> ScopedStore {
        ScopedStore {
            store: Arc::clone(self),
            scope,
        }
    }
}

/// Store access on behalf of one context.
#[derive(Debug, Clone)]
pub struct ScopedStore {
    store: Arc<ExtensionStore>,
    scope: StoreScope,
}

impl ScopedStore {
    pub fn scope(&self) -> StoreScope {
        self.scope
    }

    fn check_write(&self, key: StoreKey) -> Result<(), StoreError> {
        if key.writers().contains(&self.scope) {
            Ok(())
        } else {
            Err(StoreError::WriteDenied {
                key: key.name(),
                context: self.scope.name(),
            })
        }
    }

    async fn get_string(&self, key: StoreKey) -> Result<Option<String>, StoreError> {
        Ok(self
            .store
            .file
            .get(key.name())
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty()))
    }

    async fn set(&self, key: StoreKey, value: Value) -> Result<(), StoreError> {
        self.check_write(key)?;
        self.store.file.update(|map| {
            map.insert(key.name().to_string(), value);
        })
        .await
    }

    async fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        self.check_write(key)?;
        self.store.file.update(|map| {
            map.remove(key.name());
        })
        .await
    }

    pub async fn auth_token(&self) -> Result<Option<AuthToken>, StoreError> {
        Ok(self
            .get_string(StoreKey::AuthToken)
            .await?
            .map(AuthToken::new))
    }

    pub async fn set_auth_token(&self, token: &AuthToken) -> Result<(), StoreError> {
        self.set(StoreKey::AuthToken, Value::String(token.as_str().to_string()))
            .await
    }

    pub async fn clear_auth_token(&self) -> Result<(), StoreError> {
        self.remove(StoreKey::AuthToken).await
    }

    pub async fn server_url(&self) -> Result<Option<String>, StoreError> {
        self.get_string(StoreKey::ServerUrl).await
    }

    pub async fn set_server_url(&self, url: &str) -> Result<(), StoreError> {
        self.set(StoreKey::ServerUrl, Value::String(url.to_string()))
            .await
    }

    /// The pending record, if one is cached and readable.
    pub async fn pending_manga(&self) -> Result<Option<MangaRecord>, StoreError> {
        match self.store.file.get(StoreKey::PendingManga.name()).await? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    pub async fn set_pending_manga(&self, record: &MangaRecord) -> Result<(), StoreError> {
        self.set(StoreKey::PendingManga, serde_json::to_value(record)?)
            .await
    }

    pub async fn clear_pending_manga(&self) -> Result<(), StoreError> {
        self.remove(StoreKey::PendingManga).await
    }
}

/// Page-local slot the host application's token page writes into.
#[derive(Debug)]
pub struct HandoffSlot {
    file: JsonFile,
}

impl HandoffSlot {
    pub fn open(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            file: JsonFile::new(path.into()),
        })
    }

    pub fn in_dir(dir: &Path) -> Arc<Self> {
        Self::open(dir.join(HANDOFF_FILENAME))
    }

    /// Writes a token and raises the ready flag, as the token page does.
    pub async fn deposit(&self, token: &AuthToken) -> Result<(), StoreError> {
        self.file
            .update(|map| {
                map.insert(
                    HANDOFF_TOKEN_KEY.to_string(),
                    Value::String(token.as_str().to_string()),
                );
                map.insert(HANDOFF_READY_KEY.to_string(), Value::String("true".to_string()));
            })
            .await
    }

    /// The deposited token, once the ready flag is "true".
    pub async fn ready_token(&self) -> Result<Option<AuthToken>, StoreError> {
        let ready = self
            .file
            .get(HANDOFF_READY_KEY)
            .await?
            .is_some_and(|v| v.as_str() == Some("true"));
        if !ready {
            return Ok(None);
        }
        Ok(self
            .file
            .get(HANDOFF_TOKEN_KEY)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|t| !t.is_empty())
            .map(AuthToken::new))
    }

    /// Removes both keys.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.file
            .update(|map| {
                map.remove(HANDOFF_TOKEN_KEY);
                map.remove(HANDOFF_READY_KEY);
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> MangaRecord {
        let url = url::Url::parse("https://mangadex.org/title/x").unwrap();
        MangaRecord::from_tab("Vagabond - MangaDex", &url)
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ExtensionStore::in_dir(dir.path());
        let background = store.scoped(StoreScope::Background);

        assert!(background.auth_token().await.unwrap().is_none());
        background.set_auth_token(&AuthToken::new("tok-1")).await.unwrap();

        let popup = store.scoped(StoreScope::Popup);
        assert_eq!(popup.auth_token().await.unwrap(), Some(AuthToken::new("tok-1")));

        background.clear_auth_token().await.unwrap();
        assert!(popup.auth_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_scoping() {
        let dir = TempDir::new().unwrap();
        let store = ExtensionStore::in_dir(dir.path());

        let content = store.scoped(StoreScope::Content);
        assert!(matches!(
            content.set_auth_token(&AuthToken::new("x")).await,
            Err(StoreError::WriteDenied { .. })
        ));
        assert!(content.set_pending_manga(&record()).await.is_err());

        let popup = store.scoped(StoreScope::Popup);
        assert!(popup.set_auth_token(&AuthToken::new("x")).await.is_err());
        popup.set_server_url("http://localhost:3000").await.unwrap();

        let background = store.scoped(StoreScope::Background);
        assert!(background.set_server_url("http://evil.example").await.is_err());
        assert_eq!(
            background.server_url().await.unwrap().as_deref(),
            Some("http://localhost:3000")
        );
    }

    #[tokio::test]
    async fn test_pending_manga() {
        let dir = TempDir::new().unwrap();
        let store = ExtensionStore::in_dir(dir.path());
        let background = store.scoped(StoreScope::Background);
        let popup = store.scoped(StoreScope::Popup);

        background.set_pending_manga(&record()).await.unwrap();
        assert_eq!(popup.pending_manga().await.unwrap(), Some(record()));

        popup.clear_pending_manga().await.unwrap();
        assert!(background.pending_manga().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_share_one_file() {
        let dir = TempDir::new().unwrap();
        let store = ExtensionStore::in_dir(dir.path());
        store
            .scoped(StoreScope::Background)
            .set_auth_token(&AuthToken::new("tok"))
            .await
            .unwrap();
        store
            .scoped(StoreScope::Popup)
            .set_server_url("https://thelib.vercel.app")
            .await
            .unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["thelibAuthToken"], "tok");
        assert_eq!(json["thelibServerUrl"], "https://thelib.vercel.app");
    }

    #[tokio::test]
    async fn test_corrupt_store_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = ExtensionStore::in_dir(dir.path());
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(
            store.scoped(StoreScope::Popup).auth_token().await,
            Err(StoreError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_handoff_slot() {
        let dir = TempDir::new().unwrap();
        let slot = HandoffSlot::in_dir(dir.path());

        assert!(slot.ready_token().await.unwrap().is_none());
        slot.deposit(&AuthToken::new("fresh")).await.unwrap();
        assert_eq!(slot.ready_token().await.unwrap(), Some(AuthToken::new("fresh")));

        slot.clear().await.unwrap();
        assert!(slot.ready_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handoff_requires_ready_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("handoff.json");
        std::fs::write(&path, r#"{"thelibExtensionToken":"half-written"}"#).unwrap();

        let slot = HandoffSlot::open(&path);
        assert!(slot.ready_token().await.unwrap().is_none());
    }
}
