use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, StudioError};

/// Key under which the credential is persisted.
pub const CREDENTIAL_KEY: &str = "GEMINI_API_KEY";
/// Environment variable consulted when nothing is persisted.
pub const CREDENTIAL_ENV: &str = "API_KEY";

pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, credential: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FileCredentialStore
// ---------------------------------------------------------------------------

/// JSON object file holding [`CREDENTIAL_KEY`]. Other keys in the file are preserved.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/mascot-studio/credentials.json`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("mascot-studio").join("credentials.json"))
            .ok_or_else(|| StudioError::InvalidConfig("no user config directory".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StudioError::CredentialStore(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
            Err(e) => Err(StudioError::CredentialStore(format!(
                "{}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| StudioError::CredentialStore(e.to_string()))?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(content.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let map = self.read_map()?;
        Ok(map
            .get(CREDENTIAL_KEY)
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string))
    }

    fn save(&self, credential: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(CREDENTIAL_KEY.to_string(), Value::String(credential.to_string()));
        self.write_map(&map)?;
        debug!(path = %self.path.display(), "Credential saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(CREDENTIAL_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryCredentialStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            credential: Mutex::new(Some(credential.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, credential: &str) -> Result<()> {
        *self.credential.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(credential.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.credential.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CredentialGuard
// ---------------------------------------------------------------------------

/// Resolves the credential before any generation call: the store first,
/// then the environment fallback.
#[derive(Clone)]
pub struct CredentialGuard {
    store: Arc<dyn CredentialStore>,
    env_var: String,
}

impl CredentialGuard {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            env_var: CREDENTIAL_ENV.to_string(),
        }
    }

    pub fn with_env_var(mut self, env_var: impl Into<String>) -> Self {
        self.env_var = env_var.into();
        self
    }

    pub fn resolve(&self) -> Result<String> {
        if let Some(credential) = self.store.load()? {
            debug!(source = "store", "Credential resolved");
            return Ok(credential);
        }

        match std::env::var(&self.env_var) {
            Ok(credential) if !credential.trim().is_empty() => {
                debug!(source = "env", var = %self.env_var, "Credential resolved");
                Ok(credential)
            }
            _ => Err(StudioError::MissingCredential),
        }
    }

    pub fn needs_configuration(&self) -> bool {
        self.resolve().is_err()
    }
}
