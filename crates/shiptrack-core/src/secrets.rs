//! Credential stores
//!
//! Tokens are read on every call and never cached. Nothing here logs a
//! credential value.

use crate::error::{Error, Result};
use crate::traits::SecretStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variables consulted for the `github` key, in order
const GITHUB_TOKEN_VARS: [&str; 2] = ["SHIPTRACK_GITHUB_TOKEN", "GITHUB_TOKEN"];

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(Error::Secret(format!("invalid secret key '{}'", key)))
    }
}

/// One file per key under a private directory
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `{config_dir}/shiptrack/secrets`
    pub fn default_location() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Secret("no per-user config directory".to_string()))?;
        Ok(Self::new(base.join("shiptrack").join("secrets")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.token", key)))
    }
}

impl SecretStore for FileSecretStore {
    fn load_token(&self, key: &str) -> Result<String> {
        let path = self.path_for(key)?;
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            Error::Secret(format!("cannot read secret '{}': {}", key, e))
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(Error::Secret(format!("secret '{}' is empty", key)));
        }
        Ok(token.to_string())
    }

    fn save_token(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::Secret(format!("cannot create {}: {}", self.dir.display(), e)))?;
        std::fs::write(&path, value.trim())
            .map_err(|e| Error::Secret(format!("cannot write secret '{}': {}", key, e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| Error::Secret(format!("cannot restrict '{}': {}", key, e)))?;
        }
        Ok(())
    }
}

/// Read-only store backed by environment variables.
///
/// `github` maps to `SHIPTRACK_GITHUB_TOKEN`, then `GITHUB_TOKEN`; any other
/// key maps to `SHIPTRACK_{KEY}_TOKEN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    fn variables(key: &str) -> Vec<String> {
        if key == "github" {
            GITHUB_TOKEN_VARS.iter().map(|v| v.to_string()).collect()
        } else {
            vec![format!(
                "SHIPTRACK_{}_TOKEN",
                key.to_ascii_uppercase().replace('-', "_")
            )]
        }
    }
}

impl SecretStore for EnvSecretStore {
    fn load_token(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Self::variables(key)
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .ok_or_else(|| Error::Secret(format!("no environment credential for '{}'", key)))
    }

    fn save_token(&self, key: &str, _value: &str) -> Result<()> {
        Err(Error::Secret(format!(
            "environment store is read-only; cannot save '{}'",
            key
        )))
    }
}

/// Tries each store in order on load; saves go to the last store
pub struct ChainedSecretStore {
    stores: Vec<Box<dyn SecretStore>>,
}

impl ChainedSecretStore {
    pub fn new(stores: Vec<Box<dyn SecretStore>>) -> Self {
        Self { stores }
    }

    /// Environment first, then the per-user file store
    pub fn user_default() -> Result<Self> {
        Ok(Self::new(vec![
            Box::new(EnvSecretStore),
            Box::new(FileSecretStore::default_location()?),
        ]))
    }
}

impl SecretStore for ChainedSecretStore {
    fn load_token(&self, key: &str) -> Result<String> {
        let mut last_err = None;
        for store in &self.stores {
            match store.load_token(key) {
                Ok(token) => return Ok(token),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Secret(format!("no store holds '{}'", key))))
    }

    fn save_token(&self, key: &str, value: &str) -> Result<()> {
        match self.stores.last() {
            Some(store) => store.save_token(key, value),
            None => Err(Error::Secret("no writable secret store".to_string())),
        }
    }
}

/// In-memory store for embedding and tests
#[derive(Default)]
pub struct StaticSecretStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl std::fmt::Debug for StaticSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.tokens.read().keys().cloned().collect();
        f.debug_struct("StaticSecretStore")
            .field("keys", &keys)
            .finish()
    }
}

impl StaticSecretStore {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::default();
        store.tokens.write().insert(key.into(), value.into());
        store
    }
}

impl SecretStore for StaticSecretStore {
    fn load_token(&self, key: &str) -> Result<String> {
        self.tokens
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Secret(format!("no credential for '{}'", key)))
    }

    fn save_token(&self, key: &str, value: &str) -> Result<()> {
        self.tokens.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_roundtrip_trims() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::new(dir.path().join("secrets"));

        store.save_token("github", "  ghp_abc\n").unwrap();
        assert_eq!(store.load_token("github").unwrap(), "ghp_abc");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::new(dir.path());
        store.save_token("deploy", "k").unwrap();

        let mode = std::fs::metadata(dir.path().join("deploy.token"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::new(dir.path());
        let err = store.save_token("../escape", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Secret);
    }

    #[test]
    fn test_file_store_missing_key() {
        let dir = TempDir::new().unwrap();
        let store = FileSecretStore::new(dir.path());
        assert!(store.load_token("github").is_err());
    }

    #[test]
    fn test_env_variable_names() {
        assert_eq!(
            EnvSecretStore::variables("github"),
            vec!["SHIPTRACK_GITHUB_TOKEN", "GITHUB_TOKEN"]
        );
        assert_eq!(
            EnvSecretStore::variables("deploy-api"),
            vec!["SHIPTRACK_DEPLOY_API_TOKEN"]
        );
    }

    #[test]
    fn test_env_store_is_read_only() {
        assert!(EnvSecretStore.save_token("github", "x").is_err());
    }

    #[test]
    fn test_chain_falls_through_and_saves_last() {
        let dir = TempDir::new().unwrap();
        let chain = ChainedSecretStore::new(vec![
            Box::new(StaticSecretStore::new("deploy", "from-static")),
            Box::new(FileSecretStore::new(dir.path())),
        ]);

        assert_eq!(chain.load_token("deploy").unwrap(), "from-static");
        chain.save_token("github", "from-file").unwrap();
        assert_eq!(chain.load_token("github").unwrap(), "from-file");
        assert!(chain.load_token("other").is_err());
    }

    #[test]
    fn test_static_store_overwrites_and_hides_values() {
        let store = StaticSecretStore::new("github", "ghp_first");
        store.save_token("github", "ghp_second").unwrap();
        assert_eq!(store.load_token("github").unwrap(), "ghp_second");

        let debug_output = format!("{:?}", store);
        assert!(debug_output.contains("github"));
        assert!(!debug_output.contains("ghp_"));
    }
}
