//! Persisted session state (cookies + per-origin local storage).
//!
//! The JSON layout matches the storage-state files browser automation
//! tools exchange: `{ cookies: [...], origins: [{ origin, localStorage }] }`.

use crate::messages;
use crate::result::{SiteError, SiteResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Account role a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Administrator
    Admin,
    /// Regular test user
    TestUser,
}

impl Role {
    /// Every role, admin first
    pub const ALL: [Self; 2] = [Self::Admin, Self::TestUser];

    /// Name used in logs and CLI flags
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::TestUser => "test-user",
        }
    }

    /// Session file name for this role
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Admin => "admin.json",
            Self::TestUser => "testuser.json",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cookie same-site policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// Strict
    Strict,
    /// Lax
    Lax,
    /// None
    None,
}

/// Cookie as stored in a session file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Name
    pub name: String,
    /// Value
    pub value: String,
    /// Domain
    pub domain: String,
    /// Path
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Expiry as unix seconds, `-1` for session cookies
    #[serde(default = "default_expires")]
    pub expires: f64,
    /// HttpOnly flag
    #[serde(default)]
    pub http_only: bool,
    /// Secure flag
    #[serde(default)]
    pub secure: bool,
    /// SameSite policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<SameSite>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

const fn default_expires() -> f64 {
    -1.0
}

impl Cookie {
    /// Session cookie for `domain` on path `/`
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_cookie_path(),
            expires: default_expires(),
            http_only: true,
            secure: false,
            same_site: Some(SameSite::Lax),
        }
    }
}

/// One local storage entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStorageItem {
    /// Key
    pub name: String,
    /// Value
    pub value: String,
}

/// Local storage captured for one origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    /// Origin, e.g. `http://localhost:3000`
    pub origin: String,
    /// Storage entries
    #[serde(default)]
    pub local_storage: Vec<LocalStorageItem>,
}

/// Serialized browser session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    /// Cookies
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Per-origin local storage
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

impl StorageState {
    /// A state is only usable when it carries both cookies and origins
    pub fn validate_structure(&self) -> SiteResult<()> {
        if self.cookies.is_empty() || self.origins.is_empty() {
            return Err(SiteError::session(format!(
                "{} (cookies: {}, origins: {})",
                messages::EMPTY_AUTH_STATE,
                self.cookies.len(),
                self.origins.len()
            )));
        }
        Ok(())
    }

    /// Parse a session document
    pub fn from_json(raw: &str) -> SiteResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SiteError::session(format!("{}: {e}", messages::INVALID_AUTH_FILE_FORMAT)))
    }

    /// Read a session file, distinguishing "missing" from "malformed"
    pub fn load(path: &Path) -> SiteResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SiteError::session(format!(
                    "{}: {}",
                    messages::AUTH_FILE_NOT_FOUND,
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&raw)
    }

    /// Write the state atomically: readers never observe a partial file
    pub fn save(&self, path: &Path) -> SiteResult<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".to_string());
        let tmp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));
        {
            let mut file = std::fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut file, self)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
        }
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Cookie by name
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Local storage value for `origin` and `key`
    #[must_use]
    pub fn local_storage(&self, origin: &str, key: &str) -> Option<&str> {
        self.origins
            .iter()
            .find(|o| o.origin == origin)?
            .local_storage
            .iter()
            .find(|item| item.name == key)
            .map(|item| item.value.as_str())
    }
}

/// Directory of per-role session files.
///
/// Written once by the setup phase, read-only afterwards.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Session file path for a role
    #[must_use]
    pub fn path_for(&self, role: Role) -> PathBuf {
        self.dir.join(role.file_name())
    }

    /// Create the directory if missing. Safe to call repeatedly.
    pub fn ensure_dir(&self) -> SiteResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Whether a session file exists for the role
    #[must_use]
    pub fn exists(&self, role: Role) -> bool {
        self.path_for(role).is_file()
    }

    /// Load and structurally validate a role's session
    pub fn load(&self, role: Role) -> SiteResult<StorageState> {
        let state = StorageState::load(&self.path_for(role))?;
        state.validate_structure()?;
        Ok(state)
    }

    /// Persist a role's session
    pub fn save(&self, role: Role, state: &StorageState) -> SiteResult<PathBuf> {
        let path = self.path_for(role);
        state.save(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_state() -> StorageState {
        StorageState {
            cookies: vec![Cookie::new("session", "tok-1", "localhost")],
            origins: vec![OriginState {
                origin: "http://localhost:3000".to_string(),
                local_storage: vec![LocalStorageItem {
                    name: "auth_token".to_string(),
                    value: "tok-1".to_string(),
                }],
            }],
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_json_uses_storage_state_layout() {
            let json = serde_json::to_value(sample_state()).unwrap();
            assert!(json["cookies"][0]["httpOnly"].as_bool().unwrap());
            assert_eq!(json["cookies"][0]["sameSite"], "Lax");
            assert_eq!(json["origins"][0]["localStorage"][0]["name"], "auth_token");
        }

        #[test]
        fn test_parses_minimal_cookie() {
            let raw = r#"{"cookies":[{"name":"s","value":"v","domain":"d"}],"origins":[]}"#;
            let state = StorageState::from_json(raw).unwrap();
            assert_eq!(state.cookies[0].path, "/");
            assert!((state.cookies[0].expires + 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_garbage_is_invalid_format() {
            let err = StorageState::from_json("not json").unwrap_err();
            assert!(err.to_string().contains(messages::INVALID_AUTH_FILE_FORMAT));
        }

        #[test]
        fn test_lookup_helpers() {
            let state = sample_state();
            assert_eq!(state.cookie("session").unwrap().value, "tok-1");
            assert_eq!(
                state.local_storage("http://localhost:3000", "auth_token"),
                Some("tok-1")
            );
            assert_eq!(state.local_storage("http://other", "auth_token"), None);
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_empty_cookies_and_origins_rejected() {
            let state = StorageState::from_json(r#"{"cookies":[],"origins":[]}"#).unwrap();
            let err = state.validate_structure().unwrap_err();
            assert!(matches!(err, SiteError::SessionInvalid { .. }));
        }

        #[test]
        fn test_missing_keys_rejected() {
            let state = StorageState::from_json("{}").unwrap();
            assert!(state.validate_structure().is_err());
        }

        #[test]
        fn test_cookies_without_origins_rejected() {
            let mut state = sample_state();
            state.origins.clear();
            assert!(state.validate_structure().is_err());
        }

        #[test]
        fn test_complete_state_accepted() {
            assert!(sample_state().validate_structure().is_ok());
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn test_role_file_names() {
            let store = SessionStore::new("/tmp/auth");
            assert!(store.path_for(Role::Admin).ends_with("admin.json"));
            assert!(store.path_for(Role::TestUser).ends_with("testuser.json"));
        }

        #[test]
        fn test_ensure_dir_is_idempotent() {
            let tmp = TempDir::new().unwrap();
            let store = SessionStore::new(tmp.path().join("e2e/.auth"));
            store.ensure_dir().unwrap();
            store.ensure_dir().unwrap();
            let entries: Vec<_> = std::fs::read_dir(tmp.path().join("e2e")).unwrap().collect();
            assert_eq!(entries.len(), 1);
            assert!(store.dir().is_dir());
        }

        #[test]
        fn test_save_then_load() {
            let tmp = TempDir::new().unwrap();
            let store = SessionStore::new(tmp.path());
            let path = store.save(Role::Admin, &sample_state()).unwrap();
            assert!(path.is_file());
            assert_eq!(store.load(Role::Admin).unwrap(), sample_state());
        }

        #[test]
        fn test_save_leaves_no_temp_files() {
            let tmp = TempDir::new().unwrap();
            let store = SessionStore::new(tmp.path());
            store.save(Role::Admin, &sample_state()).unwrap();
            store.save(Role::Admin, &sample_state()).unwrap();
            let names: Vec<String> = std::fs::read_dir(tmp.path())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            assert_eq!(names, ["admin.json"]);
        }

        #[test]
        fn test_load_missing_file() {
            let tmp = TempDir::new().unwrap();
            let err = SessionStore::new(tmp.path()).load(Role::TestUser).unwrap_err();
            assert!(err.to_string().contains(messages::AUTH_FILE_NOT_FOUND));
        }

        #[test]
        fn test_load_rejects_empty_state_on_disk() {
            let tmp = TempDir::new().unwrap();
            std::fs::write(tmp.path().join("admin.json"), r#"{"cookies":[],"origins":[]}"#)
                .unwrap();
            let err = SessionStore::new(tmp.path()).load(Role::Admin).unwrap_err();
            assert!(err.to_string().contains(messages::EMPTY_AUTH_STATE));
        }
    }
}
