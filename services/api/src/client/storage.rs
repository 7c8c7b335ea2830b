//! services/api/src/client/storage.rs
//!
//! Persists the signed-in user and their token as a small JSON file.

use nexus_chat_core::ports::{PortError, PortResult};
use nexus_chat_core::session::{SessionStorage, SessionUser, StoredSession};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct SessionFile {
    token: String,
    user: UserRecord,
}

#[derive(Serialize, Deserialize)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
}

impl From<&StoredSession> for SessionFile {
    fn from(session: &StoredSession) -> Self {
        Self {
            token: session.token.clone(),
            user: UserRecord {
                id: session.user.id,
                username: session.user.username.clone(),
                email: session.user.email.clone(),
            },
        }
    }
}

impl From<SessionFile> for StoredSession {
    fn from(file: SessionFile) -> Self {
        Self {
            token: file.token,
            user: SessionUser {
                id: file.user.id,
                username: file.user.username,
                email: file.user.email,
            },
        }
    }
}

pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStorage for FileSessionStorage {
    /// A missing file means nobody is signed in. A corrupt file is ignored.
    fn load(&self) -> PortResult<Option<StoredSession>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        match serde_json::from_slice::<SessionFile>(&raw) {
            Ok(file) => Ok(Some(file.into())),
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    fn save(&self, session: &StoredSession) -> PortResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        let json = serde_json::to_vec_pretty(&SessionFile::from(session))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        write_owner_only(&self.path, &json).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    fn clear(&self) -> PortResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

/// The file holds a bearer token, so on Unix only its owner may read it.
fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path)?;
    // `mode` only applies when the file is created.
    #[cfg(unix)]
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)
}
