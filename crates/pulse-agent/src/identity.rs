//! Persistent agent identity.
//!
//! The id survives restarts so the dashboard keeps one entry per machine.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

/// File name of the id file in the user's home directory.
pub const ID_FILE_NAME: &str = ".pulse-agent-id";

/// `~/.pulse-agent-id`, if a home directory is known.
#[must_use]
pub fn default_id_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(ID_FILE_NAME))
}

/// Read the id stored at `path`, or generate and store a new one.
///
/// Storing is best effort: an unwritable path still yields a usable id for
/// this run, it just will not survive a restart.
pub fn load_or_create_id(path: Option<&Path>) -> String {
    if let Some(id) = path.and_then(read_id) {
        return id;
    }

    let id = Uuid::new_v4().simple().to_string();
    match path {
        Some(path) => match write_id(path, &id) {
            Ok(()) => info!(path = %path.display(), "generated new agent id"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to save agent id"),
        },
        None => warn!("no home directory, agent id will not persist"),
    }
    id
}

fn read_id(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let id = content.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn write_id(path: &Path, id: &str) -> std::io::Result<()> {
    std::fs::write(path, id)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
