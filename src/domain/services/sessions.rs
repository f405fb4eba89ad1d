#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;

use std::io;
use std::path;

use serde::Serialize;
use thiserror::Error;
use tokio::fs;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Message;

const EXTENSION: &str = ".json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No session found named {0}")]
    NotFound(String),

    #[error("Session {name} is not a valid chat transcript: {source}")]
    CorruptData {
        name: String,
        source: serde_json::Error,
    },

    #[error("{0:?} is not a valid session name")]
    InvalidName(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Chat transcripts stored as one JSON document per session, named by the
/// title the user picked.
pub struct Sessions {
    pub cache_dir: path::PathBuf,
}

impl Default for Sessions {
    fn default() -> Sessions {
        return Sessions::new(path::PathBuf::from(Config::get(ConfigKey::SessionsDir)));
    }
}

impl Sessions {
    pub fn new(cache_dir: path::PathBuf) -> Sessions {
        return Sessions { cache_dir };
    }

    /// Strips the reserved extension from a file name, if present.
    pub fn display_name(file_name: &str) -> String {
        return file_name
            .strip_suffix(EXTENSION)
            .unwrap_or(file_name)
            .to_string();
    }

    /// Normalizes a session name to the file name it is stored under.
    pub fn file_name(name: &str) -> Result<String, StoreError> {
        let name = name.trim();
        let stem = Sessions::display_name(name);
        if stem.is_empty()
            || stem == "."
            || stem == ".."
            || stem.contains(['/', '\\', '\0'])
        {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        return Ok(format!("{stem}{EXTENSION}"));
    }

    fn get_file_path(&self, name: &str) -> Result<path::PathBuf, StoreError> {
        return Ok(self.cache_dir.join(Sessions::file_name(name)?));
    }

    /// Returns the names of all stored sessions, sorted, without extension.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = vec![];
        if !self.cache_dir.exists() {
            return Ok(names);
        }

        let mut dir = fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.ends_with(EXTENSION) {
                names.push(Sessions::display_name(&file_name));
            }
        }

        names.sort();

        return Ok(names);
    }

    pub async fn load(&self, name: &str) -> Result<Vec<Message>, StoreError> {
        let file_path = self.get_file_path(name)?;
        if !file_path.exists() {
            return Err(StoreError::NotFound(Sessions::display_name(name.trim())));
        }

        let payload = fs::read_to_string(file_path).await?;
        let messages: Vec<Message> =
            serde_json::from_str(&payload).map_err(|source| {
                return StoreError::CorruptData {
                    name: Sessions::display_name(name.trim()),
                    source,
                };
            })?;

        return Ok(messages);
    }

    /// Writes the whole transcript, replacing any previous file. The payload
    /// lands in a sibling temporary file first so readers never observe a
    /// partial write.
    pub async fn save(&self, name: &str, messages: &[Message]) -> Result<String, StoreError> {
        let file_name = Sessions::file_name(name)?;
        let file_path = self.cache_dir.join(&file_name);

        let mut payload = vec![];
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut payload, formatter);
        messages.serialize(&mut serializer)?;

        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir).await?;
        }

        let temp_path = self.cache_dir.join(format!(".{file_name}.tmp"));
        fs::write(&temp_path, payload).await?;
        fs::rename(&temp_path, &file_path).await?;

        tracing::debug!(file = %file_name, messages = messages.len(), "Saved session");

        return Ok(file_name);
    }

    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let file_path = self.get_file_path(name)?;
        if !file_path.exists() {
            return Ok(());
        }

        fs::remove_file(file_path).await?;
        return Ok(());
    }

    pub async fn delete_all(&self) -> Result<(), StoreError> {
        if !self.cache_dir.exists() {
            return Ok(());
        }

        for name in self.list().await? {
            self.delete(&name).await?;
        }

        return Ok(());
    }

    /// Moves a transcript to a new name in a single filesystem rename, so a
    /// crash leaves exactly one of the two files behind. An existing
    /// transcript under the new name is replaced.
    pub async fn rename(&self, old: &str, new: &str) -> Result<String, StoreError> {
        let old_path = self.get_file_path(old)?;
        let new_file_name = Sessions::file_name(new)?;
        if !old_path.exists() {
            return Err(StoreError::NotFound(Sessions::display_name(old.trim())));
        }

        let new_path = self.cache_dir.join(&new_file_name);
        if old_path != new_path {
            fs::rename(&old_path, &new_path).await?;
        }

        return Ok(new_file_name);
    }
}
