//! File fields and the media storage that turns stored names into URLs

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

/// A stored file reference (image or generic file column)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldFile {
    pub name: String,
}

impl FieldFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Whether a file is attached
    pub fn has_file(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

impl From<&str> for FieldFile {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Media storage resolving file names against a base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStorage {
    base_url: String,
}

impl Default for MediaStorage {
    fn default() -> Self {
        Self::new("/media/")
    }
}

impl MediaStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public URL of a stored file.
    ///
    /// Fails when no file is attached or when the name is not a relative
    /// storage path.
    pub fn url(&self, file: &FieldFile) -> OrmResult<String> {
        if !file.has_file() {
            return Err(OrmError::File(
                "The file attribute has no file associated with it".to_string(),
            ));
        }

        let name = file.name.trim();
        if name.starts_with('/')
            || name.contains("://")
            || name.split('/').any(|segment| segment == "..")
        {
            return Err(OrmError::File(format!("Malformed file name '{}'", name)));
        }

        Ok(format!("{}{}", self.base_url, name))
    }

    /// Convert a URL (or a bare name) back into a storage name
    pub fn name_from_url(&self, url: &str) -> FieldFile {
        FieldFile::new(url.strip_prefix(self.base_url.as_str()).unwrap_or(url))
    }
}
