//! Local-directory artifact storage.
//!
//! ## `upload` protocol
//!
//! 1. Reject names that could escape the root (`/`, `\`, `..`, empty).
//! 2. Ensure the root directory exists.
//! 3. Write bytes to `<root>/<name>.fluxport.tmp`.
//! 4. Rename to `<root>/<name>` (atomic on POSIX).
//! 5. Return `url_prefix + name`.

use std::path::{Path, PathBuf};

use fluxport_core::{BlobError, BlobStore};

use crate::error::blob_io_err;

/// [`BlobStore`] writing artifacts into one directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalBlobStore {
    /// Store under `root`, handing out `file://<root>/<name>` URLs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let url_prefix = default_url_prefix(&root);
        Self { root, url_prefix }
    }

    pub fn with_url_prefix(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Map a URL handed out by this store back to its file.
    pub fn path_for_url(&self, url: &str) -> Result<PathBuf, BlobError> {
        let name = url
            .strip_prefix(&self.url_prefix)
            .ok_or_else(|| BlobError::ForeignUrl(url.to_owned()))?;
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

/// `file://` URL prefix for a directory, always ending in `/`.
pub fn default_url_prefix(root: &Path) -> String {
    let mut prefix = format!("file://{}", root.display());
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    prefix
}

fn validate_name(name: &str) -> Result<(), BlobError> {
    let bad = name.is_empty()
        || name == "."
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..");
    if bad {
        return Err(BlobError::InvalidName(name.to_owned()));
    }
    Ok(())
}

impl BlobStore for LocalBlobStore {
    fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<String, BlobError> {
        validate_name(file_name)?;
        std::fs::create_dir_all(&self.root).map_err(|e| blob_io_err(&self.root, e))?;

        let path = self.root.join(file_name);
        let tmp = self.root.join(format!("{file_name}.fluxport.tmp"));
        std::fs::write(&tmp, bytes).map_err(|e| blob_io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(blob_io_err(&path, e));
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact stored");
        Ok(format!("{}{}", self.url_prefix, file_name))
    }

    fn delete(&self, url: &str) {
        let result = self
            .path_for_url(url)
            .and_then(|path| std::fs::remove_file(&path).map_err(|e| blob_io_err(&path, e)));
        if let Err(err) = result {
            tracing::warn!(%url, "artifact delete failed: {err}");
        }
    }
}
