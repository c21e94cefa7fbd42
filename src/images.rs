use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::graph::NodeId;
use crate::util::content_hash;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Upload {
    Stored(String),
    /// Identical content already exists for this node.
    Duplicate,
}

/// File storage behind a node's image list. The graph only ever sees the returned URIs.
pub trait ImageStore: Send + Sync {
    fn store(&self, node: NodeId, file_name: &str, bytes: &[u8]) -> Result<Upload>;
    fn delete(&self, uri: &str) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct DirImageStore {
    dir: PathBuf,
}

impl DirImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<node>_<hash>`, shared by every extension the same content may arrive with.
    fn stem_for(node: NodeId, bytes: &[u8]) -> String {
        format!("{node}_{}", content_hash(bytes))
    }

    fn file_name_for(node: NodeId, original: &str, bytes: &[u8]) -> String {
        let extension = Path::new(original)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "png".to_owned());
        format!("{}.{extension}", Self::stem_for(node, bytes))
    }

    /// Finds a stored file with this stem under any extension.
    fn find_stored(&self, stem: &str) -> Result<Option<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("failed to list image directory {}", self.dir.display())
                });
            }
        };

        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to list image directory {}", self.dir.display()))?;
            let path = entry.path();
            if path.file_stem().and_then(|found| found.to_str()) == Some(stem) {
                return Ok(path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned()));
            }
        }
        Ok(None)
    }

    fn uri_for(&self, file_name: &str) -> String {
        self.dir.join(file_name).to_string_lossy().replace('\\', "/")
    }
}

impl ImageStore for DirImageStore {
    fn store(&self, node: NodeId, file_name: &str, bytes: &[u8]) -> Result<Upload> {
        if let Some(existing) = self.find_stored(&Self::stem_for(node, bytes))? {
            debug!(node, file = %existing, "image already stored");
            return Ok(Upload::Duplicate);
        }

        let name = Self::file_name_for(node, file_name, bytes);
        let path = self.dir.join(&name);

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create image directory {}", self.dir.display()))?;
        fs::write(&path, bytes)
            .with_context(|| format!("failed to write image {}", path.display()))?;
        info!(node, file = %name, bytes = bytes.len(), "stored image");
        Ok(Upload::Stored(self.uri_for(&name)))
    }

    /// Removes the file behind a URI this store handed out. Only the file name is used, so a
    /// URI can never reach outside the image directory.
    fn delete(&self, uri: &str) -> Result<()> {
        let Some(file_name) = Path::new(uri).file_name() else {
            return Ok(());
        };
        let path = self.dir.join(file_name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(file = %path.display(), "deleted image");
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => {
                Err(error).with_context(|| format!("failed to delete image {}", path.display()))
            }
        }
    }
}
