use crate::server::error::{ServerError, ServerResult};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

/// A directory of files served by logical path. `/` means `/index.html`.
#[derive(Debug, Clone)]
pub struct ContentRoot {
    root: PathBuf,
}

impl ContentRoot {
    pub fn new(root: impl AsRef<Path>) -> ServerResult<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| ServerError::InvalidRoot(format!("{}: {e}", root.display())))?;
        if !root.is_dir() {
            return Err(ServerError::InvalidRoot(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto a file under the root. Paths that climb out
    /// of the root or name no regular file resolve to `None`.
    pub fn resolve(&self, logical_path: &str) -> Option<PathBuf> {
        let relative = logical_path.split(['?', '#']).next().unwrap_or_default();
        let relative = relative.trim_start_matches('/');
        let relative = if relative.is_empty() {
            "index.html"
        } else {
            relative
        };

        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }

        path.is_file().then_some(path)
    }

    /// Whole file contents, or `None` for a 404.
    pub async fn load(&self, logical_path: &str) -> ServerResult<Option<Bytes>> {
        let Some(path) = self.resolve(logical_path) else {
            return Ok(None);
        };
        let data = tokio::fs::read(&path).await?;
        Ok(Some(Bytes::from(data)))
    }
}
