//! Projectable image files on disk.

use std::path::{Path, PathBuf};

/// MIME types accepted by the upload endpoint.
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("invalid file name: {0:?}")]
    InvalidName(String),
    #[error("image storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where projectable images come from.
pub trait ImageLibrary: Send + Sync {
    /// File names available for projection, sorted.
    fn list(&self) -> Result<Vec<String>, ImageError>;

    /// Store an uploaded image and return the stored file name.
    fn store(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<String, ImageError>;
}

pub fn is_allowed_mime(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_MIME_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(essence))
}

fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Reduce a client-supplied name to a bare file name inside the library.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base.starts_with('.') || base.contains('\0') {
        return None;
    }
    Some(base.to_string())
}

/// Images kept in one flat directory.
pub struct DirImageLibrary {
    root: PathBuf,
}

impl DirImageLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageLibrary for DirImageLibrary {
    fn list(&self) -> Result<Vec<String>, ImageError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if has_image_extension(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn store(&self, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<String, ImageError> {
        if !is_allowed_mime(content_type) {
            return Err(ImageError::UnsupportedType(content_type.to_string()));
        }
        let name = sanitize_file_name(file_name)
            .ok_or_else(|| ImageError::InvalidName(file_name.to_string()))?;

        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.root.join(&name), bytes)?;
        tracing::info!(file = %name, bytes = bytes.len(), "image stored");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_allow_list() {
        assert!(is_allowed_mime("image/png"));
        assert!(is_allowed_mime("IMAGE/JPEG"));
        assert!(is_allowed_mime("image/webp; charset=binary"));
        assert!(!is_allowed_mime("image/svg+xml"));
        assert!(!is_allowed_mime("text/html"));
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("map.png").as_deref(), Some("map.png"));
        assert_eq!(sanitize_file_name("../../etc/map.png").as_deref(), Some("map.png"));
        assert_eq!(sanitize_file_name(r"C:\maps\cave.jpg").as_deref(), Some("cave.jpg"));
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(".hidden.png"), None);
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let lib = DirImageLibrary::new(dir.path().join("nope"));
        assert!(lib.list().unwrap().is_empty());
    }

    #[test]
    fn list_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.JPG"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let lib = DirImageLibrary::new(dir.path());
        assert_eq!(lib.list().unwrap(), vec!["a.JPG".to_string(), "b.png".to_string()]);
    }

    #[test]
    fn store_writes_and_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let lib = DirImageLibrary::new(dir.path().join("images"));

        let name = lib.store("../tavern.gif", "image/gif", b"GIF89a").unwrap();
        assert_eq!(name, "tavern.gif");
        assert_eq!(std::fs::read(lib.root().join("tavern.gif")).unwrap(), b"GIF89a");
        assert_eq!(lib.list().unwrap(), vec!["tavern.gif".to_string()]);

        assert!(matches!(
            lib.store("evil.html", "text/html", b"<script>"),
            Err(ImageError::UnsupportedType(_))
        ));
        assert!(matches!(lib.store("", "image/png", b"x"), Err(ImageError::InvalidName(_))));
    }
}
