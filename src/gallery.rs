use std::{
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("COMFY_OUTPUT_DIR not set")]
    NotConfigured,
    #[error("Failed to read output dir")]
    ReadDir(#[from] std::io::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    pub filename: String,
    pub modified: SystemTime,
}

impl OutputFile {
    /// Milliseconds since the Unix epoch.
    pub fn mtime(&self) -> u64 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

pub fn is_image_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Images directly inside `output_dir`, most recently modified first.
/// Subdirectories are not descended into.
pub async fn list_images(output_dir: Option<&Path>) -> Result<Vec<OutputFile>, GalleryError> {
    let output_dir = output_dir.ok_or(GalleryError::NotConfigured)?;

    let mut entries = tokio::fs::read_dir(output_dir).await?;
    let mut files = vec![];

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
            tracing::debug!("skip non utf-8 file name: {:?}", entry.file_name());
            continue;
        };

        if !is_image_file(&filename) {
            continue;
        }

        let modified = entry.metadata().await?.modified()?;
        files.push(OutputFile { filename, modified });
    }

    files.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.filename.cmp(&b.filename))
    });

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs::File, time::Duration};
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, modified: SystemTime) {
        let file = File::create(dir.join(name)).unwrap();
        file.set_modified(modified).unwrap();
    }

    #[test]
    fn recognizes_image_extensions() {
        for name in ["a.png", "b.JPG", "c.jpeg", "d.WebP"] {
            assert!(is_image_file(name), "{}", name);
        }
        for name in ["notes.txt", "png", "archive.png.zip", ".png.bak", "gif.gif"] {
            assert!(!is_image_file(name), "{}", name);
        }
    }

    #[tokio::test]
    async fn newest_first_and_non_images_excluded() {
        let dir = TempDir::new().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);

        touch(dir.path(), "a.png", base);
        touch(dir.path(), "b.jpg", base + Duration::from_secs(60));
        touch(dir.path(), "notes.txt", base + Duration::from_secs(120));
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = list_images(Some(dir.path())).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.filename.as_str()).collect();

        assert_eq!(names, vec!["b.jpg", "a.png"]);
        assert!(files[0].mtime() > files[1].mtime());
    }

    #[tokio::test]
    async fn missing_configuration_is_reported() {
        assert!(matches!(
            list_images(None).await,
            Err(GalleryError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn unreadable_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");

        assert!(matches!(
            list_images(Some(missing.as_path())).await,
            Err(GalleryError::ReadDir(_))
        ));
    }
}
