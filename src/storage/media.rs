//! Image and thumbnail files on disk
//!
//! Files live under `post_images/{board}/` and `post_thumbnails/{board}/`
//! below the media root. The database stores paths relative to that root.

use crate::api::Attachment;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const IMAGE_DIR: &str = "post_images";
const THUMBNAIL_DIR: &str = "post_thumbnails";

/// Attachment bytes fetched for a post, not yet persisted
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub attachment: Attachment,
    pub image: Vec<u8>,
    pub thumbnail: Vec<u8>,
}

/// Relative paths of a persisted attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub image: String,
    pub thumbnail: String,
}

/// Writes and removes media files below a root directory
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored relative path
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Writes both files of an attachment
    ///
    /// If the thumbnail cannot be written the image is removed again.
    /// Extensions other than a dot plus ASCII letters and digits are refused.
    pub fn save(&self, board: &str, media: &DownloadedMedia) -> io::Result<StoredMedia> {
        if !media.attachment.has_plain_extension() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsafe file extension {:?}", media.attachment.extension),
            ));
        }

        let stored = StoredMedia {
            image: format!("{}/{}/{}", IMAGE_DIR, board, media.attachment.image_name()),
            thumbnail: format!(
                "{}/{}/{}",
                THUMBNAIL_DIR,
                board,
                media.attachment.thumbnail_name()
            ),
        };

        write_file(&self.path(&stored.image), &media.image)?;
        if let Err(e) = write_file(&self.path(&stored.thumbnail), &media.thumbnail) {
            self.remove_file(&stored.image);
            return Err(e);
        }

        Ok(stored)
    }

    /// Removes both files of an attachment; missing files are ignored
    pub fn remove(&self, stored: &StoredMedia) {
        self.remove_file(&stored.image);
        self.remove_file(&stored.thumbnail);
    }

    fn remove_file(&self, relative: &str) {
        let path = self.path(relative);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}
