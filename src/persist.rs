//! Screenshot storage: timestamped PNGs in a per-player directory.
//!
//! Layout:
//!   <root>/<player>/clanDropNotifications/drop 2024-03-07_09-05-30.png
//!   <root>/<player>/clanDropNotifications/drop 2024-03-07_09-05-30(1).png
//!   <root>/drop 2024-03-07_09-05-30.png          (player unknown)
//!
//! A player name that isn't a single plain path component is treated as
//! unknown.

use crate::capture::encode_png;
use chrono::NaiveDateTime;
use image::RgbaImage;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

pub const SUB_DIR: &str = "clanDropNotifications";
pub const BASE_NAME: &str = "drop";

const FILE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Give up after this many `(n)` suffixes for one second's worth of names.
const MAX_SUFFIX: u32 = 10_000;

/// A screenshot that made it to disk, with the bytes we wrote.
#[derive(Debug, Clone)]
pub struct PersistedScreenshot {
    pub path: PathBuf,
    pub png_bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    root: PathBuf,
}

impl ScreenshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a screenshot for `player` lands in.
    pub fn target_dir(&self, player: Option<&str>, sub_dir: Option<&str>) -> PathBuf {
        match player.filter(|p| is_plain_component(p)) {
            Some(player) => {
                let dir = self.root.join(player);
                match sub_dir.filter(|s| !s.is_empty()) {
                    Some(sub) => dir.join(sub),
                    None => dir,
                }
            }
            None => self.root.clone(),
        }
    }

    /// Encodes `image` as PNG and writes it under a name nobody else holds.
    ///
    /// Blocking. Call from a worker thread.
    pub fn persist(
        &self,
        image: &RgbaImage,
        base_name: &str,
        sub_dir: Option<&str>,
        player: Option<&str>,
        now: &NaiveDateTime,
    ) -> Result<PersistedScreenshot, PersistError> {
        let dir = self.target_dir(player, sub_dir);
        std::fs::create_dir_all(&dir).map_err(|source| PersistError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let png_bytes = encode_png(image)?;

        let stem = file_stem(base_name, now);
        let (path, file) = create_unique(&dir, &stem)?;
        write_or_discard(&path, file, &png_bytes)?;

        log::info!(
            "[PERSIST] Saved {} ({} bytes)",
            path.display(),
            png_bytes.len()
        );

        Ok(PersistedScreenshot { path, png_bytes })
    }
}

/// True for a name that joins as exactly one normal path component.
fn is_plain_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// `drop 2024-03-07_09-05-30`, or just the timestamp for an empty base name.
fn file_stem(base_name: &str, now: &NaiveDateTime) -> String {
    let timestamp = now.format(FILE_TIMESTAMP_FORMAT);
    if base_name.is_empty() {
        timestamp.to_string()
    } else {
        format!("{} {}", base_name, timestamp)
    }
}

/// Claims `<stem>.png`, then `<stem>(1).png`, `<stem>(2).png`, ...
///
/// Each candidate is opened with `create_new`, so two writers racing on the
/// same second both get a file of their own.
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, std::fs::File), PersistError> {
    for n in 0..=MAX_SUFFIX {
        let name = if n == 0 {
            format!("{}.png", stem)
        } else {
            format!("{}({}).png", stem, n)
        };
        let candidate = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(source) => {
                return Err(PersistError::Write {
                    path: candidate,
                    source,
                })
            }
        }
    }

    Err(PersistError::NoFreeName {
        dir: dir.to_path_buf(),
        stem: stem.to_string(),
    })
}

/// Writes `bytes` to the freshly claimed `path`. On failure the partial
/// file is removed so the name is free again.
fn write_or_discard<W: Write>(path: &Path, mut file: W, bytes: &[u8]) -> Result<(), PersistError> {
    if let Err(source) = file.write_all(bytes) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(PersistError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Failed to create screenshot directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to write screenshot {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free file name for '{stem}' in {}", dir.display())]
    NoFreeName { dir: PathBuf, stem: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 30)
            .unwrap()
    }

    #[test]
    fn writes_png_under_player_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(tmp.path());

        let saved = store
            .persist(&RgbaImage::new(8, 8), BASE_NAME, Some(SUB_DIR), Some("Player123"), &now())
            .unwrap();

        assert_eq!(
            saved.path,
            tmp.path()
                .join("Player123")
                .join(SUB_DIR)
                .join("drop 2024-03-07_09-05-30.png")
        );
        let on_disk = std::fs::read(&saved.path).unwrap();
        assert_eq!(on_disk, saved.png_bytes);
        assert_eq!(&on_disk[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn same_second_gets_numbered_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(tmp.path());
        let image = RgbaImage::new(4, 4);

        let first = store
            .persist(&image, BASE_NAME, Some(SUB_DIR), Some("Player123"), &now())
            .unwrap();
        let second = store
            .persist(&image, BASE_NAME, Some(SUB_DIR), Some("Player123"), &now())
            .unwrap();
        let third = store
            .persist(&image, BASE_NAME, Some(SUB_DIR), Some("Player123"), &now())
            .unwrap();

        assert_ne!(first.path, second.path);
        assert!(second.path.ends_with("drop 2024-03-07_09-05-30(1).png"));
        assert!(third.path.ends_with("drop 2024-03-07_09-05-30(2).png"));
        assert!(first.path.exists() && second.path.exists() && third.path.exists());
    }

    #[test]
    fn unknown_player_writes_to_root() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(tmp.path());

        let saved = store
            .persist(&RgbaImage::new(4, 4), BASE_NAME, Some(SUB_DIR), None, &now())
            .unwrap();

        assert_eq!(saved.path.parent().unwrap(), tmp.path());
    }

    #[test]
    fn unsafe_player_names_fall_back_to_root() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(tmp.path());

        for name in ["..", "../x", "a/b", "a\\b", "/etc", "."] {
            assert_eq!(
                store.target_dir(Some(name), Some(SUB_DIR)),
                tmp.path(),
                "{} escaped the root",
                name
            );
        }
        assert_eq!(
            store.target_dir(Some("Player 123"), Some(SUB_DIR)),
            tmp.path().join("Player 123").join(SUB_DIR)
        );
    }

    #[test]
    fn unsafe_player_screenshot_stays_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("shots");
        let store = ScreenshotStore::new(&root);

        let saved = store
            .persist(&RgbaImage::new(4, 4), BASE_NAME, Some(SUB_DIR), Some("../escaped"), &now())
            .unwrap();

        assert_eq!(saved.path.parent().unwrap(), root.as_path());
        assert!(!tmp.path().join("escaped").exists());
    }

    /// Takes a few bytes, then fails like a full disk.
    struct FullDisk {
        written: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.written >= 2 {
                return Err(std::io::Error::new(ErrorKind::Other, "no space left"));
            }
            let n = buf.len().min(2 - self.written);
            self.written += n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_frees_the_claimed_name() {
        let tmp = tempfile::tempdir().unwrap();
        let (path, file) = create_unique(tmp.path(), "drop 2024-03-07_09-05-30").unwrap();
        drop(file);
        assert!(path.exists());

        let result = write_or_discard(&path, FullDisk { written: 0 }, &[0u8; 16]);
        assert!(matches!(result, Err(PersistError::Write { .. })));
        assert!(!path.exists());

        let (reclaimed, _file) = create_unique(tmp.path(), "drop 2024-03-07_09-05-30").unwrap();
        assert_eq!(reclaimed, path);
    }

    #[test]
    fn empty_base_name_is_just_timestamp() {
        assert_eq!(file_stem("", &now()), "2024-03-07_09-05-30");
        assert_eq!(file_stem("drop", &now()), "drop 2024-03-07_09-05-30");
    }

    #[test]
    fn unwritable_root_is_create_dir_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let store = ScreenshotStore::new(&blocker);

        let result = store.persist(&RgbaImage::new(4, 4), BASE_NAME, Some(SUB_DIR), Some("Player123"), &now());
        assert!(matches!(result, Err(PersistError::CreateDir { .. })));
    }
}
