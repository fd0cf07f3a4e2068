// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scene authority backed by a directory of pre-serialized segment files.

use std::io;
use std::path::{Path, PathBuf};
use tracer::{SceneAuthority, SceneSegments, SegmentKind};

/// Reads `<dir>/<segment>` or, failing that, `<dir>/<segment>.bin`.
///
/// Missing files leave the segment out, so requests for it are misses.
#[derive(Debug, Clone)]
pub struct DirectoryScene {
    dir: PathBuf,
}

impl DirectoryScene {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read one segment file. `Ok(None)` when neither candidate exists.
    pub fn read_segment(&self, kind: SegmentKind) -> io::Result<Option<Vec<u8>>> {
        let plain = self.dir.join(kind.name());
        let with_ext = self.dir.join(format!("{}.bin", kind.name()));
        for path in [plain, with_ext] {
            match std::fs::read(&path) {
                Ok(bytes) => return Ok(Some(bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

impl SceneAuthority for DirectoryScene {
    fn collect_segments(&self) -> SceneSegments {
        let mut segments = SceneSegments::new();
        for kind in SegmentKind::ALL {
            match self.read_segment(kind) {
                Ok(Some(bytes)) => {
                    tracing::debug!("Loaded {} ({} bytes)", kind, bytes.len());
                    segments.insert(kind.name(), bytes);
                }
                Ok(None) => tracing::debug!("No file for segment {}", kind),
                Err(e) => tracing::warn!("Failed to read segment {}: {}", kind, e),
            }
        }
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_plain_and_bin_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("header"), b"hdr").unwrap();
        std::fs::write(dir.path().join("nodes.bin"), vec![7u8; 32]).unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"ignored").unwrap();

        let segments = DirectoryScene::new(dir.path()).collect_segments();
        assert_eq!(segments.names(), vec!["header", "nodes"]);
        assert_eq!(&segments.get("header").unwrap()[..], b"hdr");
        assert_eq!(segments.get("nodes").unwrap().len(), 32);
    }

    #[test]
    fn test_plain_name_wins_over_bin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("textures"), b"plain").unwrap();
        std::fs::write(dir.path().join("textures.bin"), b"bin").unwrap();

        let scene = DirectoryScene::new(dir.path());
        let bytes = scene.read_segment(SegmentKind::Textures).unwrap().unwrap();
        assert_eq!(bytes, b"plain");
    }

    #[test]
    fn test_missing_directory_yields_empty_scene() {
        let dir = tempfile::tempdir().unwrap();
        let scene = DirectoryScene::new(dir.path().join("absent"));
        assert!(scene.collect_segments().is_empty());
    }
}
