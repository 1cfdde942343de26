//! Clip catalog
//!
//! Maps logical clip paths to clip handles. Every clip referenced by any
//! scene is loaded once at startup; scenes then share the same handles for
//! the lifetime of the process. The catalog is read-only once the scheduler
//! starts and is shared behind an `Arc`.

use crate::error::{Error, Result};
use gvp_common::scene::logical_clip_path;
use gvp_common::{SceneDescriptor, SceneSet};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Opaque reference to a clip owned by a [`ClipCatalog`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipHandle(usize);

/// A loaded clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipAsset {
    /// Catalog key (extension stripped)
    pub logical_path: String,

    /// Short name for logs
    pub name: String,

    /// Where the media actually lives
    pub location: PathBuf,
}

/// Resolves logical paths to media files
pub trait ClipSource: Send + Sync {
    /// Location of the media for `logical_path`, or None if it does not exist
    fn locate(&self, logical_path: &str) -> Option<PathBuf>;
}

/// Media files under a root folder, matched by path with any extension
#[derive(Debug, Clone)]
pub struct DirectoryClipSource {
    root: PathBuf,
}

impl DirectoryClipSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClipSource for DirectoryClipSource {
    fn locate(&self, logical_path: &str) -> Option<PathBuf> {
        let exact = self.root.join(logical_path);
        if exact.is_file() {
            return Some(exact);
        }

        // Logical paths carry no extension; accept any file with a matching stem
        let parent = exact.parent()?;
        let stem = exact.file_name()?;
        let mut matches: Vec<PathBuf> = std::fs::read_dir(parent)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.file_stem() == Some(stem))
            .collect();
        matches.sort();
        matches.into_iter().next()
    }
}

/// Fixed set of known logical paths
///
/// Used for headless rehearsals without media on disk, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticClipSource {
    known: HashSet<String>,
}

impl StaticClipSource {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            known: paths
                .into_iter()
                .map(|p| logical_clip_path(p.as_ref()))
                .collect(),
        }
    }

    /// Every clip and soundtrack the scene set references
    pub fn from_scenes(scenes: &SceneSet) -> Self {
        let clips = scenes.iter().flat_map(|s| s.clips.iter());
        let tracks = scenes.iter().filter_map(|s| s.soundtrack.as_ref());
        Self::new(clips.chain(tracks))
    }
}

impl ClipSource for StaticClipSource {
    fn locate(&self, logical_path: &str) -> Option<PathBuf> {
        let key = logical_clip_path(logical_path);
        self.known.contains(&key).then(|| PathBuf::from(key))
    }
}

/// Outcome of the startup bulk load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Clips newly loaded
    pub loaded: usize,
    /// References that resolved to an already-loaded clip
    pub reused: usize,
    /// Clip references that could not be found
    pub missing_clips: Vec<String>,
    /// Soundtrack references that could not be found
    pub missing_soundtracks: Vec<String>,
}

/// Logical path → clip mapping, populated once at startup
#[derive(Debug, Default)]
pub struct ClipCatalog {
    clips: Vec<ClipAsset>,
    index: HashMap<String, ClipHandle>,
}

impl ClipCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a clip, or return the existing handle if it was loaded before
    pub fn load(&mut self, source: &dyn ClipSource, path: &str) -> Result<ClipHandle> {
        let key = logical_clip_path(path);
        if let Some(handle) = self.index.get(&key) {
            return Ok(*handle);
        }

        let location = source
            .locate(&key)
            .ok_or_else(|| Error::AssetMissing(path.to_string()))?;

        let name = Path::new(&key)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.clone());

        let handle = ClipHandle(self.clips.len());
        debug!("Loaded clip '{}' from {}", key, location.display());
        self.clips.push(ClipAsset {
            logical_path: key.clone(),
            name,
            location,
        });
        self.index.insert(key, handle);
        Ok(handle)
    }

    /// Handle for a previously loaded clip
    pub fn get(&self, path: &str) -> Option<ClipHandle> {
        self.index.get(&logical_clip_path(path)).copied()
    }

    /// Clip behind a handle
    pub fn asset(&self, handle: ClipHandle) -> Option<&ClipAsset> {
        self.clips.get(handle.0)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Load every clip referenced by any scene, deduplicated by logical path
    ///
    /// Missing clips and soundtracks are logged and reported, not fatal here;
    /// [`playlist`](Self::playlist) decides whether a scene is still playable.
    pub fn preload_scenes(&mut self, scenes: &SceneSet, source: &dyn ClipSource) -> PreloadReport {
        info!("Preloading clips for {} scenes", scenes.len());
        let mut report = PreloadReport::default();

        for scene in scenes.iter() {
            for clip in &scene.clips {
                if self.get(clip).is_some() {
                    report.reused += 1;
                    continue;
                }
                match self.load(source, clip) {
                    Ok(_) => report.loaded += 1,
                    Err(e) => {
                        error!("Failed to preload clip for scene '{}': {}", scene.name, e);
                        report.missing_clips.push(clip.clone());
                    }
                }
            }

            if let Some(track) = &scene.soundtrack {
                if source.locate(&logical_clip_path(track)).is_none() {
                    warn!("Soundtrack for scene '{}' not found: {}", scene.name, track);
                    report.missing_soundtracks.push(track.clone());
                }
            }
        }

        info!(
            "Completed preloading: {} loaded, {} reused, {} missing",
            report.loaded,
            report.reused,
            report.missing_clips.len()
        );
        report
    }

    /// Handles for a scene's clips in document order, skipping missing ones
    ///
    /// A scene left with no playable clip is a configuration error.
    pub fn playlist(&self, scene: &SceneDescriptor) -> Result<Vec<ClipHandle>> {
        let mut handles = Vec::with_capacity(scene.clips.len());
        for clip in &scene.clips {
            match self.get(clip) {
                Some(handle) => handles.push(handle),
                None => warn!("Scene '{}': clip not in catalog, skipping: {}", scene.name, clip),
            }
        }

        if handles.is_empty() {
            return Err(Error::Configuration(format!(
                "Scene '{}' has no playable clips ({} declared, all missing)",
                scene.name,
                scene.clips.len()
            )));
        }

        debug!("Loaded {} video clips for scene '{}'", handles.len(), scene.name);
        Ok(handles)
    }
}
