//! Scene descriptions
//!
//! Scenes are loaded once at startup from a declarative JSON document and
//! are immutable afterwards. All validation happens here so that a bad
//! document stops the process before any timer starts.
//!
//! Document shape:
//!
//! ```json
//! {
//!   "scenes": [
//!     {
//!       "name": "Forest",
//!       "videos": [{ "video": "clips/forest_01.mp4" }],
//!       "displayDuration": 5.0,
//!       "SceneLength": 60.0,
//!       "nextScene": 1,
//!       "soundtrack": "audio/forest.ogg"
//!     }
//!   ]
//! }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One clip entry as written in the scene document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipEntry {
    /// Clip path relative to the media root (extension optional)
    pub video: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneEntry {
    name: String,
    #[serde(default)]
    videos: Vec<ClipEntry>,
    display_duration: f64,
    #[serde(rename = "SceneLength", alias = "sceneLength")]
    scene_length: f64,
    next_scene: i64,
    #[serde(default)]
    soundtrack: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SceneDocument {
    #[serde(default)]
    scenes: Vec<SceneEntry>,
}

/// Validated, immutable description of one scene
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescriptor {
    /// Display name, also used to address the soundtrack service
    pub name: String,

    /// Clip references in document order
    pub clips: Vec<String>,

    /// Seconds each clip stays on screen
    pub display_duration: f64,

    /// Total seconds the scene runs before advancing
    pub scene_length: f64,

    /// Index of the scene that follows this one
    pub next_scene: usize,

    /// Soundtrack reference, if the scene has one
    pub soundtrack: Option<String>,
}

/// The full, validated list of scenes
#[derive(Debug, Clone)]
pub struct SceneSet {
    scenes: Vec<SceneDescriptor>,
}

impl SceneSet {
    /// Parse and validate a scene document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: SceneDocument = serde_json::from_str(json)?;
        Self::from_entries(document.scenes)
    }

    /// Read, parse and validate a scene document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read scene file {}: {}", path.display(), e))
        })?;
        let set = Self::from_json_str(&json)?;
        info!("Loaded {} scenes from {}", set.len(), path.display());
        Ok(set)
    }

    /// Build a scene set from already-constructed descriptors
    ///
    /// Runs the same validation as the document loader.
    pub fn new(scenes: Vec<SceneDescriptor>) -> Result<Self> {
        if scenes.is_empty() {
            return Err(Error::Config("Scene document declares no scenes".to_string()));
        }
        for (index, scene) in scenes.iter().enumerate() {
            validate_scene(index, scene, scenes.len())?;
        }
        Ok(Self { scenes })
    }

    fn from_entries(entries: Vec<SceneEntry>) -> Result<Self> {
        let count = entries.len();
        let mut scenes = Vec::with_capacity(count);

        for (index, entry) in entries.into_iter().enumerate() {
            let next_scene = usize::try_from(entry.next_scene).map_err(|_| {
                Error::Config(format!(
                    "Scene {} '{}': nextScene {} is out of range (0..{})",
                    index, entry.name, entry.next_scene, count
                ))
            })?;

            let soundtrack = entry
                .soundtrack
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            scenes.push(SceneDescriptor {
                name: entry.name,
                clips: entry.videos.into_iter().map(|v| v.video).collect(),
                display_duration: entry.display_duration,
                scene_length: entry.scene_length,
                next_scene,
                soundtrack,
            });
        }

        Self::new(scenes)
    }

    /// Scene at `index`
    pub fn get(&self, index: usize) -> Result<&SceneDescriptor> {
        self.scenes.get(index).ok_or_else(|| {
            Error::Config(format!(
                "Scene index {} is out of range (0..{})",
                index,
                self.scenes.len()
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneDescriptor> {
        self.scenes.iter()
    }
}

fn validate_scene(index: usize, scene: &SceneDescriptor, scene_count: usize) -> Result<()> {
    let label = format!("Scene {} '{}'", index, scene.name);

    if scene.clips.is_empty() {
        return Err(Error::Config(format!("{}: must declare at least one clip", label)));
    }
    if let Some(blank) = scene.clips.iter().position(|c| c.trim().is_empty()) {
        return Err(Error::Config(format!("{}: clip {} has an empty path", label, blank)));
    }
    if !scene.display_duration.is_finite() || scene.display_duration <= 0.0 {
        return Err(Error::Config(format!(
            "{}: displayDuration must be > 0 (got {})",
            label, scene.display_duration
        )));
    }
    if !scene.scene_length.is_finite() || scene.scene_length < scene.display_duration {
        return Err(Error::Config(format!(
            "{}: sceneLength {} is shorter than displayDuration {}",
            label, scene.scene_length, scene.display_duration
        )));
    }
    if scene.next_scene >= scene_count {
        return Err(Error::Config(format!(
            "{}: nextScene {} is out of range (0..{})",
            label, scene.next_scene, scene_count
        )));
    }

    debug!(
        "{}: {} clips, display {}s, length {}s, next {}",
        label,
        scene.clips.len(),
        scene.display_duration,
        scene.scene_length,
        scene.next_scene
    );
    Ok(())
}

/// Catalog key for a clip path: trimmed, extension removed
///
/// `clips/a.mp4` and `clips/a` refer to the same clip.
pub fn logical_clip_path(path: &str) -> String {
    let trimmed = path.trim();
    Path::new(trimmed)
        .with_extension("")
        .to_string_lossy()
        .replace('\\', "/")
}

/// Scene name as matched by the soundtrack service: whitespace removed, lowercase
pub fn normalize_scene_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_SCENES: &str = r#"{
        "scenes": [
            {
                "name": "Forest Walk",
                "videos": [{ "video": "clips/a.mp4" }, { "video": "clips/b.mp4" }],
                "displayDuration": 5,
                "SceneLength": 12,
                "nextScene": 1,
                "soundtrack": "audio/forest.ogg"
            },
            {
                "name": "Sea",
                "videos": [{ "video": "clips/c.mp4" }],
                "displayDuration": 4.5,
                "sceneLength": 9,
                "nextScene": 0
            }
        ]
    }"#;

    fn scene(clips: &[&str], display: f64, length: f64, next: usize) -> SceneDescriptor {
        SceneDescriptor {
            name: "test".to_string(),
            clips: clips.iter().map(|c| c.to_string()).collect(),
            display_duration: display,
            scene_length: length,
            next_scene: next,
            soundtrack: None,
        }
    }

    #[test]
    fn test_parse_document() {
        let set = SceneSet::from_json_str(TWO_SCENES).unwrap();
        assert_eq!(set.len(), 2);

        let forest = set.get(0).unwrap();
        assert_eq!(forest.name, "Forest Walk");
        assert_eq!(forest.clips, vec!["clips/a.mp4", "clips/b.mp4"]);
        assert_eq!(forest.display_duration, 5.0);
        assert_eq!(forest.scene_length, 12.0);
        assert_eq!(forest.next_scene, 1);
        assert_eq!(forest.soundtrack.as_deref(), Some("audio/forest.ogg"));

        let sea = set.get(1).unwrap();
        assert_eq!(sea.scene_length, 9.0);
        assert_eq!(sea.soundtrack, None);
    }

    #[test]
    fn test_zero_clip_scene_rejected() {
        let json = r#"{ "scenes": [ { "name": "Empty", "videos": [],
            "displayDuration": 5, "SceneLength": 10, "nextScene": 0 } ] }"#;
        let err = SceneSet::from_json_str(json).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("at least one clip"));
    }

    #[test]
    fn test_scene_shorter_than_display_rejected() {
        let err = SceneSet::new(vec![scene(&["a"], 5.0, 4.0, 0)]).unwrap_err();
        assert!(err.to_string().contains("shorter than displayDuration"));
    }

    #[test]
    fn test_scene_length_equal_to_display_accepted() {
        assert!(SceneSet::new(vec![scene(&["a"], 5.0, 5.0, 0)]).is_ok());
    }

    #[test]
    fn test_non_positive_display_rejected() {
        assert!(SceneSet::new(vec![scene(&["a"], 0.0, 4.0, 0)]).is_err());
        assert!(SceneSet::new(vec![scene(&["a"], -1.0, 4.0, 0)]).is_err());
        assert!(SceneSet::new(vec![scene(&["a"], f64::NAN, 4.0, 0)]).is_err());
    }

    #[test]
    fn test_next_scene_out_of_range_rejected() {
        let err = SceneSet::new(vec![scene(&["a"], 1.0, 2.0, 1)]).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let json = r#"{ "scenes": [ { "name": "Neg", "videos": [{"video": "a"}],
            "displayDuration": 1, "SceneLength": 2, "nextScene": -1 } ] }"#;
        assert!(SceneSet::from_json_str(json).is_err());
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(SceneSet::from_json_str(r#"{ "scenes": [] }"#).is_err());
        assert!(SceneSet::from_json_str("{}").is_err());
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let err = SceneSet::from_json_str("{ scenes: ").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_blank_soundtrack_is_none() {
        let json = r#"{ "scenes": [ { "name": "S", "videos": [{"video": "a"}],
            "displayDuration": 1, "SceneLength": 2, "nextScene": 0, "soundtrack": "  " } ] }"#;
        let set = SceneSet::from_json_str(json).unwrap();
        assert_eq!(set.get(0).unwrap().soundtrack, None);
    }

    #[test]
    fn test_get_out_of_range() {
        let set = SceneSet::new(vec![scene(&["a"], 1.0, 2.0, 0)]).unwrap();
        assert!(set.get(1).is_err());
    }

    #[test]
    fn test_logical_clip_path_strips_extension() {
        assert_eq!(logical_clip_path("clips/a.mp4"), "clips/a");
        assert_eq!(logical_clip_path(" clips/a "), "clips/a");
        assert_eq!(logical_clip_path("clips/a"), "clips/a");
        assert_eq!(logical_clip_path("clips/a.b.mov"), "clips/a.b");
    }

    #[test]
    fn test_normalize_scene_name() {
        assert_eq!(normalize_scene_name("Forest Walk"), "forestwalk");
        assert_eq!(normalize_scene_name(" FOREST\twalk "), "forestwalk");
        assert_eq!(normalize_scene_name("sea"), "sea");
    }
}
