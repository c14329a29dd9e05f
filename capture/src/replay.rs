//! Scripted capture source: a scene file listing the faces visible in each
//! frame, replayed at a fixed pace. Used for demos, enrollment from recorded
//! embeddings, and end-to-end tests.
//!
//! ```yaml
//! interval_ms: 100
//! frames:
//!   - faces: [[0.1, 0.2, 0.3]]
//!     repeat: 5
//!   - faces: []
//!   - faces: [[0.1, 0.2, 0.3], [0.9, 0.8, 0.7]]
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::device::{CaptureDevice, DeviceOpener};
use crate::{CaptureError, Frame, RawEmbeddingEncoder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Pace of the replay; the pipeline's frame interval when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,

    pub frames: Vec<SceneFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFrame {
    #[serde(default)]
    pub faces: Vec<Vec<f32>>,

    /// Times the frame is shown in a row.
    #[serde(default = "one")]
    pub repeat: u32,
}

fn one() -> u32 {
    1
}

impl Scene {
    /// Reads a scene; `.json` files are JSON, anything else YAML.
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let err = |reason: String| CaptureError::Scene {
            path: path.to_path_buf(),
            reason,
        };
        let data = std::fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
        let scene: Scene = if path.extension().is_some_and(|e| e == "json") {
            serde_json::from_str(&data).map_err(|e| err(e.to_string()))?
        } else {
            serde_yaml::from_str(&data).map_err(|e| err(e.to_string()))?
        };
        scene.check().map_err(err)?;
        Ok(scene)
    }

    /// All faces in a scene must share one dimension.
    fn check(&self) -> Result<(), String> {
        let mut dim = None;
        for (i, f) in self.frames.iter().enumerate() {
            for face in &f.faces {
                match dim {
                    None => dim = Some(face.len()),
                    Some(d) if d != face.len() => {
                        return Err(format!(
                            "frame {i}: face dimension {} differs from {d}",
                            face.len()
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Dimension of the faces, if any frame has one.
    pub fn dim(&self) -> Option<usize> {
        self.frames
            .iter()
            .flat_map(|f| f.faces.first())
            .map(|f| f.len())
            .next()
    }

    /// Frames after expanding `repeat`.
    pub fn len(&self) -> usize {
        self.frames.iter().map(|f| f.repeat as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens [`Scene`] replays. Every open starts from the first frame.
#[derive(Debug, Clone)]
pub struct ReplayOpener {
    scene: Arc<Scene>,
    interval: Duration,
    name: String,
}

impl ReplayOpener {
    pub fn new(scene: Scene, default_interval: Duration) -> Self {
        let interval = scene
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or(default_interval);
        Self {
            scene: Arc::new(scene),
            interval,
            name: "replay".into(),
        }
    }

    pub fn from_file(path: &Path, default_interval: Duration) -> Result<Self, CaptureError> {
        let mut opener = Self::new(Scene::load(path)?, default_interval);
        opener.name = format!("replay:{}", path.display());
        Ok(opener)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

impl DeviceOpener for ReplayOpener {
    fn open(&self) -> Result<Box<dyn CaptureDevice>, CaptureError> {
        Ok(Box::new(ReplayDevice {
            scene: self.scene.clone(),
            interval: self.interval,
            frame: 0,
            shown: 0,
            seq: 0,
            next_due: Instant::now(),
            released: false,
        }))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

struct ReplayDevice {
    scene: Arc<Scene>,
    interval: Duration,
    frame: usize,
    /// Times the current frame has been shown.
    shown: u32,
    seq: u64,
    next_due: Instant,
    released: bool,
}

impl CaptureDevice for ReplayDevice {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, CaptureError> {
        if self.released {
            return Err(CaptureError::DeviceUnavailable("replay released".into()));
        }
        while let Some(f) = self.scene.frames.get(self.frame) {
            if self.shown < f.repeat {
                break;
            }
            self.frame += 1;
            self.shown = 0;
        }
        let Some(f) = self.scene.frames.get(self.frame) else {
            return Err(CaptureError::EndOfStream);
        };

        let now = Instant::now();
        if self.next_due > now {
            let wait = self.next_due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            std::thread::sleep(wait);
        }
        self.next_due = Instant::now() + self.interval;
        self.shown += 1;
        self.seq += 1;
        Ok(Some(RawEmbeddingEncoder::pack(self.seq, &f.faces)))
    }

    fn release(&mut self) {
        self.released = true;
    }
}
