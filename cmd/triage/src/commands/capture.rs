//! Camera helpers shared by the capture commands.
//!
//! Frames come from a scene file of pre-extracted embeddings (see
//! `ReplayOpener`); the raw-embedding encoder reads them back.

use std::path::Path;
use std::sync::Arc;

use facetriage_capture::{RawEmbeddingEncoder, ReplayOpener};
use facetriage_cli::AppConfig;
use tokio_util::sync::CancellationToken;

/// Opens a scene file as the capture device.
pub fn scene_device(cfg: &AppConfig, scene: &str) -> anyhow::Result<Arc<ReplayOpener>> {
    let opener = ReplayOpener::from_file(Path::new(scene), cfg.capture.frame_interval())?;
    if let Some(dim) = opener.scene().dim() {
        if dim != cfg.dim {
            anyhow::bail!(
                "scene {scene} has {dim}-dimensional faces, config expects {}",
                cfg.dim
            );
        }
    }
    Ok(Arc::new(opener))
}

pub fn encoder(cfg: &AppConfig) -> Arc<RawEmbeddingEncoder> {
    Arc::new(RawEmbeddingEncoder::new(cfg.dim))
}

/// Runs blocking capture work on the blocking pool; Ctrl-C cancels it.
pub async fn with_ctrl_c<T, F>(f: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> T + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || f(token));
    tokio::select! {
        res = &mut task => Ok(res?),
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Ok(task.await?)
        }
    }
}
