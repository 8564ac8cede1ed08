//! HLS master playlist assembly.

use std::path::{Path, PathBuf};

use abr_models::PlaylistFragment;

/// File name of the master playlist inside a job directory.
pub const MASTER_PLAYLIST: &str = "main.m3u8";

/// Build the master playlist for the given fragments.
///
/// Entries keep the order of `fragments`; callers pass them in dispatch
/// order so the output is reproducible.
pub fn build_master_playlist(fragments: &[PlaylistFragment]) -> String {
    let mut lines = vec!["#EXTM3U".to_string(), "#EXT-X-VERSION:3".to_string()];

    for fragment in fragments {
        lines.push(format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}",
            fragment.bandwidth(),
            fragment.detected_width,
            fragment.detected_height
        ));
        lines.push(fragment.path_from_main.clone());
    }

    lines.join("\n")
}

/// Write the master playlist into `job_dir`, returning its path.
pub async fn write_master_playlist(
    job_dir: &Path,
    fragments: &[PlaylistFragment],
) -> std::io::Result<PathBuf> {
    let path = job_dir.join(MASTER_PLAYLIST);
    tokio::fs::write(&path, build_master_playlist(fragments)).await?;
    Ok(path)
}
