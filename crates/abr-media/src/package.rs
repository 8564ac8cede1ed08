//! Job output directories and archive packaging.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use abr_models::JobId;
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{MediaError, MediaResult};

/// Filesystem side of a job: where output lands and how it is shipped.
#[async_trait]
pub trait Packager: Send + Sync + 'static {
    /// Directory owned by a job. Keyed by job id so jobs never collide.
    fn job_dir(&self, job_id: &JobId) -> PathBuf;

    /// Create the job directory, returning its path.
    async fn create_job_dir(&self, job_id: &JobId) -> MediaResult<PathBuf>;

    /// Archive a directory into `<dir>.zip`, returning the archive path.
    async fn archive(&self, dir: &Path) -> MediaResult<PathBuf>;

    /// Recursively remove a directory. Missing directories are not an error.
    async fn remove_dir(&self, dir: &Path) -> MediaResult<()>;
}

/// Packager rooted at a local output directory.
#[derive(Debug, Clone)]
pub struct FsPackager {
    root: PathBuf,
}

impl FsPackager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Packager for FsPackager {
    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    async fn create_job_dir(&self, job_id: &JobId) -> MediaResult<PathBuf> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn archive(&self, dir: &Path) -> MediaResult<PathBuf> {
        let archive_path = archive_path_for(dir);
        let src = dir.to_path_buf();
        let dst = archive_path.clone();

        tokio::task::spawn_blocking(move || zip_dir(&src, &dst))
            .await
            .map_err(|e| MediaError::internal(format!("archive task failed: {}", e)))??;

        debug!("Archived {} to {}", dir.display(), archive_path.display());
        Ok(archive_path)
    }

    async fn remove_dir(&self, dir: &Path) -> MediaResult<()> {
        match fs::remove_dir_all(dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `<dir>.zip`, next to the directory.
pub fn archive_path_for(dir: &Path) -> PathBuf {
    let mut name = dir.as_os_str().to_os_string();
    name.push(".zip");
    PathBuf::from(name)
}

fn zip_dir(src: &Path, dst: &Path) -> MediaResult<()> {
    if !src.is_dir() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }

    let file = File::create(dst)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let result = add_entries(&mut zip, src, src, options).and_then(|()| {
        zip.finish()?;
        Ok(())
    });

    // Never leave a truncated archive behind
    if result.is_err() {
        let _ = std::fs::remove_file(dst);
    }
    result
}

fn add_entries<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    base: &Path,
    dir: &Path,
    options: FileOptions,
) -> MediaResult<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = entry_name(base, &path)?;

        if entry.file_type()?.is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
            add_entries(zip, base, &path, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut file = File::open(&path)?;
            io::copy(&mut file, zip)?;
        }
    }

    Ok(())
}

/// Archive entry name: relative path with `/` separators.
fn entry_name(base: &Path, path: &Path) -> MediaResult<String> {
    let relative = path
        .strip_prefix(base)
        .map_err(|e| MediaError::internal(format!("path outside archive root: {}", e)))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_archive_path_for() {
        assert_eq!(
            archive_path_for(Path::new("/out/abc-123")),
            PathBuf::from("/out/abc-123.zip")
        );
    }

    #[tokio::test]
    async fn test_archive_job_dir() {
        let tmp = TempDir::new().unwrap();
        let packager = FsPackager::new(tmp.path());
        let job_id = JobId::from_string("job-1");

        let dir = packager.create_job_dir(&job_id).await.unwrap();
        assert_eq!(dir, tmp.path().join("job-1"));

        std::fs::create_dir_all(dir.join("720P")).unwrap();
        std::fs::write(dir.join("main.m3u8"), "#EXTM3U\n#EXT-X-VERSION:3").unwrap();
        std::fs::write(dir.join("720P").join("clip_720Pp.m3u8"), "#EXTM3U").unwrap();

        let archive = packager.archive(&dir).await.unwrap();
        assert_eq!(archive, tmp.path().join("job-1.zip"));

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut manifest = String::new();
        zip.by_name("main.m3u8")
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        assert!(manifest.starts_with("#EXTM3U"));
        assert!(zip.by_name("720P/clip_720Pp.m3u8").is_ok());
    }

    #[tokio::test]
    async fn test_archive_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let packager = FsPackager::new(tmp.path());

        let err = packager.archive(&tmp.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!tmp.path().join("nope.zip").exists());
    }

    #[tokio::test]
    async fn test_remove_dir_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let packager = FsPackager::new(tmp.path());
        let dir = packager
            .create_job_dir(&JobId::from_string("job-2"))
            .await
            .unwrap();

        packager.remove_dir(&dir).await.unwrap();
        assert!(!dir.exists());
        packager.remove_dir(&dir).await.unwrap();
    }
}
