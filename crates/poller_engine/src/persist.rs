use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use poller_core::{artifact_filename, encode_artifact, ArtifactSink, PersistError};
use poller_logging::poller_debug;
use serde_json::Value;
use tempfile::NamedTempFile;

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // persist() does not overwrite on every platform.
        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Tweet files on disk: `<tweets_dir>/<counter>.json`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    writer: AtomicFileWriter,
}

impl ArtifactWriter {
    pub fn new(tweets_dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(tweets_dir),
        }
    }

    fn files(&self) -> Result<Vec<PathBuf>, PersistError> {
        let dir = self.writer.dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

impl ArtifactSink for ArtifactWriter {
    fn dir(&self) -> &Path {
        self.writer.dir()
    }

    fn write(&self, counter: u64, payload: &Value) -> Result<PathBuf, PersistError> {
        let content = encode_artifact(payload)?;
        let path = self.writer.write(&artifact_filename(counter), &content)?;
        poller_debug!("Wrote {:?}", path);
        Ok(path)
    }

    fn clear(&self) -> Result<usize, PersistError> {
        let files = self.files()?;
        for path in &files {
            fs::remove_file(path)?;
        }
        Ok(files.len())
    }

    fn count(&self) -> Result<usize, PersistError> {
        Ok(self.files()?.len())
    }
}
