//! Files staged for the next send.

use std::future::Future;
use std::path::Path;
use std::path::PathBuf;

use chatline_protocol::outgoing::Attachment;

use crate::error::ChatlineError;

/// Source of the attachments that accompany a send.
///
/// `snapshot` may need to read the staged files; the composer awaits it before emitting, so a
/// send event always carries a fully resolved list.
pub trait AttachmentStage: Send {
    fn has_files(&self) -> bool;

    fn len(&self) -> usize;

    fn snapshot(&self) -> impl Future<Output = Vec<Attachment>> + Send;

    fn clear(&mut self);
}

/// Attachments staged by path and read from disk at send time.
#[derive(Debug, Default)]
pub struct StagedFiles {
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `path`; staging the same path twice is a no-op.
    pub fn stage(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl AttachmentStage for StagedFiles {
    fn has_files(&self) -> bool {
        !self.paths.is_empty()
    }

    fn len(&self) -> usize {
        self.paths.len()
    }

    /// Files that cannot be read are logged and left out.
    async fn snapshot(&self) -> Vec<Attachment> {
        let mut attachments = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            match read_attachment(path).await {
                Ok(attachment) => attachments.push(attachment),
                Err(err) => tracing::warn!("skipping attachment: {err}"),
            }
        }
        attachments
    }

    fn clear(&mut self) {
        self.paths.clear();
    }
}

async fn read_attachment(path: &Path) -> Result<Attachment, ChatlineError> {
    let data = tokio::fs::read(path)
        .await
        .map_err(|source| ChatlineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Attachment {
        name,
        path: path.to_path_buf(),
        content_type: guess_content_type(path).to_string(),
        data,
    })
}

fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("txt" | "log") => "text/plain",
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
