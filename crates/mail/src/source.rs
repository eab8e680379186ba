use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::decode::decode_message;

/// One raw message as fetched from the mailbox, owned transiently by the
/// pipeline. Discarded after decoding.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Protocol-level identifier (IMAP uid, file name, ...).
    pub id: String,
    pub mailbox: String,
    pub bytes: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("mail source io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("mail source already closed")]
    Closed,
}

/// The external mail collaborator's interface: fetch raw blobs for a time
/// window and keyword filter, and close the connection. The real protocol
/// client lives outside this workspace.
pub trait MailSource {
    fn fetch(
        &mut self,
        since: NaiveDate,
        keywords: &[String],
    ) -> Result<Vec<RawMessage>, SourceError>;

    fn logout(&mut self) -> Result<(), SourceError>;
}

/// Directory-of-`.eml` source. Stands in for the mailbox in deployments that
/// drop exported messages into an intake folder, and in tests.
pub struct DirSource {
    dir: PathBuf,
    open: bool,
}

impl DirSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            open: true,
        }
    }

    fn matches(raw: &[u8], since: NaiveDate, keywords: &[String]) -> bool {
        let email = decode_message(raw);
        if let Some(ts) = email.timestamp {
            if ts.date_naive() < since {
                return false;
            }
        }
        if keywords.is_empty() {
            return true;
        }
        let haystack = format!("{} {}", email.subject, email.body).to_lowercase();
        keywords
            .iter()
            .any(|k| haystack.contains(&k.to_lowercase()))
    }
}

impl MailSource for DirSource {
    fn fetch(
        &mut self,
        since: NaiveDate,
        keywords: &[String],
    ) -> Result<Vec<RawMessage>, SourceError> {
        if !self.open {
            return Err(SourceError::Closed);
        }
        let mailbox = self.dir.display().to_string();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "eml"))
            .collect();
        // Stable processing order regardless of directory iteration order.
        entries.sort();

        let mut messages = Vec::new();
        for path in entries {
            let bytes = std::fs::read(&path)?;
            if !Self::matches(&bytes, since, keywords) {
                continue;
            }
            let id = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            messages.push(RawMessage {
                id,
                mailbox: mailbox.clone(),
                bytes,
            });
        }
        tracing::debug!(count = messages.len(), dir = %mailbox, "fetched raw messages");
        Ok(messages)
    }

    fn logout(&mut self) -> Result<(), SourceError> {
        self.open = false;
        Ok(())
    }
}
