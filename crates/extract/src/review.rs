use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use paisa_mail::DecodedEmail;

/// Append-only log of bodies no rule matched. Silent loss of unrecognized
/// formats is unacceptable: these entries are the input for authoring the
/// next rule.
pub struct ReviewLog {
    path: PathBuf,
}

impl ReviewLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, email: &DecodedEmail) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "Sender: {}", email.sender)?;
        writeln!(file, "Subject: {}", email.subject)?;
        writeln!(file, "Body: {}", email.body)?;
        writeln!(file, "{}", "=".repeat(80))?;
        tracing::info!(subject = %email.subject, "no rule matched; body recorded for review");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(subject: &str, body: &str) -> DecodedEmail {
        DecodedEmail {
            subject: subject.to_string(),
            body: body.to_string(),
            sender: "alerts@newbank.example".to_string(),
            timestamp: None,
        }
    }

    #[test]
    fn records_are_appended() {
        let tmp = tempfile::tempdir().unwrap();
        let log = ReviewLog::new(tmp.path().join("review.log"));

        log.record(&email("First", "INR 10.00 moved somehow")).unwrap();
        log.record(&email("Second", "INR 20.00 moved somehow")).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert!(contents.contains("Subject: First"));
        assert!(contents.contains("Subject: Second"));
        assert!(contents.contains("Sender: alerts@newbank.example"));
        let first = contents.find("First").unwrap();
        let second = contents.find("Second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn creates_file_on_first_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested.log");
        assert!(!path.exists());
        ReviewLog::new(&path).record(&email("s", "b")).unwrap();
        assert!(path.exists());
    }
}
