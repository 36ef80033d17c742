//! Writes the page to a local file, e.g. under a web server's document root.

use super::Deliver;
use crate::error::DeliveryError;
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Deliver for FileSink {
    /// The subject is already the page `<title>`; only the body is written.
    async fn deliver(&self, _subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        fs::write(&self.path, html_body)
            .await
            .map_err(|source| DeliveryError::File {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_overwrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        let sink = FileSink::new(&path);

        sink.deliver("first", "<p>1</p>").await.unwrap();
        sink.deliver("second", "<p>2</p>").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>2</p>");
    }

    #[tokio::test]
    async fn test_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("missing").join("out.html"));
        let err = sink.deliver("s", "b").await.unwrap_err();
        assert!(matches!(err, DeliveryError::File { .. }));
    }
}
