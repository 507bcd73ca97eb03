//! Output sink for rendered captures: stdout or a file.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct OutputSink {
    writer: Mutex<Box<dyn Write + Send>>,
    path: Option<PathBuf>,
}

impl OutputSink {
    /// `"stdout"` writes to standard output; anything else is created
    /// as a file. An unusable file is a startup error.
    pub fn open(target: &str) -> Result<Self> {
        if target == "stdout" {
            return Ok(Self {
                writer: Mutex::new(Box::new(io::stdout())),
                path: None,
            });
        }

        let file = File::create(target)
            .with_context(|| format!("failed to open output file {target}"))?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
            path: Some(PathBuf::from(target)),
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one rendered block. Write failures are logged, never
    /// fatal; captures keep flowing.
    pub async fn write_block(&self, text: &str) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer
            .write_all(text.as_bytes())
            .and_then(|()| writer.flush())
        {
            tracing::warn!("output write error: {e}");
        }
    }
}
