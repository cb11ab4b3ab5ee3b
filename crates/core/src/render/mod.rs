//! Turns a diagram script into an image by shelling out to the `d2` binary.
//!
//! The script is staged in a temporary file that is removed on every path.
//! When the renderer is missing or fails, a copy of the script is kept next
//! to the requested output so the diagram can still be rendered by hand.

pub mod format;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;

pub use format::OutputFormat;

/// Binary looked up on `PATH` when none is configured.
pub const DEFAULT_BINARY: &str = "d2";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unsupported output format: {0} (expected one of .d2, .svg, .png, .pdf)")]
    UnsupportedFormat(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error(
        "renderer `{binary}` not found; diagram script saved to {}. Install D2 from https://d2lang.com and run `{binary} {} {}` to render it",
        .script.display(),
        .script.display(),
        .output.display()
    )]
    RendererNotFound {
        binary: String,
        script: PathBuf,
        output: PathBuf,
    },

    #[error("renderer failed ({status}), diagram script saved to {}: {output}", .script.display())]
    RendererFailed {
        status: ExitStatus,
        output: String,
        script: PathBuf,
    },
}

impl RenderError {
    /// Where the script was saved, for the recoverable failures.
    pub fn saved_script(&self) -> Option<&Path> {
        match self {
            RenderError::RendererNotFound { script, .. }
            | RenderError::RendererFailed { script, .. } => Some(script),
            _ => None,
        }
    }
}

/// Invokes the external renderer.
#[derive(Debug, Clone)]
pub struct Renderer {
    binary: String,
    layout: Option<String>,
    theme: Option<u32>,
}

impl Renderer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            layout: None,
            theme: None,
        }
    }

    /// Layout engine passed as `--layout`.
    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    /// Theme id passed as `--theme`.
    pub fn with_theme(mut self, theme: u32) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Render `script` to `output`, choosing the format from its extension.
    ///
    /// Returns the absolute path of the written file.
    pub fn render(&self, script: &str, output: &Path) -> Result<PathBuf, RenderError> {
        let format = OutputFormat::from_path(output)?;
        let output = std::path::absolute(output)?;

        if format == OutputFormat::D2 {
            fs::write(&output, script)?;
            tracing::info!(output = %output.display(), "wrote diagram script");
            return Ok(output);
        }

        let mut source = tempfile::Builder::new()
            .prefix("querygraph-")
            .suffix(".d2")
            .tempfile()?;
        source.write_all(script.as_bytes())?;
        source.flush()?;

        let mut command = Command::new(&self.binary);
        if let Some(layout) = &self.layout {
            command.arg("--layout").arg(layout);
        }
        if let Some(theme) = self.theme {
            command.arg("--theme").arg(theme.to_string());
        }
        command.arg(source.path()).arg(&output);

        let result = match command.output() {
            Ok(result) => result,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let saved = save_script(script, &output)?;
                tracing::warn!(binary = %self.binary, script = %saved.display(), "renderer not found");
                return Err(RenderError::RendererNotFound {
                    binary: self.binary.clone(),
                    script: saved,
                    output,
                });
            }
            Err(err) => return Err(err.into()),
        };

        if !result.status.success() {
            let mut captured = String::from_utf8_lossy(&result.stdout).into_owned();
            captured.push_str(&String::from_utf8_lossy(&result.stderr));
            let saved = save_script(script, &output)?;
            tracing::warn!(
                status = %result.status,
                script = %saved.display(),
                "renderer failed"
            );
            return Err(RenderError::RendererFailed {
                status: result.status,
                output: captured.trim().to_string(),
                script: saved,
            });
        }

        tracing::info!(output = %output.display(), %format, "rendered diagram");
        Ok(output)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

/// Keep the script beside the intended output under the same stem.
fn save_script(script: &str, output: &Path) -> Result<PathBuf, RenderError> {
    let path = output.with_extension(OutputFormat::D2.extension());
    fs::write(&path, script)?;
    Ok(path)
}
