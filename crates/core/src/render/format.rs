use std::fmt;
use std::path::Path;

use serde::Serialize;

use super::RenderError;

/// Output formats accepted by the render pipeline, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The diagram script itself; written without invoking the renderer.
    D2,
    Svg,
    Png,
    Pdf,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::D2,
        OutputFormat::Svg,
        OutputFormat::Png,
        OutputFormat::Pdf,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::D2 => "d2",
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
        }
    }

    /// Case-insensitive lookup by extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }

    /// Resolve the format of an output path. Touches nothing on disk.
    pub fn from_path(path: &Path) -> Result<Self, RenderError> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| RenderError::UnsupportedFormat(path.display().to_string()))
    }

    /// Whether the rendered bytes are text (script or SVG).
    pub fn is_text(self) -> bool {
        matches!(self, OutputFormat::D2 | OutputFormat::Svg)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_allowed_extensions() {
        assert_eq!(OutputFormat::from_path(Path::new("out.svg")).unwrap(), OutputFormat::Svg);
        assert_eq!(OutputFormat::from_path(Path::new("a/b.PNG")).unwrap(), OutputFormat::Png);
        assert_eq!(OutputFormat::from_path(Path::new("x.pdf")).unwrap(), OutputFormat::Pdf);
        assert_eq!(OutputFormat::from_path(Path::new("x.d2")).unwrap(), OutputFormat::D2);
    }

    #[test]
    fn rejects_other_extensions() {
        for path in ["out.gif", "out", "out.svg.bak", ".svg"] {
            let err = OutputFormat::from_path(Path::new(path)).unwrap_err();
            assert!(matches!(err, RenderError::UnsupportedFormat(_)), "{path}");
            assert!(err.to_string().starts_with("unsupported output format"));
        }
    }

    #[test]
    fn text_formats() {
        assert!(OutputFormat::Svg.is_text());
        assert!(!OutputFormat::Png.is_text());
        assert_eq!(OutputFormat::Pdf.to_string(), "pdf");
    }
}
