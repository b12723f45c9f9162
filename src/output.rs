use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where a run writes its translated image and, with `--debug-ocr`, the
/// box overlay and paragraph dump next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    image: PathBuf,
}

impl OutputPaths {
    /// Uses `output` when given, else `<input stem>.translated.<ext>` beside
    /// the input.
    pub fn resolve(input: &Path, output: Option<&Path>) -> Self {
        if let Some(output) = output {
            return Self {
                image: output.to_path_buf(),
            };
        }
        let dir = input.parent().unwrap_or_else(|| Path::new(""));
        let stem = input
            .file_stem()
            .and_then(|value| value.to_str())
            .map(sanitize_filename_component)
            .unwrap_or_else(|| "input".to_string());
        let ext = input
            .extension()
            .and_then(|value| value.to_str())
            .unwrap_or("png");
        Self {
            image: dir.join(format!("{}.translated.{}", stem, ext)),
        }
    }

    pub fn image(&self) -> &Path {
        &self.image
    }

    pub fn boxes(&self) -> PathBuf {
        self.sibling("boxes.png")
    }

    pub fn paragraphs(&self) -> PathBuf {
        self.sibling("paragraphs.json")
    }

    pub fn ensure_parent(&self) -> Result<()> {
        if let Some(dir) = self.image.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
        }
        Ok(())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .image
            .file_name()
            .map(|value| value.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.image.with_file_name(name)
    }
}

fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    for ch in value.chars() {
        if ch.is_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            out.push(ch);
        } else if ch.is_whitespace() {
            out.push('_');
        }
    }
    if out.is_empty() {
        "input".to_string()
    } else {
        out
    }
}
