use anyhow::{Context, Result, anyhow};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

const BINARY: &str = "tesseract";

/// Runs the tesseract binary and returns its stdout. `what` names the
/// invocation in error messages.
fn capture<I, S>(what: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(BINARY);
    command.args(args);
    debug!("running {:?}", command);
    let output = command
        .output()
        .with_context(|| format!("failed to run {} (is it installed?)", what))?;
    if !output.status.success() {
        return Err(anyhow!(
            "{} failed: {}",
            what,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn list_tesseract_languages() -> Result<Vec<String>> {
    let stdout = capture("tesseract --list-langs", ["--list-langs"])?;
    Ok(parse_language_list(&stdout))
}

// first line is the "List of available languages" banner
fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default, PartialEq)]
struct LanguageSelection {
    installed: Vec<String>,
    missing: Vec<String>,
}

impl LanguageSelection {
    /// Splits a `eng+kor`, `eng,kor` or `eng kor` request against the
    /// installed language packs.
    fn against(requested: &str, available: &[String]) -> Self {
        requested
            .split(['+', ',', ' '])
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .fold(Self::default(), |mut selection, lang| {
                let bucket = if available.iter().any(|value| value == lang) {
                    &mut selection.installed
                } else {
                    &mut selection.missing
                };
                bucket.push(lang.to_string());
                selection
            })
    }

    fn into_argument(self, available: &[String]) -> Result<String> {
        let report = || {
            format!(
                "ocr language(s) not available: {} (available: {})",
                self.missing.join(", "),
                available.join(", ")
            )
        };
        if self.installed.is_empty() {
            return Err(anyhow!(report()));
        }
        if !self.missing.is_empty() {
            warn!("{}", report());
        }
        Ok(self.installed.join("+"))
    }
}

/// Restricts the requested languages to installed ones. When tesseract
/// cannot list its languages the request is passed through untouched.
pub(super) fn normalize_ocr_languages(requested: &str) -> Result<String> {
    let requested = requested.trim();
    if requested.is_empty() {
        return Err(anyhow!("ocr languages is empty"));
    }
    match list_tesseract_languages() {
        Ok(available) => LanguageSelection::against(requested, &available).into_argument(&available),
        Err(err) => {
            debug!("cannot list tesseract languages, using request as is: {:#}", err);
            Ok(requested.to_string())
        }
    }
}

pub(super) fn run_tesseract_tsv(path: &Path, languages: &str, psm: u32) -> Result<String> {
    let psm = psm.to_string();
    capture(
        "tesseract",
        [
            path.as_os_str(),
            OsStr::new("stdout"),
            OsStr::new("-l"),
            OsStr::new(languages),
            OsStr::new("--psm"),
            OsStr::new(&psm),
            OsStr::new("tsv"),
        ],
    )
}
