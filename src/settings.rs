use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::color::{DEFAULT_CLUSTERS, DEFAULT_COLOR_WEIGHT};
use crate::ocr::{DEFAULT_BLOCK_THRESHOLD, DEFAULT_SENTENCE_THRESHOLD};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub source_lang: String,
    pub target_lang: String,
    pub ocr_languages: String,
    pub sentence_threshold: f32,
    pub block_threshold: f32,
    pub color_weight: u8,
    pub color_clusters: usize,
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub font_weight: f32,
    pub translator: Option<String>,
    pub libre_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "ko".to_string(),
            ocr_languages: "eng".to_string(),
            sentence_threshold: DEFAULT_SENTENCE_THRESHOLD,
            block_threshold: DEFAULT_BLOCK_THRESHOLD,
            color_weight: DEFAULT_COLOR_WEIGHT,
            color_clusters: DEFAULT_CLUSTERS,
            font_path: None,
            font_family: None,
            font_weight: 1.2,
            translator: None,
            libre_url: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    system: Option<SystemSettings>,
    ocr: Option<OcrSettings>,
    color: Option<ColorSettings>,
    render: Option<RenderSettings>,
    translator: Option<TranslatorSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct SystemSettings {
    source_lang: Option<String>,
    target_lang: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<String>,
    sentence_threshold: Option<f32>,
    block_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ColorSettings {
    weight: Option<u8>,
    clusters: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_path: Option<String>,
    font_family: Option<String>,
    font_weight: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatorSettings {
    provider: Option<String>,
    libre_url: Option<String>,
}

/// Built-in defaults, then `./settings.toml`, `./settings.local.toml`, the
/// two files under `~/.image-text-translator/`, then `extra_path`. Later
/// layers win key by key.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(defaults);
    ensure_home_settings_file()?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(system) = incoming.system {
            merge_string(&mut self.source_lang, system.source_lang);
            merge_string(&mut self.target_lang, system.target_lang);
        }
        if let Some(ocr) = incoming.ocr {
            merge_string(&mut self.ocr_languages, ocr.languages);
            if let Some(value) = ocr.sentence_threshold {
                self.sentence_threshold = value;
            }
            if let Some(value) = ocr.block_threshold
                && value > 0.0
            {
                self.block_threshold = value;
            }
        }
        if let Some(color) = incoming.color {
            if let Some(weight) = color.weight {
                self.color_weight = weight;
            }
            if let Some(clusters) = color.clusters
                && clusters > 0
            {
                self.color_clusters = clusters;
            }
        }
        if let Some(render) = incoming.render {
            merge_optional(&mut self.font_path, render.font_path);
            merge_optional(&mut self.font_family, render.font_family);
            if let Some(weight) = render.font_weight
                && weight > 0.0
            {
                self.font_weight = weight;
            }
        }
        if let Some(translator) = incoming.translator {
            merge_optional(&mut self.translator, translator.provider);
            merge_optional(&mut self.libre_url, translator.libre_url);
        }
    }
}

fn merge_string(target: &mut String, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *target = value.trim().to_string();
    }
}

fn merge_optional(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value
        && !value.trim().is_empty()
    {
        *target = Some(value.trim().to_string());
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".image-text-translator"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn built_in_defaults_are_loaded() {
        with_temp_home(|_| {
            let settings = load_settings(None).unwrap();
            assert_eq!(settings.ocr_languages, "eng");
            assert_eq!(settings.sentence_threshold, 50.0);
            assert_eq!(settings.block_threshold, 1.5);
            assert_eq!(settings.color_weight, 30);
            assert_eq!(settings.font_weight, 1.2);
            assert_eq!(settings.translator, None);
            assert_eq!(settings.libre_url.as_deref(), Some("http://localhost:5000"));
        });
    }

    #[test]
    fn home_settings_file_is_created() {
        with_temp_home(|home| {
            load_settings(None).unwrap();
            let path = home.join(".image-text-translator").join("settings.toml");
            let content = fs::read_to_string(path).unwrap();
            assert!(content.contains("[translator]"));
        });
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        with_temp_home(|home| {
            let dir = home.join(".image-text-translator");
            fs::create_dir_all(&dir).unwrap();
            fs::write(
                dir.join("settings.local.toml"),
                "[system]\ntarget_lang = \"ja\"\n[color]\nweight = 45\n",
            )
            .unwrap();

            let extra = tempfile::NamedTempFile::new().unwrap();
            fs::write(
                extra.path(),
                "[system]\ntarget_lang = \"fr\"\n[render]\nfont_path = \"fonts/gulim.ttc\"\n",
            )
            .unwrap();

            let settings = load_settings(Some(extra.path())).unwrap();
            assert_eq!(settings.target_lang, "fr");
            assert_eq!(settings.color_weight, 45);
            assert_eq!(settings.font_path.as_deref(), Some("fonts/gulim.ttc"));
            assert_eq!(settings.source_lang, "en");
        });
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        with_temp_home(|home| {
            let missing = home.join("nope.toml");
            assert!(load_settings(Some(&missing)).is_err());
        });
    }

    #[test]
    fn blank_values_do_not_clear_settings() {
        let mut settings = Settings::default();
        let parsed: SettingsFile =
            toml::from_str("[system]\nsource_lang = \"  \"\n[ocr]\nblock_threshold = 0\n").unwrap();
        settings.merge(parsed);
        assert_eq!(settings.source_lang, "en");
        assert_eq!(settings.block_threshold, 1.5);
    }
}
