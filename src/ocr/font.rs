use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::{Face, name_id};
use usvg::fontdb;

const DEFAULT_ASCENT: f32 = 0.8;

/// Face the translated text is drawn with: the family name the SVG refers
/// to, the ascender used to place the baseline, and the raw font bytes handed
/// to the rasterizer.
#[derive(Clone)]
pub struct OverlayFont {
    family: String,
    ascent: f32,
    data: Arc<Vec<u8>>,
}

impl std::fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayFont")
            .field("family", &self.family)
            .field("ascent", &self.ascent)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl OverlayFont {
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font: {}", path.display()))?;
        Self::from_data(data, 0, None)
            .with_context(|| format!("failed to parse font: {}", path.display()))
    }

    /// Parses face `index` of `data`, falling back to the first face that
    /// parses when a collection does not have it.
    fn from_data(data: Vec<u8>, index: u32, family_hint: Option<&str>) -> Result<Self> {
        let faces = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        let face = Face::parse(&data, index)
            .ok()
            .or_else(|| (0..faces).find_map(|idx| Face::parse(&data, idx).ok()))
            .ok_or_else(|| anyhow!("no readable face in font data"))?;

        let family = family_name(&face)
            .or_else(|| family_hint.map(str::to_string))
            .unwrap_or_else(|| "sans-serif".to_string());
        let ascent = match face.ascender() {
            value if value > 0 => value as f32 / face.units_per_em().max(1) as f32,
            _ => DEFAULT_ASCENT,
        };
        Ok(Self {
            family,
            ascent,
            data: Arc::new(data),
        })
    }

    #[cfg(test)]
    pub(crate) fn named(family: &str, ascent: f32) -> Self {
        Self {
            family: family.to_string(),
            ascent,
            data: Arc::default(),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    /// Ascender height as a fraction of the em size.
    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }
}

/// An explicit font file wins. Otherwise `family` is looked up among the
/// system fonts, and only without one are the `fallback` families tried in
/// order.
pub fn resolve_overlay_font(
    path: Option<&Path>,
    family: Option<&str>,
    fallback: &[&str],
) -> Result<OverlayFont> {
    if let Some(path) = path {
        return OverlayFont::from_file(path);
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(family) = family {
        return system_font(&db, family);
    }
    fallback
        .iter()
        .find_map(|candidate| system_font(&db, candidate).ok())
        .ok_or_else(|| anyhow!("none of the fonts {} is installed", fallback.join(", ")))
}

fn system_font(db: &fontdb::Database, family: &str) -> Result<OverlayFont> {
    let families = [if family.eq_ignore_ascii_case("sans-serif") {
        fontdb::Family::SansSerif
    } else {
        fontdb::Family::Name(family)
    }];
    let id = db
        .query(&fontdb::Query {
            families: &families,
            ..Default::default()
        })
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    OverlayFont::from_data(data, index, Some(family))
}

fn family_name(face: &Face<'_>) -> Option<String> {
    let lookup = |id: u16| {
        face.names()
            .into_iter()
            .filter(|name| name.name_id == id)
            .find_map(|name| name.to_string())
    };
    lookup(name_id::TYPOGRAPHIC_FAMILY).or_else(|| lookup(name_id::FAMILY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = resolve_overlay_font(Some(Path::new("/nonexistent/font.ttf")), None, &[])
            .unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read font"));
    }

    #[test]
    fn non_font_bytes_are_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"definitely not a font").unwrap();
        assert!(OverlayFont::from_file(file.path()).is_err());
    }

    #[test]
    fn empty_fallback_list_finds_nothing() {
        assert!(resolve_overlay_font(None, None, &[]).is_err());
    }
}
