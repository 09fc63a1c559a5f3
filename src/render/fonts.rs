//! Font probing, measurement and glyph outlines.
//!
//! A [`FontBook`] is resolved once at startup from an ordered list of font
//! file candidates. For every requested pixel size the first file that can be
//! read and parsed wins; sizes with no loadable candidate use the built-in
//! block font. Probing never fails, it only degrades typography.
//!
//! Glyph outlines come from `skrifa` and are streamed into any
//! [`OutlinePen`] already translated into canvas space (y down), so backends
//! only have to fill the resulting contours.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;
use skrifa::instance::{LocationRef, Size};
use skrifa::outline::{DrawSettings, OutlinePen};
use skrifa::{FontRef, MetadataProvider};

/// Bold sans-serif faces commonly found on Linux hosts, in probe order.
pub const DEFAULT_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSansBold.ttf",
];

/// Advance of every built-in glyph, relative to the font size.
const BUILTIN_ADVANCE: f32 = 0.6;
/// Ascent of the built-in font, relative to the font size.
const BUILTIN_ASCENT: f32 = 0.8;
/// Height of a built-in glyph box, relative to the font size.
const BUILTIN_GLYPH_HEIGHT: f32 = 0.7;

/// Measures rendered text widths. The layout depends only on this.
pub trait TextMeasure {
    /// Width in pixels of `text` rendered at `size`.
    fn text_width(&self, text: &str, size: u32) -> f32;
}

/// One resolved face.
#[derive(Clone)]
pub enum FontFace {
    /// A scalable font loaded from disk.
    Outline { path: PathBuf, data: Arc<[u8]> },
    /// Fixed-advance block glyphs, used when nothing could be loaded.
    Builtin,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FontFace::Outline { path, data } => f
                .debug_struct("Outline")
                .field("path", path)
                .field("len", &data.len())
                .finish(),
            FontFace::Builtin => f.write_str("Builtin"),
        }
    }
}

impl FontFace {
    fn font_ref(&self) -> Option<FontRef<'_>> {
        match self {
            FontFace::Outline { data, .. } => FontRef::new(data).ok(),
            FontFace::Builtin => None,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, FontFace::Builtin)
    }

    /// Distance from the top of the line box to the baseline.
    pub fn ascent(&self, size: u32) -> f32 {
        match self.font_ref() {
            Some(font) => font.metrics(Size::new(size as f32), LocationRef::default()).ascent,
            None => size as f32 * BUILTIN_ASCENT,
        }
    }

    pub fn text_width(&self, text: &str, size: u32) -> f32 {
        let Some(font) = self.font_ref() else {
            return text.chars().count() as f32 * size as f32 * BUILTIN_ADVANCE;
        };

        let charmap = font.charmap();
        let glyph_metrics = font.glyph_metrics(Size::new(size as f32), LocationRef::default());
        text.chars()
            .map(|ch| {
                let gid = charmap.map(ch).unwrap_or_default();
                glyph_metrics.advance_width(gid).unwrap_or_default()
            })
            .sum()
    }

    /// Streams the contours of `text` into `pen`, with the line box's
    /// top-left corner at `(x, top)`.
    pub fn draw_text(&self, text: &str, size: u32, x: f32, top: f32, pen: &mut impl OutlinePen) {
        let baseline = top + self.ascent(size);

        let Some(font) = self.font_ref() else {
            draw_builtin(text, size, x, baseline, pen);
            return;
        };

        let px = Size::new(size as f32);
        let charmap = font.charmap();
        let glyph_metrics = font.glyph_metrics(px, LocationRef::default());
        let outlines = font.outline_glyphs();

        let mut pen_x = x;
        for ch in text.chars() {
            let gid = charmap.map(ch).unwrap_or_default();
            if let Some(glyph) = outlines.get(gid) {
                let mut placed = PlacedPen { inner: &mut *pen, dx: pen_x, baseline };
                if let Err(e) = glyph.draw(DrawSettings::unhinted(px, LocationRef::default()), &mut placed) {
                    log::debug!("Cannot draw glyph {:?} for {:?}: {}", gid, ch, e);
                }
            }
            pen_x += glyph_metrics.advance_width(gid).unwrap_or_default();
        }
    }
}

/// Block glyphs: one box per visible character.
fn draw_builtin(text: &str, size: u32, x: f32, baseline: f32, pen: &mut impl OutlinePen) {
    let advance = size as f32 * BUILTIN_ADVANCE;
    let height = size as f32 * BUILTIN_GLYPH_HEIGHT;
    let inset = advance * 0.1;

    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let x0 = x + i as f32 * advance + inset;
        let x1 = x0 + advance - 2.0 * inset;
        let y0 = baseline - height;
        pen.move_to(x0, y0);
        pen.line_to(x1, y0);
        pen.line_to(x1, baseline);
        pen.line_to(x0, baseline);
        pen.close();
    }
}

/// Translates font units (y up, origin on the baseline) into canvas space.
struct PlacedPen<'a, P: OutlinePen> {
    inner: &'a mut P,
    dx: f32,
    baseline: f32,
}

impl<P: OutlinePen> OutlinePen for PlacedPen<'_, P> {
    fn move_to(&mut self, x: f32, y: f32) {
        self.inner.move_to(self.dx + x, self.baseline - y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.inner.line_to(self.dx + x, self.baseline - y);
    }

    fn quad_to(&mut self, cx0: f32, cy0: f32, x: f32, y: f32) {
        self.inner
            .quad_to(self.dx + cx0, self.baseline - cy0, self.dx + x, self.baseline - y);
    }

    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.inner.curve_to(
            self.dx + cx0,
            self.baseline - cy0,
            self.dx + cx1,
            self.baseline - cy1,
            self.dx + x,
            self.baseline - y,
        );
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Size-indexed cache of resolved faces.
#[derive(Clone, Debug, Default)]
pub struct FontBook {
    faces: HashMap<u32, FontFace>,
}

static BUILTIN: FontFace = FontFace::Builtin;

impl FontBook {
    /// A book that only knows the built-in font.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Probes `candidates` in order for every size in `sizes`.
    pub fn probe<P: AsRef<Path>>(candidates: &[P], sizes: &[u32]) -> Self {
        // Each file is read at most once, failures included.
        let mut loaded: HashMap<PathBuf, Option<Arc<[u8]>>> = HashMap::new();
        let mut faces = HashMap::new();

        for &size in sizes {
            let mut chosen = None;
            for candidate in candidates {
                let path = candidate.as_ref();
                let data = loaded
                    .entry(path.to_path_buf())
                    .or_insert_with(|| load_font_file(path))
                    .clone();
                if let Some(data) = data {
                    chosen = Some(FontFace::Outline { path: path.to_path_buf(), data });
                    break;
                }
            }

            match chosen {
                Some(face) => {
                    log::debug!("Font size {} resolved to {:?}", size, face);
                    faces.insert(size, face);
                }
                None => log::warn!("No usable font for size {}, using built-in glyphs", size),
            }
        }

        Self { faces }
    }

    /// Face for `size`; sizes that were never probed use the built-in font.
    pub fn face(&self, size: u32) -> &FontFace {
        self.faces.get(&size).unwrap_or(&BUILTIN)
    }
}

impl TextMeasure for FontBook {
    fn text_width(&self, text: &str, size: u32) -> f32 {
        self.face(size).text_width(text, size)
    }
}

fn load_font_file(path: &Path) -> Option<Arc<[u8]>> {
    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            log::debug!("Font {:?} not readable: {}", path, e);
            return None;
        }
    };

    if let Err(e) = FontRef::new(&data) {
        log::debug!("Font {:?} not parseable: {}", path, e);
        return None;
    }

    Some(data.into())
}
