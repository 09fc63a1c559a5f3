//! Chalkboard layout.
//!
//! [`layout`] turns a [`RenderRequest`] into a [`RenderList`] by walking a
//! vertical cursor down the canvas: frame, title, expression, label lines,
//! dot diagram, hint footer and finally the chalk speckles. The function is
//! pure: the only inputs are the request, the [`BoardConfig`] and a
//! [`TextMeasure`], and the speckles come from a generator seeded from the
//! config. [`BoardRenderer`] pairs the layout with the raster backend and
//! the PNG encoder.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tutorboard::render::{BoardConfig, BoardRenderer, FontBook, Operation, RenderRequest};
//!
//! let renderer = BoardRenderer::new(BoardConfig::default(), Arc::new(FontBook::builtin())).unwrap();
//! let req = RenderRequest::new("10 dividido por 2", vec![10, 2], Operation::Quotient);
//! let png = renderer.render_png(&req).unwrap();
//! assert_eq!(&png[1..4], b"PNG");
//! ```

use std::fmt;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::render::backend::{RenderBackend, RgbImage, SurfaceSize};
use crate::render::backends::raster::RasterBackend;
use crate::render::fonts::{FontBook, TextMeasure};
use crate::render::{Color, DisplayItem, RenderError, RenderList};

/// The arithmetic operation shown on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    Sum,
    Difference,
    Product,
    Quotient,
    #[default]
    Unknown,
}

impl Operation {
    /// Resolves an operation name. Portuguese and English names are accepted,
    /// anything else is [`Operation::Unknown`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "soma" | "sum" => Operation::Sum,
            "subtração" | "subtracao" | "difference" => Operation::Difference,
            "multiplicação" | "multiplicacao" | "product" => Operation::Product,
            "divisão" | "divisao" | "quotient" => Operation::Quotient,
            _ => Operation::Unknown,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Sum => "+",
            Operation::Difference => "\u{2212}",
            Operation::Product => "\u{00d7}",
            Operation::Quotient => "\u{00f7}",
            Operation::Unknown => "?",
        }
    }
}

/// Everything the board shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderRequest {
    /// Free text, may span several lines.
    pub label_text: String,
    pub operands: Vec<i64>,
    pub operation: Operation,
    /// Footer hint; empty means no footer.
    pub hint_text: String,
}

impl RenderRequest {
    pub fn new(label_text: impl Into<String>, operands: Vec<i64>, operation: Operation) -> Self {
        Self {
            label_text: label_text.into(),
            operands,
            operation,
            hint_text: String::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint_text = hint.into();
        self
    }
}

/// Colors, sizes and spacing of the board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    pub width: u32,
    pub height: u32,
    /// Thickness of the wooden frame.
    pub border: u32,
    pub background: Color,
    pub frame_color: Color,
    pub inner_frame_color: Color,
    pub inner_frame_width: f32,

    pub title_text: String,
    pub title_color: Color,
    pub title_size: u32,
    pub expression_color: Color,
    pub expression_size: u32,
    pub text_color: Color,
    pub text_size: u32,
    pub max_label_lines: usize,
    pub hint_color: Color,
    pub hint_size: u32,
    pub hint_line_height: f32,

    pub second_dot_color: Color,
    pub dot_radius: f32,
    pub dot_spacing: f32,
    /// Gap on each side of a cluster separator.
    pub cluster_padding: f32,
    /// Dot diagrams are only drawn up to this many dots.
    pub max_dots: i64,

    pub seed: u64,
    pub speckles: usize,
    pub speckle_alpha_min: u8,
    pub speckle_alpha_max: u8,
    /// Blend speckles with their drawn alpha. When off they are plain white
    /// and the alpha is still drawn, so positions do not depend on this flag.
    pub speckle_blend: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            border: 20,
            background: Color::rgb(34, 60, 34),
            frame_color: Color::rgb(139, 90, 43),
            inner_frame_color: Color::rgb(60, 90, 60),
            inner_frame_width: 2.0,

            title_text: "Professor IA - Lousa".to_string(),
            title_color: Color::rgb(173, 216, 230),
            title_size: 28,
            expression_color: Color::rgb(255, 255, 100),
            expression_size: 52,
            text_color: Color::rgb(255, 255, 255),
            text_size: 20,
            max_label_lines: 3,
            hint_color: Color::rgb(200, 200, 200),
            hint_size: 16,
            hint_line_height: 22.0,

            second_dot_color: Color::rgb(255, 180, 100),
            dot_radius: 12.0,
            dot_spacing: 30.0,
            cluster_padding: 15.0,
            max_dots: 30,

            seed: 42,
            speckles: 200,
            speckle_alpha_min: 5,
            speckle_alpha_max: 25,
            speckle_blend: false,
        }
    }
}

impl BoardConfig {
    pub fn builder() -> BoardConfigBuilder {
        BoardConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), BoardConfigError> {
        validate(self)
    }

    /// Font sizes the board uses, for probing.
    pub fn font_sizes(&self) -> [u32; 4] {
        [self.title_size, self.expression_size, self.text_size, self.hint_size]
    }

    /// Widest a hint line may get.
    pub fn hint_max_width(&self) -> f32 {
        self.width as f32 - 2.0 * self.border as f32 - 60.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoardConfigBuilder {
    inner: BoardConfig,
}

impl BoardConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut BoardConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn size(self, width: u32, height: u32) -> Self { self.map(|c| { c.width = width; c.height = height; }) }
    pub fn border(self, px: u32) -> Self { self.map(|c| c.border = px) }
    pub fn background(self, color: Color) -> Self { self.map(|c| c.background = color) }
    pub fn title<S: Into<String>>(self, text: S) -> Self { self.map(|c| c.title_text = text.into()) }
    pub fn title_size(self, px: u32) -> Self { self.map(|c| c.title_size = px) }
    pub fn expression_size(self, px: u32) -> Self { self.map(|c| c.expression_size = px) }
    pub fn text_size(self, px: u32) -> Self { self.map(|c| c.text_size = px) }
    pub fn hint_size(self, px: u32) -> Self { self.map(|c| c.hint_size = px) }
    pub fn max_dots(self, n: i64) -> Self { self.map(|c| c.max_dots = n) }
    pub fn seed(self, seed: u64) -> Self { self.map(|c| c.seed = seed) }
    pub fn speckles(self, n: usize) -> Self { self.map(|c| c.speckles = n) }
    pub fn speckle_alpha(self, min: u8, max: u8) -> Self { self.map(|c| { c.speckle_alpha_min = min; c.speckle_alpha_max = max; }) }
    pub fn speckle_blend(self, on: bool) -> Self { self.map(|c| c.speckle_blend = on) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut BoardConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<BoardConfig, BoardConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum BoardConfigError {
    CanvasTooSmall { width: u32, height: u32, border: u32 },
    ZeroFontSize(&'static str),
    SpeckleAlpha { min: u8, max: u8 },
    DotGeometry,
}

impl fmt::Display for BoardConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardConfigError::CanvasTooSmall { width, height, border } =>
                write!(f, "canvas {width}x{height} leaves no room inside a {border}px border"),
            BoardConfigError::ZeroFontSize(which) =>
                write!(f, "{which} font size must be at least 1"),
            BoardConfigError::SpeckleAlpha { min, max } =>
                write!(f, "speckle alpha range {min}..={max} is empty"),
            BoardConfigError::DotGeometry =>
                write!(f, "dot radius and spacing must be positive"),
        }
    }
}
impl std::error::Error for BoardConfigError {}

fn validate(c: &BoardConfig) -> Result<(), BoardConfigError> {
    // The speckle range is border+5 ..= size-border-5 and the hint needs a positive width.
    let min_side = 2 * c.border + 70;
    if c.width < min_side || c.height < min_side {
        return Err(BoardConfigError::CanvasTooSmall { width: c.width, height: c.height, border: c.border });
    }
    for (name, size) in [
        ("title", c.title_size),
        ("expression", c.expression_size),
        ("text", c.text_size),
        ("hint", c.hint_size),
    ] {
        if size == 0 {
            return Err(BoardConfigError::ZeroFontSize(name));
        }
    }
    if c.speckle_alpha_min > c.speckle_alpha_max {
        return Err(BoardConfigError::SpeckleAlpha { min: c.speckle_alpha_min, max: c.speckle_alpha_max });
    }
    if c.dot_radius <= 0.0 || c.dot_spacing <= 0.0 {
        return Err(BoardConfigError::DotGeometry);
    }
    Ok(())
}

/// The big line in the middle of the board, e.g. `"10 ÷ 2 = ?"`.
pub fn expression_string(req: &RenderRequest) -> String {
    let symbol = req.operation.symbol();
    match req.operands.as_slice() {
        [a, b, ..] => format!("{a} {symbol} {b} = ?"),
        [a] => format!("{a} {symbol} ? = ?"),
        [] if req.label_text.is_empty() => "?".to_string(),
        [] => req.label_text.clone(),
    }
}

/// Greedy word wrap. Words are separated by any whitespace; a word is moved
/// to a new line as soon as appending it would exceed `max_width`. A single
/// word wider than `max_width` gets a line of its own.
pub fn wrap_words<M: TextMeasure + ?Sized>(measure: &M, text: &str, size: u32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let candidate = if line.is_empty() { word.to_string() } else { format!("{line} {word}") };
        if measure.text_width(&candidate, size) > max_width {
            // An overflowing first word starts the text; no blank line before it.
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            line = word.to_string();
        } else {
            line = candidate;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// One row of the dot diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct DotRow {
    pub color: Color,
    /// Center line of the row.
    pub y: f32,
    /// Number of dots in each cluster that was drawn.
    pub clusters: Vec<i64>,
}

impl DotRow {
    pub fn total(&self) -> i64 {
        self.clusters.iter().sum()
    }
}

/// Result of laying out a board, before rasterization.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardLayout {
    pub list: RenderList,
    pub expression: String,
    pub label_lines: Vec<String>,
    pub dot_rows: Vec<DotRow>,
    pub hint_lines: Vec<String>,
}

/// Lays out a board for `req`.
pub fn layout<M: TextMeasure + ?Sized>(config: &BoardConfig, measure: &M, req: &RenderRequest) -> BoardLayout {
    let mut b = LayoutPass {
        config,
        measure,
        list: RenderList::new(),
        dot_rows: Vec::new(),
    };

    let width = config.width as f32;
    let height = config.height as f32;
    let border = config.border as f32;

    // Frame
    b.list.add_command(DisplayItem::Clear { color: config.background });
    b.list.add_frame(0.0, 0.0, width, height, border, config.frame_color);
    b.list.add_frame(
        border,
        border,
        width - 2.0 * border,
        height - 2.0 * border,
        config.inner_frame_width,
        config.inner_frame_color,
    );

    let mut y = border + 30.0;

    // Title
    b.centered_text(&config.title_text, y, config.title_size, config.title_color);
    y += 50.0;
    b.divider(y, 2.0, config.title_color);
    y += 30.0;

    // Expression
    let expression = expression_string(req);
    b.centered_text(&expression, y, config.expression_size, config.expression_color);
    y += 80.0;

    // Label
    let mut label_lines = Vec::new();
    if !req.label_text.is_empty() && req.label_text != expression {
        for line in req.label_text.split('\n').take(config.max_label_lines) {
            b.centered_text(line, y, config.text_size, config.text_color);
            label_lines.push(line.to_string());
            y += 30.0;
        }
    }
    y += 20.0;

    // Dots
    let dots_x = border + 60.0;
    match (req.operation, req.operands.as_slice()) {
        (Operation::Quotient | Operation::Product, [total, rest @ ..]) => {
            let groups = rest.first().copied().unwrap_or(1);
            // Multiplication shares the branch but never draws.
            if req.operation == Operation::Quotient && groups > 0 && *total <= config.max_dots {
                b.dots(*total, groups, dots_x, y, config.expression_color);
                y += 50.0;
            }
        }
        (Operation::Sum, [first, rest @ ..]) => {
            let sum: i128 = req.operands.iter().map(|&n| n as i128).sum();
            if sum <= config.max_dots as i128 {
                b.dots(*first, 1, dots_x, y, config.expression_color);
                y += 40.0;
                if let Some(&second) = rest.first() {
                    b.dots(second, 1, dots_x, y, config.second_dot_color);
                    y += 40.0;
                }
            }
        }
        _ => {}
    }

    // Hint
    let mut hint_lines = Vec::new();
    if !req.hint_text.is_empty() {
        y = y.max(height - border - 80.0);
        b.divider(y, 1.0, config.inner_frame_color);
        y += 10.0;

        let text = format!("Dica: {}", req.hint_text);
        hint_lines = wrap_words(measure, &text, config.hint_size, config.hint_max_width());
        for line in &hint_lines {
            b.list.add_command(DisplayItem::TextRun {
                x: border + 40.0,
                y,
                text: line.clone(),
                size: config.hint_size,
                color: config.hint_color,
            });
            y += config.hint_line_height;
        }
    }

    b.speckles();

    BoardLayout {
        list: b.list,
        expression,
        label_lines,
        dot_rows: b.dot_rows,
        hint_lines,
    }
}

struct LayoutPass<'a, M: TextMeasure + ?Sized> {
    config: &'a BoardConfig,
    measure: &'a M,
    list: RenderList,
    dot_rows: Vec<DotRow>,
}

impl<M: TextMeasure + ?Sized> LayoutPass<'_, M> {
    fn centered_text(&mut self, text: &str, y: f32, size: u32, color: Color) {
        let w = self.measure.text_width(text, size);
        self.list.add_command(DisplayItem::TextRun {
            x: (self.config.width as f32 - w) / 2.0,
            y,
            text: text.to_string(),
            size,
            color,
        });
    }

    fn divider(&mut self, y: f32, width: f32, color: Color) {
        let inset = self.config.border as f32 + 30.0;
        self.list.add_command(DisplayItem::Line {
            x0: inset,
            y0: y,
            x1: self.config.width as f32 - inset,
            y1: y,
            width,
            color,
        });
    }

    /// Draws `count` dots split into `groups` clusters of `ceil(count / groups)`.
    fn dots(&mut self, count: i64, groups: i64, x0: f32, y: f32, color: Color) {
        let c = self.config;
        let mut clusters = Vec::new();

        if count > 0 && groups > 0 {
            let per_group = count / groups + i64::from(count % groups != 0);
            // Anything past the right edge is invisible.
            let limit = c.width as f32 + c.dot_radius;
            let mut x = x0;
            let mut drawn = 0;

            'groups: for g in 0..groups {
                let mut in_cluster = 0;
                while in_cluster < per_group && drawn < count {
                    if x - c.dot_radius > limit {
                        if in_cluster > 0 {
                            clusters.push(in_cluster);
                        }
                        break 'groups;
                    }
                    self.list.add_command(DisplayItem::Ellipse {
                        cx: x,
                        cy: y,
                        radius: c.dot_radius,
                        fill: color,
                        outline: c.text_color,
                        outline_width: 1.0,
                    });
                    x += c.dot_spacing;
                    drawn += 1;
                    in_cluster += 1;
                }
                clusters.push(in_cluster);

                if drawn >= count {
                    break;
                }
                if g < groups - 1 {
                    x += c.cluster_padding;
                    self.list.add_command(DisplayItem::Line {
                        x0: x,
                        y0: y - 20.0,
                        x1: x,
                        y1: y + 20.0,
                        width: 2.0,
                        color: c.text_color,
                    });
                    x += c.cluster_padding;
                }
            }
        }

        self.dot_rows.push(DotRow { color, y, clusters });
    }

    fn speckles(&mut self) {
        let c = self.config;
        let mut rng = ChaCha8Rng::seed_from_u64(c.seed);
        let inset = c.border as i32 + 5;
        let max_x = c.width as i32 - inset;
        let max_y = c.height as i32 - inset;

        for _ in 0..c.speckles {
            let x = rng.random_range(inset..=max_x);
            let y = rng.random_range(inset..=max_y);
            let alpha = rng.random_range(c.speckle_alpha_min..=c.speckle_alpha_max);
            let white = Color::rgb(255, 255, 255);
            self.list.add_command(DisplayItem::Point {
                x,
                y,
                color: if c.speckle_blend { white.with_alpha(alpha) } else { white },
            });
        }
    }
}

/// Lays out and rasterizes boards. Cheap to share between threads.
#[derive(Debug, Clone)]
pub struct BoardRenderer {
    config: BoardConfig,
    fonts: Arc<FontBook>,
}

impl BoardRenderer {
    /// Fails when `config` does not validate.
    pub fn new(config: BoardConfig, fonts: Arc<FontBook>) -> Result<Self, RenderError> {
        config.validate()?;
        Ok(Self { config, fonts })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn layout(&self, req: &RenderRequest) -> BoardLayout {
        layout(&self.config, self.fonts.as_ref(), req)
    }

    pub fn render(&self, req: &RenderRequest) -> Result<RgbImage, RenderError> {
        let board = self.layout(req);

        let mut backend = RasterBackend::new(self.fonts.clone());
        let mut surface = backend.create_surface(SurfaceSize {
            width: self.config.width,
            height: self.config.height,
        })?;
        backend.render(&board.list, surface.as_mut())?;
        let image = backend.snapshot(surface.as_mut())?;

        log::debug!(
            "Rendered board {:?} ({} items, {} hint lines)",
            board.expression,
            board.list.len(),
            board.hint_lines.len()
        );
        Ok(image)
    }

    pub fn render_png(&self, req: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        self.render(req)?.encode_png()
    }
}
