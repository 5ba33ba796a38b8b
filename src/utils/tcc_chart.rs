//! Log-log time-current chart rendering.
//!
//! Current runs along the x axis, trip time along the y axis, both on
//! logarithmic scales with a grid line per decade. Labels are drawn only
//! when a system font can be found; the chart itself never needs one.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use rusttype::{Font, Scale};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::session::TccRenderer;
use crate::storage::StoredChartConfig;
use crate::system::ComparisonStudy;
use crate::tcc::{CurveSample, TccView};

const MARGIN_LEFT: u32 = 72;
const MARGIN_RIGHT: u32 = 24;
const MARGIN_TOP: u32 = 48;
const MARGIN_BOTTOM: u32 = 64;

/// Resolved chart appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub time_min: f64,
    pub time_max: f64,
    pub background_color: Rgba<u8>,
    pub grid_color: Rgba<u8>,
    pub curve_color: Rgba<u8>,
    pub secondary_curve_color: Rgba<u8>,
    pub point_color: Rgba<u8>,
    pub text_color: Rgba<u8>,
}

/// Convert hex string (e.g. "FF0000" or "#FF0000") to Rgba<u8>
pub fn parse_hex_color(hex: &str) -> Result<Rgba<u8>> {
    let digits = hex.trim().trim_start_matches('#');
    let invalid = || RelayError::InvalidConfig(format!("'{}' is not a RRGGBB colour", hex));

    if digits.len() != 6 || !digits.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());

    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}

impl ChartConfig {
    pub fn from_stored(stored: &StoredChartConfig) -> Result<Self> {
        Ok(Self {
            width: stored.width,
            height: stored.height,
            time_min: stored.time_min,
            time_max: stored.time_max,
            background_color: parse_hex_color(&stored.background_color)?,
            grid_color: parse_hex_color(&stored.grid_color)?,
            curve_color: parse_hex_color(&stored.curve_color)?,
            secondary_curve_color: parse_hex_color(&stored.secondary_curve_color)?,
            point_color: parse_hex_color(&stored.point_color)?,
            text_color: parse_hex_color(&stored.text_color)?,
        })
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            time_min: 0.01,
            time_max: 10.0,
            background_color: Rgba([0x0F, 0x17, 0x2A, 255]),
            grid_color: Rgba([0x33, 0x41, 0x55, 255]),
            curve_color: Rgba([0x38, 0xBD, 0xF8, 255]),
            secondary_curve_color: Rgba([0xF9, 0x73, 0x16, 255]),
            point_color: Rgba([0xF8, 0xFA, 0xFC, 255]),
            text_color: Rgba([0x94, 0xA3, 0xB8, 255]),
        }
    }
}

// =============================================================================
// Chart
// =============================================================================

#[derive(Debug, Clone)]
struct Series {
    label: String,
    color: Rgba<u8>,
    samples: Vec<CurveSample>,
}

#[derive(Debug, Clone)]
struct Marker {
    current: f64,
    label: String,
    color: Rgba<u8>,
}

/// A chart under construction.
#[derive(Debug, Clone)]
pub struct TccChart {
    config: ChartConfig,
    title: Option<String>,
    annotations: Vec<String>,
    series: Vec<Series>,
    points: Vec<(CurveSample, Rgba<u8>)>,
    markers: Vec<Marker>,
}

impl TccChart {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            config,
            title: None,
            annotations: Vec::new(),
            series: Vec::new(),
            points: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a line of text under the plot area.
    pub fn annotate(mut self, text: impl Into<String>) -> Self {
        self.annotations.push(text.into());
        self
    }

    pub fn series(
        mut self,
        label: impl Into<String>,
        color: Rgba<u8>,
        samples: impl IntoIterator<Item = CurveSample>,
    ) -> Self {
        self.series.push(Series {
            label: label.into(),
            color,
            samples: samples.into_iter().collect(),
        });
        self
    }

    pub fn point(mut self, sample: CurveSample, color: Rgba<u8>) -> Self {
        self.points.push((sample, color));
        self
    }

    /// Vertical line at `current`, e.g. a fault level.
    pub fn marker(mut self, current: f64, label: impl Into<String>, color: Rgba<u8>) -> Self {
        self.markers.push(Marker {
            current,
            label: label.into(),
            color,
        });
        self
    }

    /// Decade-aligned current axis covering every series, point and marker.
    pub fn current_range(&self) -> (f64, f64) {
        let currents = self
            .series
            .iter()
            .flat_map(|s| s.samples.iter().map(|p| p.current))
            .chain(self.points.iter().map(|(p, _)| p.current))
            .chain(self.markers.iter().map(|m| m.current))
            .filter(|c| c.is_finite() && *c > 0.0);

        let (lo, hi) = currents.fold((f64::INFINITY, 0.0_f64), |(lo, hi), c| {
            (lo.min(c), hi.max(c))
        });
        if !lo.is_finite() {
            return (10.0, 10_000.0);
        }

        let lo = 10f64.powi(lo.log10().floor() as i32);
        let hi = 10f64.powi(hi.log10().ceil() as i32);
        if hi <= lo { (lo, lo * 10.0) } else { (lo, hi) }
    }

    /// Draw the chart.
    pub fn render(&self) -> RgbaImage {
        let cfg = &self.config;
        let mut img = RgbaImage::from_pixel(cfg.width, cfg.height, cfg.background_color);
        let axes = Axes::new(cfg, self.current_range());

        draw_grid(&mut img, &axes, cfg.grid_color);

        for marker in &self.markers {
            if let Some(x) = axes.x(marker.current) {
                draw_dashed_vertical(&mut img, x, axes.top, axes.bottom, marker.color);
            }
        }

        for series in &self.series {
            draw_polyline(&mut img, &axes, &series.samples, series.color);
        }

        for (sample, color) in &self.points {
            if let (Some(x), Some(y)) = (axes.x(sample.current), axes.y(sample.trip_time)) {
                draw_filled_circle(&mut img, x as i32, y as i32, 5.0, *color);
            }
        }

        if let Some(font) = load_font() {
            self.draw_labels(&mut img, &axes, &font);
        } else {
            debug!("no system font found, chart drawn without labels");
        }

        img
    }

    /// Render and write a PNG.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.render()
            .save(path)
            .map_err(|e| RelayError::Render(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn draw_labels(&self, img: &mut RgbaImage, axes: &Axes, font: &Font<'_>) {
        let text = self.config.text_color;
        let small = Scale::uniform(14.0);

        for decade in axes.current_decades() {
            if let Some(x) = axes.x(decade) {
                let label = format_decade(decade);
                draw_text_mut(img, text, x as i32 - 10, axes.bottom as i32 + 6, small, font, &label);
            }
        }
        for decade in axes.time_decades() {
            if let Some(y) = axes.y(decade) {
                let label = format_decade(decade);
                draw_text_mut(img, text, 8, y as i32 - 7, small, font, &label);
            }
        }

        draw_text_mut(
            img,
            text,
            (axes.left + axes.right) as i32 / 2 - 40,
            axes.bottom as i32 + 24,
            small,
            font,
            "Current (A)",
        );
        draw_text_mut(img, text, 8, axes.top as i32 - 20, small, font, "Time (s)");

        if let Some(title) = &self.title {
            draw_text_mut(img, text, axes.left as i32, 12, Scale::uniform(20.0), font, title);
        }

        // Legend in the top-right corner of the plot
        let mut y = axes.top as i32 + 8;
        for series in &self.series {
            draw_text_mut(img, series.color, axes.right as i32 - 180, y, small, font, &series.label);
            y += 18;
        }
        for marker in &self.markers {
            draw_text_mut(img, marker.color, axes.right as i32 - 180, y, small, font, &marker.label);
            y += 18;
        }

        let mut y = axes.bottom as i32 + 42;
        for line in &self.annotations {
            draw_text_mut(img, text, axes.left as i32, y, small, font, line);
            y += 16;
        }
    }
}

// =============================================================================
// Axes
// =============================================================================

/// Log-log mapping from (current, time) to pixels.
#[derive(Debug, Clone, Copy)]
struct Axes {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
    current_min: f64,
    current_max: f64,
    time_min: f64,
    time_max: f64,
}

impl Axes {
    fn new(cfg: &ChartConfig, (current_min, current_max): (f64, f64)) -> Self {
        let right = cfg.width.saturating_sub(MARGIN_RIGHT).max(MARGIN_LEFT + 1);
        let bottom = cfg.height.saturating_sub(MARGIN_BOTTOM).max(MARGIN_TOP + 1);
        Self {
            left: MARGIN_LEFT as f32,
            right: right as f32,
            top: MARGIN_TOP as f32,
            bottom: bottom as f32,
            current_min,
            current_max,
            time_min: cfg.time_min,
            time_max: cfg.time_max,
        }
    }

    /// Pixel column for `current`, `None` outside the axis.
    fn x(&self, current: f64) -> Option<f32> {
        let t = log_fraction(current, self.current_min, self.current_max)?;
        Some(self.left + t * (self.right - self.left))
    }

    /// Pixel row for `time`, `None` outside the axis.
    fn y(&self, time: f64) -> Option<f32> {
        let t = log_fraction(time, self.time_min, self.time_max)?;
        Some(self.bottom - t * (self.bottom - self.top))
    }

    fn current_decades(&self) -> Vec<f64> {
        decades(self.current_min, self.current_max)
    }

    fn time_decades(&self) -> Vec<f64> {
        decades(self.time_min, self.time_max)
    }
}

fn log_fraction(value: f64, min: f64, max: f64) -> Option<f32> {
    if !(value.is_finite() && value > 0.0) || value < min || value > max {
        return None;
    }
    Some(((value.log10() - min.log10()) / (max.log10() - min.log10())) as f32)
}

/// Powers of ten within `[min, max]`.
fn decades(min: f64, max: f64) -> Vec<f64> {
    // Tolerance for limits that are not exact in binary, e.g. 0.01
    let first = (min.log10() - 1e-9).ceil() as i32;
    let last = (max.log10() + 1e-9).floor() as i32;
    (first..=last).map(|e| 10f64.powi(e)).collect()
}

fn format_decade(value: f64) -> String {
    if value >= 1.0 {
        format!("{}", value as u64)
    } else {
        format!("{}", value)
    }
}

// =============================================================================
// Primitives
// =============================================================================

fn draw_grid(img: &mut RgbaImage, axes: &Axes, color: Rgba<u8>) {
    for decade in axes.current_decades() {
        if let Some(x) = axes.x(decade) {
            draw_line_segment_mut(img, (x, axes.top), (x, axes.bottom), color);
        }
    }
    for decade in axes.time_decades() {
        if let Some(y) = axes.y(decade) {
            draw_line_segment_mut(img, (axes.left, y), (axes.right, y), color);
        }
    }
    // Frame
    draw_line_segment_mut(img, (axes.left, axes.top), (axes.left, axes.bottom), color);
    draw_line_segment_mut(img, (axes.left, axes.bottom), (axes.right, axes.bottom), color);
}

fn draw_dashed_vertical(img: &mut RgbaImage, x: f32, top: f32, bottom: f32, color: Rgba<u8>) {
    let mut y = top;
    while y < bottom {
        let end = (y + 6.0).min(bottom);
        draw_line_segment_mut(img, (x, y), (x, end), color);
        y += 10.0;
    }
}

/// Connect consecutive samples. Segments with an end off the axes are skipped.
fn draw_polyline(img: &mut RgbaImage, axes: &Axes, samples: &[CurveSample], color: Rgba<u8>) {
    let pixels: Vec<Option<(f32, f32)>> = samples
        .iter()
        .map(|s| Some((axes.x(s.current)?, axes.y(s.trip_time)?)))
        .collect();

    for pair in pixels.windows(2) {
        if let [Some(a), Some(b)] = pair {
            // Two pixels wide
            draw_line_segment_mut(img, *a, *b, color);
            draw_line_segment_mut(img, (a.0, a.1 + 1.0), (b.0, b.1 + 1.0), color);
        }
    }
}

/// Blend a color onto the image at the specified position with alpha blending
fn blend_pixel(img: &mut RgbaImage, x: u32, y: u32, color: Rgba<u8>) {
    if x >= img.width() || y >= img.height() {
        return;
    }

    let bg = img.get_pixel_mut(x, y);
    let alpha = color[3] as f32 / 255.0;

    for i in 0..3 {
        bg[i] = (color[i] as f32 * alpha + bg[i] as f32 * (1.0 - alpha)) as u8;
    }
    bg[3] = (color[3] as f32 + bg[3] as f32 * (1.0 - alpha)).min(255.0) as u8;
}

/// Draw a filled circle with a one pixel soft edge
fn draw_filled_circle(img: &mut RgbaImage, cx: i32, cy: i32, radius: f32, color: Rgba<u8>) {
    let r_ceil = radius.ceil() as i32 + 1;

    for dy in -r_ceil..=r_ceil {
        for dx in -r_ceil..=r_ceil {
            let (px, py) = (cx + dx, cy + dy);
            if px < 0 || py < 0 {
                continue;
            }

            let dist = ((dx * dx + dy * dy) as f32).sqrt();
            if dist < radius - 0.5 {
                blend_pixel(img, px as u32, py as u32, color);
            } else if dist < radius + 0.5 {
                let mut edge = color;
                edge[3] = (color[3] as f32 * ((radius + 0.5) - dist).clamp(0.0, 1.0)) as u8;
                blend_pixel(img, px as u32, py as u32, edge);
            }
        }
    }
}

/// Try to load a font from common system paths
fn load_font() -> Option<Font<'static>> {
    let font_paths = [
        "C:\\Windows\\Fonts\\arial.ttf",
        "C:\\Windows\\Fonts\\segoeui.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ];

    for path in font_paths {
        if Path::new(path).exists()
            && let Ok(data) = std::fs::read(path)
            && let Some(font) = Font::try_from_vec(data)
        {
            return Some(font);
        }
    }
    None
}

// =============================================================================
// Chart Builders
// =============================================================================

/// Chart of a single relay view: its curve, operating point and fault level.
pub fn view_chart(view: &TccView, config: &ChartConfig) -> TccChart {
    let mut chart = TccChart::new(config.clone())
        .title(format!(
            "IEC {} | {} mode",
            view.curve_family.name(),
            view.mode
        ))
        .series(
            format!("TCC {}", view.curve_family.name()),
            config.curve_color,
            view.curve.iter().copied(),
        )
        .marker(
            view.fault_current,
            format!("Fault {:.0} A", view.fault_current),
            config.text_color,
        )
        .annotate(format!(
            "Is = {}   TMS = {}   Trip = {}",
            view.display.pickup_current, view.display.time_multiplier, view.display.trip_time
        ));

    for point in &view.operating_point {
        chart = chart.point(*point, config.point_color);
    }
    chart
}

/// Fixed and adaptive curves on one chart with both fault levels marked.
pub fn comparison_chart(study: &ComparisonStudy, config: &ChartConfig) -> TccChart {
    let mut chart = TccChart::new(config.clone())
        .title(format!(
            "Fixed vs adaptive, IEC {}",
            study.curve_family.name()
        ))
        .series(
            study.fixed.label,
            config.secondary_curve_color,
            study.fixed.curve.iter().copied(),
        )
        .series(
            study.adaptive.label,
            config.curve_color,
            study.adaptive.curve.iter().copied(),
        )
        .marker(
            study.grid_fault_current,
            format!("Grid fault {:.0} A", study.grid_fault_current),
            config.secondary_curve_color,
        )
        .marker(
            study.total_fault_current,
            format!("Grid + IBR fault {:.0} A", study.total_fault_current),
            config.curve_color,
        );

    for scheme in [&study.fixed, &study.adaptive] {
        if let Some(trip_time) = scheme.trip_time {
            chart = chart.point(
                CurveSample {
                    current: scheme.fault_current,
                    trip_time,
                },
                config.point_color,
            );
        }
    }
    chart
}

// =============================================================================
// Renderer
// =============================================================================

/// Writes a PNG for every view it receives, overwriting the same file.
#[derive(Debug, Clone)]
pub struct PngChartRenderer {
    path: PathBuf,
    config: ChartConfig,
    renders: usize,
}

impl PngChartRenderer {
    pub fn new(path: impl Into<PathBuf>, config: ChartConfig) -> Self {
        Self {
            path: path.into(),
            config,
            renders: 0,
        }
    }

    /// Number of images written so far.
    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl TccRenderer for PngChartRenderer {
    fn render(&mut self, view: &TccView) -> Result<()> {
        view_chart(view, &self.config).save(&self.path)?;
        self.renders += 1;
        debug!(path = %self.path.display(), renders = self.renders, "chart written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RelaySession;

    fn has_color(img: &RgbaImage, color: Rgba<u8>) -> bool {
        img.pixels().any(|p| *p == color)
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("38BDF8").unwrap(), Rgba([0x38, 0xBD, 0xF8, 255]));
        assert_eq!(parse_hex_color("#0f172a").unwrap(), Rgba([0x0F, 0x17, 0x2A, 255]));
        assert!(parse_hex_color("38BDF").is_err());
        assert!(parse_hex_color("GGGGGG").is_err());
    }

    #[test]
    fn test_from_stored_matches_default() {
        let config = ChartConfig::from_stored(&StoredChartConfig::default()).unwrap();
        assert_eq!(config, ChartConfig::default());
    }

    #[test]
    fn test_from_stored_rejects_bad_color() {
        let stored = StoredChartConfig {
            point_color: "white".into(),
            ..Default::default()
        };
        assert!(matches!(
            ChartConfig::from_stored(&stored),
            Err(RelayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_current_range_snaps_to_decades() {
        let chart = TccChart::new(ChartConfig::default())
            .series(
                "a",
                Rgba([255, 0, 0, 255]),
                [
                    CurveSample { current: 1100.0, trip_time: 5.0 },
                    CurveSample { current: 20_000.0, trip_time: 0.1 },
                ],
            )
            .marker(5000.0, "fault", Rgba([0, 255, 0, 255]));
        assert_eq!(chart.current_range(), (1000.0, 100_000.0));

        let empty = TccChart::new(ChartConfig::default());
        assert_eq!(empty.current_range(), (10.0, 10_000.0));
    }

    #[test]
    fn test_axes_are_logarithmic() {
        let axes = Axes::new(&ChartConfig::default(), (100.0, 10_000.0));
        let a = axes.x(100.0).unwrap();
        let b = axes.x(1000.0).unwrap();
        let c = axes.x(10_000.0).unwrap();
        assert!((b - a - (c - b)).abs() < 1e-3);

        // Longer times sit higher on the chart
        assert!(axes.y(1.0).unwrap() < axes.y(0.1).unwrap());
        assert!(axes.y(100.0).is_none());
        assert!(axes.x(50.0).is_none());
    }

    #[test]
    fn test_decades() {
        assert_eq!(decades(0.01, 10.0), vec![0.01, 0.1, 1.0, 10.0]);
        assert_eq!(decades(1000.0, 10_000.0), vec![1000.0, 10_000.0]);
    }

    #[test]
    fn test_view_chart_draws_curve_and_point() {
        let view = RelaySession::default().view();
        let config = ChartConfig::default();
        let img = view_chart(&view, &config).render();

        assert_eq!(img.dimensions(), (800, 600));
        assert_eq!(*img.get_pixel(0, 0), config.background_color);
        assert!(has_color(&img, config.curve_color));
        assert!(has_color(&img, config.point_color));
    }

    #[test]
    fn test_comparison_chart_draws_both_curves() {
        use crate::config::{SamplingPolicy, SettingsPolicy};
        use crate::relay::CurveFamily;
        use crate::system::{SystemModel, run_comparison};

        let study = run_comparison(
            &SystemModel::default(),
            CurveFamily::Standard,
            &SettingsPolicy::default(),
            &SamplingPolicy::default(),
        )
        .unwrap();
        let config = ChartConfig::default();
        let img = comparison_chart(&study, &config).render();

        assert!(has_color(&img, config.curve_color));
        assert!(has_color(&img, config.secondary_curve_color));
    }

    #[test]
    fn test_png_renderer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcc.png");
        let mut renderer = PngChartRenderer::new(&path, ChartConfig::default());

        let mut session = RelaySession::default();
        session.set_fault_current(4000.0, &mut renderer).unwrap();
        session.set_adaptive_mode(true, &mut renderer).unwrap();

        assert_eq!(renderer.renders(), 2);
        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), 800);
    }

    #[test]
    fn test_png_renderer_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("tcc.png");
        let mut renderer = PngChartRenderer::new(&path, ChartConfig::default());

        let err = RelaySession::default().refresh(&mut renderer).unwrap_err();
        assert!(matches!(err, RelayError::Render(_)));
        assert_eq!(renderer.renders(), 0);
    }
}
