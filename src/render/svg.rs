//! Standalone SVG bar, line and heatmap charts.

use anyhow::Result;
use std::fmt::Write;
use std::path::Path;
use tracing::debug;

use super::{BarChart, ChartRenderer, Heatmap, LineChart, escape};
use crate::output::write_file;

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 90.0;
const DEFAULT_BAR_COLOR: &str = "skyblue";
const LINE_COLORS: [&str; 6] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b"];

/// Writes charts as standalone SVG documents.
pub struct SvgChartRenderer {
    pub width: f64,
    pub height: f64,
    pub write_retries: u32,
}

impl SvgChartRenderer {
    pub fn new(write_retries: u32) -> Self {
        Self {
            width: 1000.0,
            height: 500.0,
            write_retries,
        }
    }

    fn plot_width(&self) -> f64 {
        self.width - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height(&self) -> f64 {
        self.height - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn open(&self, svg: &mut String, title: &str, x_label: &str, y_label: &str) -> Result<()> {
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="12">"#,
            w = self.width,
            h = self.height
        )?;
        writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
        writeln!(
            svg,
            r#"<text x="{}" y="25" text-anchor="middle" font-size="16">{}</text>"#,
            self.width / 2.0,
            escape(title)
        )?;
        writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle">{}</text>"#,
            MARGIN_LEFT + self.plot_width() / 2.0,
            self.height - 10.0,
            escape(x_label)
        )?;
        writeln!(
            svg,
            r#"<text x="18" y="{y}" text-anchor="middle" transform="rotate(-90 18 {y})">{}</text>"#,
            escape(y_label),
            y = MARGIN_TOP + self.plot_height() / 2.0
        )?;
        Ok(())
    }

    /// Horizontal dashed grid with five value ticks.
    fn y_axis(&self, svg: &mut String, max: f64) -> Result<()> {
        let base = MARGIN_TOP + self.plot_height();
        for i in 0..=5 {
            let value = max * i as f64 / 5.0;
            let y = base - self.plot_height() * i as f64 / 5.0;
            writeln!(
                svg,
                r##"<line x1="{x0}" y1="{y}" x2="{x1}" y2="{y}" stroke="#ccc" stroke-dasharray="4 3"/>"##,
                x0 = MARGIN_LEFT,
                x1 = MARGIN_LEFT + self.plot_width()
            )?;
            writeln!(
                svg,
                r#"<text x="{}" y="{}" text-anchor="end">{}</text>"#,
                MARGIN_LEFT - 6.0,
                y + 4.0,
                format_value(value)
            )?;
        }
        writeln!(
            svg,
            r#"<line x1="{x}" y1="{top}" x2="{x}" y2="{base}" stroke="black"/>"#,
            x = MARGIN_LEFT,
            top = MARGIN_TOP
        )?;
        writeln!(
            svg,
            r#"<line x1="{x0}" y1="{base}" x2="{x1}" y2="{base}" stroke="black"/>"#,
            x0 = MARGIN_LEFT,
            x1 = MARGIN_LEFT + self.plot_width()
        )?;
        Ok(())
    }

    fn x_tick(&self, svg: &mut String, x: f64, label: &str, rotate: bool) -> Result<()> {
        let y = MARGIN_TOP + self.plot_height() + 16.0;
        if rotate {
            writeln!(
                svg,
                r#"<text x="{x}" y="{y}" text-anchor="end" transform="rotate(-45 {x} {y})">{}</text>"#,
                escape(label)
            )?;
        } else {
            writeln!(svg, r#"<text x="{x}" y="{y}" text-anchor="middle">{}</text>"#, escape(label))?;
        }
        Ok(())
    }

    fn finish(&self, path: &Path, mut svg: String) -> Result<()> {
        svg.push_str("</svg>\n");
        write_file(path, svg.as_bytes(), self.write_retries)?;
        debug!(path = %path.display(), "Chart written");
        Ok(())
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn extension(&self) -> &'static str {
        "svg"
    }

    fn bar_chart(&self, path: &Path, chart: &BarChart) -> Result<()> {
        let mut svg = String::new();
        self.open(&mut svg, &chart.title, &chart.x_label, &chart.y_label)?;

        let max = nice_max(chart.bars.iter().map(|(_, v)| *v));
        self.y_axis(&mut svg, max)?;

        let n = chart.bars.len().max(1) as f64;
        let slot = self.plot_width() / n;
        let base = MARGIN_TOP + self.plot_height();
        let rotate = chart.bars.iter().any(|(label, _)| label.len() > 3);
        for (i, (label, value)) in chart.bars.iter().enumerate() {
            let color = if chart.colors.is_empty() {
                DEFAULT_BAR_COLOR
            } else {
                chart.colors[i % chart.colors.len()].as_str()
            };
            let h = if max > 0.0 { self.plot_height() * value / max } else { 0.0 };
            let x = MARGIN_LEFT + slot * i as f64;
            writeln!(
                svg,
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"><title>{}: {}</title></rect>"#,
                x + slot * 0.1,
                base - h,
                slot * 0.8,
                h,
                escape(color),
                escape(label),
                format_value(*value)
            )?;
            self.x_tick(&mut svg, x + slot / 2.0, label, rotate)?;
        }

        self.finish(path, svg)
    }

    fn line_chart(&self, path: &Path, chart: &LineChart) -> Result<()> {
        let mut svg = String::new();
        self.open(&mut svg, &chart.title, &chart.x_label, &chart.y_label)?;

        let max = nice_max(chart.series.iter().flat_map(|s| s.values.iter().copied()));
        self.y_axis(&mut svg, max)?;

        let n = chart.x_ticks.len().max(2) as f64;
        let step = self.plot_width() / (n - 1.0);
        let base = MARGIN_TOP + self.plot_height();
        for (i, tick) in chart.x_ticks.iter().enumerate() {
            self.x_tick(&mut svg, MARGIN_LEFT + step * i as f64, tick, false)?;
        }

        for (i, series) in chart.series.iter().enumerate() {
            let color = LINE_COLORS[i % LINE_COLORS.len()];
            let points: Vec<String> = series
                .values
                .iter()
                .enumerate()
                .map(|(j, v)| {
                    let y = if max > 0.0 { base - self.plot_height() * v / max } else { base };
                    format!("{:.2},{:.2}", MARGIN_LEFT + step * j as f64, y)
                })
                .collect();
            writeln!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
                points.join(" "),
                color
            )?;

            let ly = MARGIN_TOP + 16.0 * i as f64;
            let lx = MARGIN_LEFT + self.plot_width() - 140.0;
            writeln!(
                svg,
                r#"<line x1="{lx}" y1="{ly}" x2="{}" y2="{ly}" stroke="{color}" stroke-width="2"/>"#,
                lx + 20.0
            )?;
            writeln!(
                svg,
                r#"<text x="{}" y="{}">{}</text>"#,
                lx + 26.0,
                ly + 4.0,
                escape(&series.name)
            )?;
        }

        self.finish(path, svg)
    }

    fn heatmap(&self, path: &Path, chart: &Heatmap) -> Result<()> {
        let mut svg = String::new();
        self.open(&mut svg, &chart.title, &chart.x_label, &chart.y_label)?;

        let rows = chart.cells.len().max(1) as f64;
        let cols = chart.cells.iter().map(Vec::len).max().unwrap_or(0).max(1) as f64;
        let cw = self.plot_width() / cols;
        let ch = self.plot_height() / rows;
        let max = chart.cells.iter().flatten().copied().fold(0.0_f64, f64::max);

        for (r, row) in chart.cells.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let t = if max > 0.0 { value / max } else { 0.0 };
                let x = MARGIN_LEFT + cw * c as f64;
                let y = MARGIN_TOP + ch * r as f64;
                writeln!(
                    svg,
                    r#"<rect x="{x:.2}" y="{y:.2}" width="{cw:.2}" height="{ch:.2}" fill="{}"/>"#,
                    coolwarm(t)
                )?;
                writeln!(
                    svg,
                    r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" font-size="9">{}</text>"#,
                    x + cw / 2.0,
                    y + ch / 2.0 + 3.0,
                    format_value(*value)
                )?;
            }
        }

        for (c, tick) in chart.x_ticks.iter().enumerate() {
            self.x_tick(&mut svg, MARGIN_LEFT + cw * (c as f64 + 0.5), tick, false)?;
        }
        for (r, tick) in chart.y_ticks.iter().enumerate() {
            writeln!(
                svg,
                r#"<text x="{}" y="{:.2}" text-anchor="end">{}</text>"#,
                MARGIN_LEFT - 6.0,
                MARGIN_TOP + ch * (r as f64 + 0.5) + 4.0,
                escape(tick)
            )?;
        }

        self.finish(path, svg)
    }
}

/// Smallest 1/2/5 x 10^k at or above the largest value.
fn nice_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f64.powf(max.log10().floor());
    for step in [1.0, 2.0, 5.0, 10.0] {
        if step * magnitude >= max {
            return step * magnitude;
        }
    }
    10.0 * magnitude
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

/// Blue (0.0) through white (0.5) to red (1.0).
fn coolwarm(t: f64) -> String {
    let t = t.clamp(0.0, 1.0);
    let (cold, mid, warm) = ((59.0, 76.0, 192.0), (221.0, 221.0, 221.0), (180.0, 4.0, 38.0));
    let lerp = |a: f64, b: f64, u: f64| a + (b - a) * u;
    let (r, g, b) = if t < 0.5 {
        let u = t * 2.0;
        (lerp(cold.0, mid.0, u), lerp(cold.1, mid.1, u), lerp(cold.2, mid.2, u))
    } else {
        let u = (t - 0.5) * 2.0;
        (lerp(mid.0, warm.0, u), lerp(mid.1, warm.1, u), lerp(mid.2, warm.2, u))
    };
    format!("#{:02x}{:02x}{:02x}", r.round() as u8, g.round() as u8, b.round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::LineSeries;
    use std::fs;

    #[test]
    fn test_nice_max() {
        assert_eq!(nice_max([0.0].into_iter()), 1.0);
        assert_eq!(nice_max([7.0].into_iter()), 10.0);
        assert_eq!(nice_max([130.0, 20.0].into_iter()), 200.0);
        assert_eq!(nice_max([5.0].into_iter()), 5.0);
    }

    #[test]
    fn test_coolwarm_endpoints() {
        assert_eq!(coolwarm(0.0), "#3b4cc0");
        assert_eq!(coolwarm(1.0), "#b40426");
    }

    #[test]
    fn test_bar_chart_writes_one_rect_per_bar() {
        let path = std::env::temp_dir().join("gtfs_region_report_test_bars.svg");
        let chart = BarChart {
            title: "Trips per route".into(),
            x_label: "Route".into(),
            y_label: "Trips".into(),
            bars: vec![("M1".into(), 3.0), ("B<2>".into(), 1.0)],
            colors: vec![],
        };
        SvgChartRenderer::new(0).bar_chart(&path, &chart).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<rect x=").count(), 2);
        assert!(svg.contains("B&lt;2&gt;"));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_line_chart_one_polyline_per_series() {
        let path = std::env::temp_dir().join("gtfs_region_report_test_lines.svg");
        let chart = LineChart {
            title: "Compare".into(),
            x_ticks: (0..24).map(|h| h.to_string()).collect(),
            series: vec![
                LineSeries { name: "A".into(), values: vec![1.0; 24] },
                LineSeries { name: "B".into(), values: vec![2.0; 24] },
            ],
            ..Default::default()
        };
        SvgChartRenderer::new(0).line_chart(&path, &chart).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert_eq!(svg.matches("<polyline").count(), 2);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_heatmap_annotates_cells() {
        let path = std::env::temp_dir().join("gtfs_region_report_test_heat.svg");
        let chart = Heatmap {
            cells: vec![vec![0.0, 4.0], vec![2.0, 1.0]],
            x_ticks: vec!["0".into(), "1".into()],
            y_ticks: vec!["Mon".into(), "Tue".into()],
            ..Default::default()
        };
        SvgChartRenderer::new(0).heatmap(&path, &chart).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains(">4</text>"));
        assert!(svg.contains(">Tue</text>"));
        fs::remove_file(&path).unwrap();
    }
}
