use crate::ir::{ChartData, ChartKind, Datum, ScatterPoint, Series, TreeNode, View};
use crate::{OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::{FRAC_PI_2, TAU};

const CATEGORY10: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// Color for the `idx`-th series, cycling through a categorical palette
pub fn series_color(idx: usize) -> RGBColor {
    CATEGORY10[idx % CATEGORY10.len()]
}

/// Render one view to image bytes in the requested format
pub fn render_view(view: &View, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    match options.format {
        OutputFormat::Png => {
            let mut buffer = vec![0u8; width as usize * height as usize * 3];
            {
                let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
                draw_view(&root, view)?;
                root.present().context("Failed to present drawing")?;
            }
            encode_png(&buffer, width, height)
        }
        OutputFormat::Svg => {
            let mut svg = String::new();
            {
                let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
                draw_view(&root, view)?;
                root.present().context("Failed to present drawing")?;
            }
            Ok(svg.into_bytes())
        }
    }
}

/// Draw a view onto any plotters drawing area
pub fn draw_view<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, view: &View) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).context("Failed to fill background")?;

    match &view.data {
        ChartData::Categories { data } => match view.chart {
            ChartKind::Pie => draw_pie(root, &view.title, data),
            ChartKind::Line => {
                let x: Vec<String> = data.iter().map(|d| d.label.clone()).collect();
                let series = [Series {
                    name: view.title.clone(),
                    values: data.iter().map(|d| d.value).collect(),
                }];
                draw_lines(root, view, &x, &series)
            }
            _ => draw_bars(root, view, data),
        },
        ChartData::MultiSeries { x, series } => draw_lines(root, view, x, series),
        ChartData::Hierarchy { roots } => draw_treemap(root, &view.title, roots),
        ChartData::Points { points } => draw_scatter(root, view, points),
        ChartData::Grid { x, rows } => draw_heatmap(root, &view.title, x, rows),
        ChartData::Table { columns, rows } => draw_table(root, &view.title, columns, rows),
        ChartData::Metric { label, value, message } => draw_metric(root, &view.title, label, *value, message),
    }
}

/// Encode an RGB buffer as PNG
pub fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

fn segment_label(labels: &[String], value: &SegmentValue<usize>) -> String {
    match value {
        SegmentValue::CenterOf(idx) | SegmentValue::Exact(idx) => labels.get(*idx).cloned().unwrap_or_default(),
        SegmentValue::Last => String::new(),
    }
}

/// Upper bound for a count axis, with some headroom above the tallest value
fn count_axis_max(values: impl Iterator<Item = u64>) -> u64 {
    let max = values.max().unwrap_or(0).max(1);
    max + max / 10 + 1
}

fn draw_bars<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, view: &View, data: &[Datum]) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let labels: Vec<String> = data.iter().map(|d| d.label.clone()).collect();
    let n = labels.len().max(1);
    let y_max = count_axis_max(data.iter().map(|d| d.value));

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&view.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((0..n).into_segmented(), 0u64..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&|x: &SegmentValue<usize>| segment_label(&labels, x))
        .x_desc(view.x_label.as_deref().unwrap_or(""))
        .y_desc(view.y_label.as_deref().unwrap_or(""))
        .draw()
        .context("Failed to draw mesh")?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(series_color(0).filled())
                .margin(8)
                .data(data.iter().enumerate().map(|(idx, d)| (idx, d.value))),
        )
        .context("Failed to draw bars")?;

    Ok(())
}

fn draw_lines<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    view: &View,
    x: &[String],
    series: &[Series],
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let n = x.len().max(1);
    let y_max = count_axis_max(series.iter().flat_map(|s| s.values.iter().copied()));

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&view.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((0..n).into_segmented(), 0u64..y_max)
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .x_labels(n)
        .x_label_formatter(&|v: &SegmentValue<usize>| segment_label(x, v))
        .x_desc(view.x_label.as_deref().unwrap_or(""))
        .y_desc(view.y_label.as_deref().unwrap_or(""))
        .draw()
        .context("Failed to draw mesh")?;

    for (idx, line) in series.iter().enumerate() {
        let color = series_color(idx);
        let points: Vec<(SegmentValue<usize>, u64)> = line
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| (SegmentValue::CenterOf(i), *v))
            .collect();

        chart
            .draw_series(points.iter().map(|(px, py)| Circle::new((px.clone(), *py), 3, color.filled())))
            .context("Failed to draw line markers")?;
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))
            .context("Failed to draw line series")?
            .label(line.name.clone())
            .legend(move |(lx, ly)| PathElement::new(vec![(lx, ly), (lx + 20, ly)], color.stroke_width(2)));
    }

    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .context("Failed to draw legend")?;
    }

    Ok(())
}

/// Start and end angle (radians, clockwise from twelve o'clock) of each slice.
/// Empty when the values sum to zero.
pub fn pie_wedges(values: &[u64]) -> Vec<(f64, f64)> {
    let total: u64 = values.iter().sum();
    if total == 0 {
        return Vec::new();
    }

    let mut start = -FRAC_PI_2;
    values
        .iter()
        .map(|&value| {
            let sweep = value as f64 / total as f64 * TAU;
            let wedge = (start, start + sweep);
            start += sweep;
            wedge
        })
        .collect()
}

fn polar(center: (i32, i32), radius: f64, angle: f64) -> (i32, i32) {
    (
        center.0 + (radius * angle.cos()).round() as i32,
        center.1 + (radius * angle.sin()).round() as i32,
    )
}

fn wedge_polygon(center: (i32, i32), radius: f64, (start, end): (f64, f64)) -> Vec<(i32, i32)> {
    let steps = ((end - start) / TAU * 120.0).ceil().max(1.0) as usize;
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);
    for i in 0..=steps {
        let angle = start + (end - start) * i as f64 / steps as f64;
        points.push(polar(center, radius, angle));
    }
    points
}

fn draw_pie<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, title: &str, data: &[Datum]) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let area = root.titled(title, ("sans-serif", 20)).context("Failed to draw title")?;
    let (width, height) = area.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = width.min(height) as f64 * 0.35;

    let values: Vec<u64> = data.iter().map(|d| d.value).collect();
    let total: u64 = values.iter().sum();
    let label_style = TextStyle::from(("sans-serif", 14).into_font()).pos(Pos::new(HPos::Center, VPos::Center));

    for (idx, (datum, wedge)) in data.iter().zip(pie_wedges(&values)).enumerate() {
        area.draw(&Polygon::new(wedge_polygon(center, radius, wedge), series_color(idx).filled()))
            .context("Failed to draw pie slice")?;

        let share = datum.value as f64 / total as f64 * 100.0;
        let anchor = polar(center, radius * 1.2, (wedge.0 + wedge.1) / 2.0);
        area.draw(&Text::new(
            format!("{} ({:.1}%)", datum.label, share),
            anchor,
            label_style.clone(),
        ))
        .context("Failed to draw pie label")?;
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    fn corners(&self) -> [(i32, i32); 2] {
        [
            (self.x.round() as i32, self.y.round() as i32),
            ((self.x + self.width).round() as i32, (self.y + self.height).round() as i32),
        ]
    }
}

/// Slice-and-dice layout: split `bounds` into strips proportional to `values`,
/// side by side when `horizontal`, stacked otherwise.
pub fn treemap_layout(values: &[u64], bounds: Rect, horizontal: bool) -> Vec<Rect> {
    let total: u64 = values.iter().sum();
    let mut offset = 0.0;
    values
        .iter()
        .map(|&value| {
            let share = if total == 0 { 0.0 } else { value as f64 / total as f64 };
            let rect = if horizontal {
                Rect {
                    x: bounds.x + offset,
                    width: bounds.width * share,
                    ..bounds
                }
            } else {
                Rect {
                    y: bounds.y + offset,
                    height: bounds.height * share,
                    ..bounds
                }
            };
            offset += if horizontal { rect.width } else { rect.height };
            rect
        })
        .collect()
}

fn draw_treemap<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, title: &str, roots: &[TreeNode]) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let area = root.titled(title, ("sans-serif", 20)).context("Failed to draw title")?;
    let (width, height) = area.dim_in_pixel();
    let bounds = Rect {
        x: 0.0,
        y: 0.0,
        width: width as f64,
        height: height as f64,
    };

    let root_values: Vec<u64> = roots.iter().map(|node| node.value).collect();
    let label_font = ("sans-serif", 13).into_font();
    let header_font = ("sans-serif", 15).into_font().style(FontStyle::Bold);

    for (idx, (node, rect)) in roots.iter().zip(treemap_layout(&root_values, bounds, true)).enumerate() {
        let color = series_color(idx);
        let child_values: Vec<u64> = node.children.iter().map(|child| child.value).collect();
        let tiles = if node.children.is_empty() {
            vec![(node.label.as_str(), node.value, rect)]
        } else {
            node.children
                .iter()
                .zip(treemap_layout(&child_values, rect, false))
                .map(|(child, tile)| (child.label.as_str(), child.value, tile))
                .collect()
        };

        for (label, value, tile) in tiles {
            area.draw(&Rectangle::new(tile.corners(), color.mix(0.75).filled()))
                .context("Failed to draw treemap tile")?;
            area.draw(&Rectangle::new(tile.corners(), WHITE.stroke_width(2)))
                .context("Failed to draw treemap border")?;
            if tile.width > 70.0 && tile.height > 36.0 {
                let [(x, y), _] = tile.corners();
                area.draw(&Text::new(format!("{}: {}", label, value), (x + 4, y + 20), label_font.clone()))
                    .context("Failed to draw treemap label")?;
            }
        }

        if rect.width > 50.0 {
            let [(x, y), _] = rect.corners();
            area.draw(&Text::new(node.label.clone(), (x + 4, y + 2), header_font.clone()))
                .context("Failed to draw treemap header")?;
        }
    }

    Ok(())
}

fn draw_scatter<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, view: &View, points: &[ScatterPoint]) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let mut labels: Vec<String> = Vec::new();
    let mut groups: Vec<String> = Vec::new();
    for point in points {
        if !labels.contains(&point.label) {
            labels.push(point.label.clone());
        }
        if !groups.contains(&point.group) {
            groups.push(point.group.clone());
        }
    }
    let n = labels.len().max(1);

    let mut chart = ChartBuilder::on(root)
        .margin(10)
        .caption(&view.title, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(140)
        .build_cartesian_2d(0f64..105f64, (0..n).into_segmented())
        .context("Failed to build chart")?;

    chart
        .configure_mesh()
        .y_labels(n)
        .y_label_formatter(&|v: &SegmentValue<usize>| segment_label(&labels, v))
        .x_desc(view.x_label.as_deref().unwrap_or(""))
        .y_desc(view.y_label.as_deref().unwrap_or(""))
        .draw()
        .context("Failed to draw mesh")?;

    for (idx, group) in groups.iter().enumerate() {
        let color = series_color(idx);
        let markers: Vec<Circle<(f64, SegmentValue<usize>), i32>> = points
            .iter()
            .filter(|p| &p.group == group)
            .filter_map(|p| {
                let row = labels.iter().position(|l| l == &p.label)?;
                Some(Circle::new((p.percent, SegmentValue::CenterOf(row)), 6, color.filled()))
            })
            .collect();

        chart
            .draw_series(markers)
            .context("Failed to draw scatter points")?
            .label(group.clone())
            .legend(move |(lx, ly)| Circle::new((lx + 10, ly), 5, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .context("Failed to draw legend")?;

    Ok(())
}

/// Fade from white at zero to a deep red at `max`
pub fn heat_color(value: u64, max: u64) -> RGBColor {
    let t = if max == 0 { 0.0 } else { value.min(max) as f64 / max as f64 };
    let fade = |full: u8| (255.0 - (255.0 - full as f64) * t).round() as u8;
    RGBColor(fade(165), fade(15), fade(21))
}

fn draw_heatmap<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, title: &str, x: &[String], rows: &[Series]) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let area = root.titled(title, ("sans-serif", 20)).context("Failed to draw title")?;
    if x.is_empty() || rows.is_empty() {
        return Ok(());
    }
    let (width, height) = area.dim_in_pixel();
    let (left, top, bottom) = (150i32, 10i32, 40i32);
    let cell_w = ((width as i32 - left - 10) / x.len() as i32).max(1);
    let cell_h = ((height as i32 - top - bottom) / rows.len() as i32).max(1);
    let max = rows.iter().flat_map(|row| row.values.iter().copied()).max().unwrap_or(0);

    let anchored = |h: HPos| TextStyle::from(("sans-serif", 13).into_font()).pos(Pos::new(h, VPos::Center));

    for (r, row) in rows.iter().enumerate() {
        let y = top + r as i32 * cell_h;
        area.draw(&Text::new(row.name.clone(), (left - 6, y + cell_h / 2), anchored(HPos::Right)))
            .context("Failed to draw heatmap row label")?;

        for (c, value) in row.values.iter().enumerate() {
            let x0 = left + c as i32 * cell_w;
            area.draw(&Rectangle::new(
                [(x0, y), (x0 + cell_w, y + cell_h)],
                heat_color(*value, max).filled(),
            ))
            .context("Failed to draw heatmap cell")?;
            if cell_w > 30 && cell_h > 16 {
                let ink = if value.saturating_mul(2) > max { WHITE } else { BLACK };
                area.draw(&Text::new(
                    value.to_string(),
                    (x0 + cell_w / 2, y + cell_h / 2),
                    anchored(HPos::Center).color(&ink),
                ))
                .context("Failed to draw heatmap value")?;
            }
        }
    }

    let label_y = top + rows.len() as i32 * cell_h + 14;
    for (c, label) in x.iter().enumerate() {
        area.draw(&Text::new(
            label.clone(),
            (left + c as i32 * cell_w + cell_w / 2, label_y),
            anchored(HPos::Center),
        ))
        .context("Failed to draw heatmap column label")?;
    }

    Ok(())
}

fn draw_table<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    columns: &[String],
    rows: &[Vec<String>],
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let area = root.titled(title, ("sans-serif", 20)).context("Failed to draw title")?;
    let (width, _) = area.dim_in_pixel();
    let col_width = (width as i32 - 40) / columns.len().max(1) as i32;

    let header_font = ("sans-serif", 16).into_font().style(FontStyle::Bold);
    let body_font = ("sans-serif", 16).into_font();

    for (c, name) in columns.iter().enumerate() {
        area.draw(&Text::new(name.clone(), (20 + c as i32 * col_width, 20), header_font.clone()))
            .context("Failed to draw table header")?;
    }
    for (r, row) in rows.iter().enumerate() {
        let y = 50 + r as i32 * 26;
        for (c, cell) in row.iter().enumerate() {
            area.draw(&Text::new(cell.clone(), (20 + c as i32 * col_width, y), body_font.clone()))
                .context("Failed to draw table cell")?;
        }
    }

    Ok(())
}

fn draw_metric<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    title: &str,
    label: &str,
    value: u64,
    message: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let area = root.titled(title, ("sans-serif", 20)).context("Failed to draw title")?;
    let (width, height) = area.dim_in_pixel();
    let cx = width as i32 / 2;
    let cy = height as i32 / 2;
    let centered = |size: f64| TextStyle::from(("sans-serif", size).into_font()).pos(Pos::new(HPos::Center, VPos::Center));

    area.draw(&Text::new(label.to_string(), (cx, cy - 60), centered(22.0)))
        .context("Failed to draw metric label")?;
    area.draw(&Text::new(value.to_string(), (cx, cy), centered(64.0)))
        .context("Failed to draw metric value")?;
    area.draw(&Text::new(message.to_string(), (cx, cy + 60), centered(18.0)))
        .context("Failed to draw metric message")?;

    Ok(())
}
