//! SVG charts for training history.
//!
//! Renders the accuracy, loss and learning rate curves as standalone
//! SVG files without a plotting dependency.

use std::fs;
use std::path::{Path, PathBuf};

use cifar_core::{Result, TrainingHistory};

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;

const COLOR_TRAIN: &str = "#3498db";
const COLOR_VALID: &str = "#e74c3c";
const COLOR_LR: &str = "#2ecc71";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A named line on a chart
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
    pub color: String,
}

/// Writes accuracy.svg, loss.svg and lr.svg into `output_dir`.
///
/// Returns the paths of the written files.
pub fn render_history_charts(history: &TrainingHistory, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let epochs: Vec<f64> = history.epochs.iter().map(|&e| e as f64).collect();
    let mut written = Vec::new();

    let accuracy_path = output_dir.join("accuracy.svg");
    render_line_chart(
        "Accuracy",
        "epoch",
        "accuracy",
        &epochs,
        &[
            Series {
                name: "train".to_string(),
                values: history.train_accuracy.clone(),
                color: COLOR_TRAIN.to_string(),
            },
            Series {
                name: "validation".to_string(),
                values: history.val_accuracy.clone(),
                color: COLOR_VALID.to_string(),
            },
        ],
        &accuracy_path,
    )?;
    written.push(accuracy_path);

    let loss_path = output_dir.join("loss.svg");
    render_line_chart(
        "Loss",
        "epoch",
        "loss",
        &epochs,
        &[
            Series {
                name: "train".to_string(),
                values: history.train_loss.clone(),
                color: COLOR_TRAIN.to_string(),
            },
            Series {
                name: "validation".to_string(),
                values: history.val_loss.clone(),
                color: COLOR_VALID.to_string(),
            },
        ],
        &loss_path,
    )?;
    written.push(loss_path);

    let lr_path = output_dir.join("lr.svg");
    render_line_chart(
        "Learning rate",
        "epoch",
        "learning rate",
        &epochs,
        &[Series {
            name: "lr".to_string(),
            values: history.learning_rate.clone(),
            color: COLOR_LR.to_string(),
        }],
        &lr_path,
    )?;
    written.push(lr_path);

    Ok(written)
}

/// Renders a single line chart to an SVG file
pub fn render_line_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    x_values: &[f64],
    series: &[Series],
    output_path: &Path,
) -> Result<()> {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let x_min = x_values.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = x_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (y_min, y_max) = value_range(series);

    let x_span = (x_max - x_min).max(1e-12);
    let y_span = (y_max - y_min).max(1e-12);

    let to_x = |v: f64| MARGIN_LEFT + ((v - x_min) / x_span) * plot_width;
    let to_y = |v: f64| MARGIN_TOP + plot_height - ((v - y_min) / y_span) * plot_height;

    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {CHART_WIDTH} {CHART_HEIGHT}" width="{CHART_WIDTH}" height="{CHART_HEIGHT}">"#,
    ));
    svg.push_str(&format!(
        r#"<rect width="{CHART_WIDTH}" height="{CHART_HEIGHT}" fill="white"/>"#,
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{COLOR_TEXT}">{}</text>"#,
        CHART_WIDTH / 2.0,
        escape_xml(title)
    ));

    // Horizontal grid with value labels
    for i in 0..=5 {
        let y = MARGIN_TOP + plot_height - (i as f64 / 5.0) * plot_height;
        let value = y_min + (i as f64 / 5.0) * y_span;

        svg.push_str(&format!(
            r#"<line x1="{MARGIN_LEFT}" y1="{y}" x2="{}" y2="{y}" stroke="{COLOR_GRID}" stroke-width="1"/>"#,
            MARGIN_LEFT + plot_width
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{COLOR_TEXT}">{}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            format_tick(value)
        ));
    }

    // Axes
    svg.push_str(&format!(
        r#"<line x1="{MARGIN_LEFT}" y1="{}" x2="{}" y2="{}" stroke="{COLOR_AXIS}" stroke-width="2"/>"#,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height
    ));
    svg.push_str(&format!(
        r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{}" stroke="{COLOR_AXIS}" stroke-width="2"/>"#,
        MARGIN_TOP + plot_height
    ));

    // Axis labels
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{COLOR_TEXT}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        escape_xml(x_label)
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{COLOR_TEXT}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0,
        CHART_HEIGHT / 2.0,
        escape_xml(y_label)
    ));

    // X tick labels
    for &x_value in x_values {
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{COLOR_TEXT}">{x_value:.0}</text>"#,
            to_x(x_value),
            MARGIN_TOP + plot_height + 20.0
        ));
    }

    // Lines and markers
    for line in series {
        if line.values.is_empty() {
            continue;
        }

        let mut path = String::new();
        for (i, (&x_value, &y_value)) in x_values.iter().zip(line.values.iter()).enumerate() {
            let cmd = if i == 0 { "M" } else { " L" };
            path.push_str(&format!("{cmd} {} {}", to_x(x_value), to_y(y_value)));
        }
        svg.push_str(&format!(
            r#"<path d="{path}" fill="none" stroke="{}" stroke-width="3"/>"#,
            line.color
        ));

        for (&x_value, &y_value) in x_values.iter().zip(line.values.iter()) {
            svg.push_str(&format!(
                r#"<circle cx="{}" cy="{}" r="4" fill="{}" stroke="white" stroke-width="2"/>"#,
                to_x(x_value),
                to_y(y_value),
                line.color
            ));
        }
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 10.0;
    for line in series {
        svg.push_str(&format!(
            r#"<rect x="{}" y="{legend_y}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 120.0,
            line.color
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{COLOR_TEXT}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 100.0,
            legend_y + 12.0,
            escape_xml(&line.name)
        ));
        legend_y += 25.0;
    }

    svg.push_str("</svg>");

    fs::write(output_path, svg)?;
    Ok(())
}

/// Value range over all series, padded so flat lines stay visible
fn value_range(series: &[Series]) -> (f64, f64) {
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for line in series {
        for &v in &line.values {
            y_min = y_min.min(v);
            y_max = y_max.max(v);
        }
    }
    if !y_min.is_finite() || !y_max.is_finite() {
        return (0.0, 1.0);
    }

    let padding = ((y_max - y_min) * 0.05).max(y_max.abs() * 1e-3).max(1e-9);
    ((y_min - padding).min(0.0), y_max + padding)
}

fn format_tick(value: f64) -> String {
    if value.abs() >= 0.01 || value == 0.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.1e}")
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
