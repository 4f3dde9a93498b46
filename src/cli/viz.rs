//! Terminal visualization using braille graphics
//!
//! Metric trend lines are drawn on a drawille canvas; target ranges and
//! cause trees are plain box-drawing text.

use drawille::Canvas;

use crate::core::cause_tree::{children_of, CauseNode, NodeType};
use crate::core::stats::{parse_target, TargetSpec};
use crate::entities::metric::Metric;

/// Default canvas size for trend charts, in braille pixels
pub const CHART_WIDTH: u32 = 120;
pub const CHART_HEIGHT: u32 = 40;

/// Bar width for target range bars, in characters
const BAR_WIDTH: usize = 60;

fn scale(value: f64, min: f64, max: f64, pixels: u32) -> u32 {
    if (max - min).abs() < f64::EPSILON {
        return pixels / 2;
    }
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    (t * (pixels - 1) as f64).round() as u32
}

/// Render a metric's monthly actuals as a line chart
///
/// The latest single-value target, if any, is drawn as a dotted line.
/// Months whose actual isn't a number are left out.
///
/// # Example Output
/// ```text
/// OTD  (2024-01 .. 2024-06, 6 points)
///  98.00 ┤⠀⠀⠀⠀⠀⠀⢀⠔⠉⠢⡀
///  91.00 ┤⠤⠤⠤⠤⠤⠔⠁⠤⠤⠤⠈⠢⠤⠤
/// ```
pub fn render_trend_chart(metric: &Metric, width: u32, height: u32) -> String {
    let points: Vec<(&String, f64)> = metric
        .monthly_data
        .iter()
        .filter_map(|(month, entry)| {
            entry
                .actual
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| (month, v))
        })
        .collect();

    if points.is_empty() {
        return format!("{}\n  (no numeric actuals)", metric.name);
    }

    let target = metric
        .latest_month()
        .map(|(_, e)| parse_target(&e.target))
        .and_then(|t| match t {
            TargetSpec::Value(v) => Some(v),
            _ => None,
        });

    let mut lo = points.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let mut hi = points.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
    if let Some(t) = target {
        lo = lo.min(t);
        hi = hi.max(t);
    }

    let mut canvas = Canvas::new(width, height);
    let x_of = |i: usize| -> u32 {
        if points.len() == 1 {
            width / 2
        } else {
            (i as f64 * (width - 1) as f64 / (points.len() - 1) as f64).round() as u32
        }
    };
    let y_of = |v: f64| -> u32 { height - 1 - scale(v, lo, hi, height) };

    if let Some(t) = target {
        let y = y_of(t);
        for x in (0..width).step_by(4) {
            canvas.set(x, y);
        }
    }

    for (i, (_, v)) in points.iter().enumerate() {
        let (x, y) = (x_of(i), y_of(*v));
        canvas.set(x, y);
        if i > 0 {
            let (px, py) = (x_of(i - 1), y_of(points[i - 1].1));
            canvas.line(px, py, x, y);
        }
    }

    let frame = canvas.frame();
    let rows: Vec<&str> = frame.lines().collect();
    let last = rows.len().saturating_sub(1);

    let mut output = format!(
        "{}  ({} .. {}, {} points)\n",
        metric.name,
        points[0].0,
        points[points.len() - 1].0,
        points.len()
    );
    for (i, row) in rows.iter().enumerate() {
        let label = if i == 0 {
            format!("{:>9.2}", hi)
        } else if i == last {
            format!("{:>9.2}", lo)
        } else {
            " ".repeat(9)
        };
        output.push_str(&format!("{} ┤{}\n", label, row));
    }
    if let Some(t) = target {
        output.push_str(&format!("{} target {:.2} (dotted)\n", " ".repeat(9), t));
    }
    output.trim_end().to_string()
}

/// Render observed min/max against a target range
///
/// Shows min/max range with target limits
pub fn render_range_bar(min: f64, max: f64, lower_limit: f64, upper_limit: f64) -> String {
    let full_range = (upper_limit - lower_limit).abs().max(f64::EPSILON);
    let margin = full_range * 0.1;

    let view_min = lower_limit.min(min) - margin;
    let view_max = upper_limit.max(max) + margin;
    let view_range = view_max - view_min;

    let pos = |v: f64| -> usize {
        (((v - view_min) / view_range) * BAR_WIDTH as f64)
            .max(0.0)
            .min((BAR_WIDTH - 1) as f64) as usize
    };
    let (pos_lower, pos_upper, pos_min, pos_max) =
        (pos(lower_limit), pos(upper_limit), pos(min), pos(max));

    let mut bar: Vec<char> = vec!['─'; BAR_WIDTH];
    bar[pos_lower] = '│';
    bar[pos_upper] = '│';

    for cell in bar.iter_mut().take(pos_max + 1).skip(pos_min) {
        *cell = if *cell == '│' { '╋' } else { '═' };
    }
    bar[pos_min] = if bar[pos_min] == '╋' { '╟' } else { '[' };
    bar[pos_max] = if bar[pos_max] == '╋' { '╢' } else { ']' };

    let bar_str: String = bar.into_iter().collect();
    format!(
        "  Target {:.2} .. {:.2}\n  {}\n  Min={:.2}  Max={:.2}",
        lower_limit, upper_limit, bar_str, min, max
    )
}

/// Render a cause tree as indented text
///
/// # Example Output
/// ```text
/// Late shipments
/// ├── Picking errors [cause-1]
/// │   └── No bin labels [cause-2]
/// └── Carrier delays [cause-3]
/// ```
pub fn render_cause_tree(nodes: &[CauseNode]) -> String {
    let Some(root) = nodes.iter().find(|n| n.node_type == NodeType::Root) else {
        return "(no mind map)".to_string();
    };

    let mut lines = vec![root.text.clone()];
    render_children(nodes, &root.id, "", &mut lines);
    lines.join("\n")
}

fn render_children(nodes: &[CauseNode], parent: &str, prefix: &str, lines: &mut Vec<String>) {
    let mut kids = children_of(nodes, parent);
    kids.sort_by(|a, b| a.y.total_cmp(&b.y));
    let count = kids.len();
    for (i, node) in kids.into_iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        lines.push(format!("{}{}{} [{}]", prefix, branch, node.text, node.id));
        let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(nodes, &node.id, &next, lines);
    }
}

/// Render a percentage as a block bar
pub fn render_progress(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!(
        "{}{} {:>3.0}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        fraction.clamp(0.0, 1.0) * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cause_tree::build_cause_tree;
    use crate::entities::metric::TargetRule;
    use serde_json::json;

    fn otd() -> Metric {
        let mut m = Metric::new("OTD", TargetRule::Gte);
        for (i, v) in ["91", "93", "n/a", "97", "98"].iter().enumerate() {
            m.set_month(&format!("2024-0{}", i + 1), Some(v), Some("95"));
        }
        m
    }

    #[test]
    fn test_trend_chart_header_and_labels() {
        let chart = render_trend_chart(&otd(), CHART_WIDTH, CHART_HEIGHT);
        let first = chart.lines().next().unwrap();
        assert_eq!(first, "OTD  (2024-01 .. 2024-05, 4 points)");
        assert!(chart.contains("98.00"));
        assert!(chart.contains("91.00"));
        assert!(chart.contains("target 95.00"));
    }

    #[test]
    fn test_trend_chart_without_numbers() {
        let mut m = Metric::new("Empty", TargetRule::Gte);
        m.set_month("2024-01", Some("tbd"), None);
        assert!(render_trend_chart(&m, CHART_WIDTH, CHART_HEIGHT).contains("no numeric actuals"));
    }

    #[test]
    fn test_trend_chart_single_flat_point() {
        let mut m = Metric::new("Flat", TargetRule::Gte);
        m.set_month("2024-01", Some("5"), Some(""));
        let chart = render_trend_chart(&m, 20, 8);
        assert!(chart.starts_with("Flat  (2024-01 .. 2024-01, 1 points)"));
    }

    #[test]
    fn test_range_bar() {
        let bar = render_range_bar(12.0, 18.0, 10.0, 20.0);
        assert!(bar.contains("Target 10.00 .. 20.00"));
        assert!(bar.contains('['));
        assert!(bar.contains(']'));
        assert!(bar.contains('│'));
        assert!(bar.contains("Min=12.00  Max=18.00"));
    }

    #[test]
    fn test_range_bar_outside_limits() {
        let bar = render_range_bar(0.0, 30.0, 10.0, 20.0);
        assert!(bar.contains('╋'));
    }

    #[test]
    fn test_cause_tree_text() {
        let tree = json!([
            {"cause": "Picking errors", "children": [{"cause": "No bin labels"}]},
            {"cause": "Carrier delays"}
        ]);
        let nodes = build_cause_tree("Late shipments", &tree).unwrap();
        let text = render_cause_tree(&nodes);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Late shipments");
        assert!(lines[1].starts_with("├── Picking errors"));
        assert!(lines[2].starts_with("│   └── No bin labels"));
        assert!(lines[3].starts_with("└── Carrier delays"));
    }

    #[test]
    fn test_cause_tree_empty() {
        assert_eq!(render_cause_tree(&[]), "(no mind map)");
    }

    #[test]
    fn test_progress() {
        assert_eq!(render_progress(0.5, 4), "██░░  50%");
        assert_eq!(render_progress(1.5, 2), "██ 100%");
    }
}
