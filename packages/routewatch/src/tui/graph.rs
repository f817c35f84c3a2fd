//! Graph pane: the current topology drawn on a canvas, nodes on a circle.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, TAU};

use console_mux::{FitTarget, GraphView, Size};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        Block, Borders, Widget,
        canvas::{Canvas, Circle, Line as CanvasLine},
    },
};

use super::theme;

const RING_RADIUS: f64 = 0.8;
/// Narrower panes draw nodes without labels.
const MIN_LABEL_WIDTH: u16 = 24;

/// Canvas coordinates for each node, in snapshot order.
pub fn circle_layout(count: usize) -> Vec<(f64, f64)> {
    match count {
        0 => Vec::new(),
        1 => vec![(0.0, 0.0)],
        n => (0..n)
            .map(|i| {
                // First node at the top, then clockwise.
                let angle = FRAC_PI_2 - TAU * i as f64 / n as f64;
                (RING_RADIUS * angle.cos(), RING_RADIUS * angle.sin())
            })
            .collect(),
    }
}

fn node_radius(weight: f64) -> f64 {
    (0.015 * weight.max(0.0).sqrt()).clamp(0.01, 0.08)
}

#[derive(Debug, Default)]
pub struct GraphPane {
    size: Size,
}

impl FitTarget for GraphPane {
    fn fit(&mut self, size: Size) {
        self.size = size;
    }
}

impl GraphPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&self, view: &GraphView, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(format!(
                " network: {} nodes, {} links ",
                view.nodes.len(),
                view.links.len()
            ))
            .borders(Borders::TOP | Borders::LEFT | Borders::RIGHT)
            .border_style(Style::default().fg(theme::BORDER));

        if view.nodes.is_empty() {
            let inner = block.inner(area);
            block.render(area, buf);
            if inner.height > 0 {
                buf.set_string(
                    inner.x + 1,
                    inner.y + inner.height / 2,
                    "waiting for topology…",
                    theme::dim(),
                );
            }
            return;
        }

        let positions = circle_layout(view.nodes.len());
        let show_labels = self.size.width >= MIN_LABEL_WIDTH;
        let at: HashMap<&str, (f64, f64)> = view
            .nodes
            .iter()
            .zip(positions.iter().copied())
            .map(|(node, pos)| (node.id.as_str(), pos))
            .collect();

        Canvas::default()
            .block(block)
            .marker(Marker::Braille)
            .x_bounds([-1.0, 1.0])
            .y_bounds([-1.0, 1.0])
            .paint(|ctx| {
                for link in &view.links {
                    let (Some(&(x1, y1)), Some(&(x2, y2))) =
                        (at.get(link.source.as_str()), at.get(link.target.as_str()))
                    else {
                        continue;
                    };
                    let color = link
                        .color
                        .as_deref()
                        .and_then(theme::parse_hex)
                        .unwrap_or(theme::LINK_DEFAULT);
                    ctx.draw(&CanvasLine {
                        x1,
                        y1,
                        x2,
                        y2,
                        color,
                    });
                }
                ctx.layer();

                for (node, &(x, y)) in view.nodes.iter().zip(&positions) {
                    let is_self = view.self_id.as_deref() == Some(node.id.as_str());
                    let color = node_color(node.color.as_deref(), is_self);
                    ctx.draw(&Circle {
                        x,
                        y,
                        radius: node_radius(node.weight),
                        color,
                    });
                    if !show_labels {
                        continue;
                    }
                    let style = if is_self {
                        theme::label().fg(theme::SELF_NODE)
                    } else {
                        theme::label().fg(color)
                    };
                    ctx.print(x + 0.05, y, Span::styled(node.name.clone(), style));
                }
            })
            .render(area, buf);
    }
}

fn node_color(color: Option<&str>, is_self: bool) -> Color {
    match color.and_then(theme::parse_hex) {
        Some(color) => color,
        None if is_self => theme::SELF_NODE,
        None => theme::NODE_DEFAULT,
    }
}
