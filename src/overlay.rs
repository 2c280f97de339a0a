//! SVG occupancy overlay.
//!
//! Draws every map spot as a polygon colored by its reported status. Spots
//! with no report are drawn as vacant. When a spot is reported more than
//! once the last report wins, matching how a status lookup table fills.

use std::collections::HashMap;
use std::fmt::Write;

use crate::detect::{DetectionResult, SpotStatus};
use crate::map::ParkingMap;

struct Palette {
    fill: &'static str,
    stroke: &'static str,
}

fn palette(status: SpotStatus) -> Palette {
    match status {
        SpotStatus::Occupied => Palette {
            fill: "#ef4444",
            stroke: "#fca5a5",
        },
        SpotStatus::Vacant => Palette {
            fill: "#22c55e",
            stroke: "#86efac",
        },
        SpotStatus::Unknown => Palette {
            fill: "#cbd5e1",
            stroke: "#94a3b8",
        },
    }
}

/// Render `map` with `spots` as a standalone SVG document.
pub fn render_svg(map: &ParkingMap, spots: &[DetectionResult]) -> String {
    let by_spot: HashMap<&str, SpotStatus> = spots
        .iter()
        .map(|spot| (spot.spot_number.as_str(), spot.status))
        .collect();
    let (width, height) = map.dimensions();

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
        w = width,
        h = height
    );
    for spot in &map.spots {
        if spot.points.is_empty() {
            continue;
        }
        let status = by_spot
            .get(spot.id.as_str())
            .copied()
            .unwrap_or(SpotStatus::Vacant);
        let colors = palette(status);
        let points = spot
            .points
            .iter()
            .map(|[x, y]| format!("{},{}", x, y))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            svg,
            r#"  <polygon data-spot="{id}" points="{points}" fill="{fill}" fill-opacity="1" stroke="{stroke}" stroke-width="3"/>"#,
            id = escape(&spot.id),
            points = points,
            fill = colors.fill,
            stroke = colors.stroke
        );
        if let Some((cx, cy)) = spot.centroid() {
            let _ = writeln!(
                svg,
                r##"  <text x="{cx}" y="{cy}" text-anchor="middle" dominant-baseline="middle" font-size="18" font-weight="700" fill="#0b1224" paint-order="stroke" stroke="#e2e8f0" stroke-width="1.2">{id}</text>"##,
                cx = cx,
                cy = cy,
                id = escape(&spot.id)
            );
        }
    }
    svg.push_str("</svg>\n");
    svg
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
