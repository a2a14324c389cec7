//! Polyline optimization ahead of cell indexing. Operates in projected
//! pixel space so a single tolerance works across zoom levels.

use clap::ValueEnum;
use serde::Deserialize;

use crate::projection::PixelProjection;
use crate::types::GeoCoord;

/// How aggressively coastline geometry is reduced before indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeMethod {
    /// Keep every point.
    None,
    /// Single-pass radial reduction, cheap but coarse.
    Fast,
    /// Douglas-Peucker reduction, keeps shape within tolerance.
    #[default]
    Quality,
}

impl std::fmt::Display for OptimizeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OptimizeMethod::None => "none",
            OptimizeMethod::Fast => "fast",
            OptimizeMethod::Quality => "quality",
        })
    }
}

/// Reduces a polyline. First and last points are always kept; all surviving
/// points are taken verbatim from the input.
pub fn optimize_polyline(
    points: &[GeoCoord],
    method: OptimizeMethod,
    tolerance_px: f64,
    projection: &PixelProjection,
) -> Vec<GeoCoord> {
    if points.len() <= 2 || tolerance_px <= 0.0 {
        return points.to_vec();
    }

    match method {
        OptimizeMethod::None => points.to_vec(),
        OptimizeMethod::Fast => radial_reduce(points, tolerance_px, projection),
        OptimizeMethod::Quality => douglas_peucker(points, tolerance_px, projection),
    }
}

fn radial_reduce(
    points: &[GeoCoord],
    tolerance_px: f64,
    projection: &PixelProjection,
) -> Vec<GeoCoord> {
    let tolerance_sq = tolerance_px * tolerance_px;
    let mut result = vec![points[0]];
    let mut last = projection.project(&points[0]);

    for p in &points[1..points.len() - 1] {
        let (x, y) = projection.project(p);
        let dx = x - last.0;
        let dy = y - last.1;

        if dx * dx + dy * dy > tolerance_sq {
            result.push(*p);
            last = (x, y);
        }
    }

    result.push(points[points.len() - 1]);
    result
}

fn douglas_peucker(
    points: &[GeoCoord],
    tolerance_px: f64,
    projection: &PixelProjection,
) -> Vec<GeoCoord> {
    let projected: Vec<(f64, f64)> = points.iter().map(|p| projection.project(p)).collect();
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];

    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }

        let mut max_dist = 0.0;
        let mut max_index = first;

        for i in first + 1..last {
            let dist = segment_distance(projected[i], projected[first], projected[last]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > tolerance_px {
            keep[max_index] = true;
            stack.push((first, max_index));
            stack.push((max_index, last));
        }
    }

    points
        .iter()
        .zip(keep.iter())
        .filter(|(_, &k)| k)
        .map(|(p, _)| *p)
        .collect()
}

/// Distance of `p` from the segment `a-b` in pixel space.
fn segment_distance(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        let (ex, ey) = (p.0 - a.0, p.1 - a.1);
        return (ex * ex + ey * ey).sqrt();
    }

    let t = ((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq;
    let t = t.clamp(0.0, 1.0);
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    let (ex, ey) = (p.0 - cx, p.1 - cy);
    (ex * ex + ey * ey).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colinear_chain_collapses() {
        let projection = PixelProjection::for_level(8);
        let points: Vec<GeoCoord> = (0..10).map(|i| GeoCoord::new(0.0, i as f64)).collect();

        let reduced = optimize_polyline(&points, OptimizeMethod::Quality, 1.0, &projection);
        assert_eq!(reduced.len(), 2);
        assert_eq!(reduced[0], points[0]);
        assert_eq!(reduced[1], points[9]);
    }

    #[test]
    fn test_corner_survives() {
        let projection = PixelProjection::for_level(8);
        let points = vec![
            GeoCoord::new(0.0, 0.0),
            GeoCoord::new(0.0, 1.0),
            GeoCoord::new(1.0, 1.0),
        ];

        let reduced = optimize_polyline(&points, OptimizeMethod::Quality, 1.0, &projection);
        assert_eq!(reduced, points);
    }

    #[test]
    fn test_zero_tolerance_keeps_everything() {
        let projection = PixelProjection::for_level(8);
        let points: Vec<GeoCoord> = (0..5).map(|i| GeoCoord::new(0.0, i as f64)).collect();

        let reduced = optimize_polyline(&points, OptimizeMethod::Quality, 0.0, &projection);
        assert_eq!(reduced, points);
    }

    #[test]
    fn test_fast_keeps_endpoints() {
        let projection = PixelProjection::for_level(0);
        let points: Vec<GeoCoord> = (0..20).map(|i| GeoCoord::new(0.0, i as f64 * 0.1)).collect();

        let reduced = optimize_polyline(&points, OptimizeMethod::Fast, 5.0, &projection);
        assert_eq!(reduced.first(), points.first());
        assert_eq!(reduced.last(), points.last());
        assert!(reduced.len() < points.len());
    }
}
