//! Planar geometry kernel: segment intersection, point-in-polygon and
//! path/path intersection discovery.

use crate::types::GeoCoord;

/// Squared planar distance between two coordinates.
pub fn distance_square(a: &GeoCoord, b: &GeoCoord) -> f64 {
    let d_lon = a.lon - b.lon;
    let d_lat = a.lat - b.lat;
    d_lon * d_lon + d_lat * d_lat
}

/// Whether segments `a1-a2` and `b1-b2` intersect. Segments sharing an
/// endpoint count as intersecting; colinear overlap does not.
pub fn lines_intersect(a1: &GeoCoord, a2: &GeoCoord, b1: &GeoCoord, b2: &GeoCoord) -> bool {
    if a1 == b1 || a1 == b2 || a2 == b1 || a2 == b2 {
        return true;
    }

    let denom = (b2.lat - b1.lat) * (a2.lon - a1.lon) - (b2.lon - b1.lon) * (a2.lat - a1.lat);
    if denom == 0.0 {
        // parallel or colinear
        return false;
    }

    let ua = ((b2.lon - b1.lon) * (a1.lat - b1.lat) - (b2.lat - b1.lat) * (a1.lon - b1.lon)) / denom;
    let ub = ((a2.lon - a1.lon) * (a1.lat - b1.lat) - (a2.lat - a1.lat) * (a1.lon - b1.lon)) / denom;

    (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub)
}

/// Intersection point of segments `a1-a2` and `b1-b2`, if any. A shared
/// endpoint is returned as the intersection point itself.
pub fn get_line_intersection(
    a1: &GeoCoord,
    a2: &GeoCoord,
    b1: &GeoCoord,
    b2: &GeoCoord,
) -> Option<GeoCoord> {
    if a1 == b1 || a1 == b2 {
        return Some(*a1);
    }
    if a2 == b1 || a2 == b2 {
        return Some(*a2);
    }

    let denom = (b2.lat - b1.lat) * (a2.lon - a1.lon) - (b2.lon - b1.lon) * (a2.lat - a1.lat);
    if denom == 0.0 {
        return None;
    }

    let ua = ((b2.lon - b1.lon) * (a1.lat - b1.lat) - (b2.lat - b1.lat) * (a1.lon - b1.lon)) / denom;
    let ub = ((a2.lon - a1.lon) * (a1.lat - b1.lat) - (a2.lat - a1.lat) * (a1.lon - b1.lon)) / denom;

    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        Some(GeoCoord::new(
            a1.lat + ua * (a2.lat - a1.lat),
            a1.lon + ua * (a2.lon - a1.lon),
        ))
    } else {
        None
    }
}

/// One crossing between a segment of path A and a segment of path B.
#[derive(Debug, Clone, Copy)]
pub struct PathIntersection {
    /// Index of the crossing segment's start point in path A.
    pub a_index: usize,
    /// Index of the crossing segment's start point in path B.
    pub b_index: usize,
    pub a_distance_square: f64,
    pub b_distance_square: f64,
    pub point: GeoCoord,
    /// Side of B's segment line that A's segment endpoint lands on.
    /// Positive: A passes from B's right side to B's left side. Zero: the
    /// paths touch without crossing (A's segment ends on B's line).
    pub orientation: f64,
}

/// All crossings between path `a` and path `b`. Area paths wrap around from
/// their last point back to their first. A crossing exactly on a path vertex
/// is reported once, attributed to the segment starting at that vertex.
pub fn find_path_intersections(
    a: &[GeoCoord],
    b: &[GeoCoord],
    a_is_area: bool,
    b_is_area: bool,
) -> Vec<PathIntersection> {
    let mut intersections = Vec::new();

    if a.len() < 2 || b.len() < 2 {
        return intersections;
    }

    let a_segments = if a_is_area { a.len() } else { a.len() - 1 };
    let b_segments = if b_is_area { b.len() } else { b.len() - 1 };

    for ai in 0..a_segments {
        let a1 = a[ai];
        let a2 = a[(ai + 1) % a.len()];

        for bi in 0..b_segments {
            let b1 = b[bi];
            let b2 = b[(bi + 1) % b.len()];

            let point = match get_line_intersection(&a1, &a2, &b1, &b2) {
                Some(p) => p,
                None => continue,
            };

            // A hit on a segment's start vertex was already reported by the
            // previous segment of the same path.
            if point == a1 && (ai > 0 || a_is_area) {
                continue;
            }
            if point == b1 && (bi > 0 || b_is_area) {
                continue;
            }

            let orientation =
                (b2.lon - b1.lon) * (a2.lat - b1.lat) - (b2.lat - b1.lat) * (a2.lon - b1.lon);

            intersections.push(PathIntersection {
                a_index: ai,
                b_index: bi,
                a_distance_square: distance_square(&a1, &point),
                b_distance_square: distance_square(&b1, &point),
                point,
                orientation,
            });
        }
    }

    intersections
}

/// Ray-cast test: whether `point` lies strictly inside the ring `area`.
/// The closing edge from the last point back to the first is implicit.
pub fn is_coord_in_area(point: &GeoCoord, area: &[GeoCoord]) -> bool {
    let mut inside = false;

    for i in 0..area.len() {
        let p1 = &area[i];
        let p2 = &area[(i + 1) % area.len()];

        // The edge must span the point's latitude.
        if (p1.lat > point.lat) == (p2.lat > point.lat) {
            continue;
        }

        let lon_cross = p1.lon + (p2.lon - p1.lon) * (point.lat - p1.lat) / (p2.lat - p1.lat);
        if point.lon < lon_cross {
            inside = !inside;
        }
    }

    inside
}

/// Whether ring `inner` lies at least partly inside ring `outer`: some
/// vertex of `inner` is strictly inside, or the two boundaries intersect.
pub fn is_area_at_least_partly_in_area(inner: &[GeoCoord], outer: &[GeoCoord]) -> bool {
    for p in inner {
        if is_coord_in_area(p, outer) {
            return true;
        }
    }

    for i in 0..inner.len() {
        let i2 = (i + 1) % inner.len();
        for o in 0..outer.len() {
            let o2 = (o + 1) % outer.len();
            if lines_intersect(&inner[i], &inner[i2], &outer[o], &outer[o2]) {
                return true;
            }
        }
    }

    false
}
