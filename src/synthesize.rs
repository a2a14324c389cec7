//! Coastline synthesis: clips real coastlines and bounding polygons
//! against each other so that the surviving coast segments fully encircle
//! the imported region. Inland regions have no real coast at all, and the
//! ground-tile walk needs a closed boundary to work with.

use std::cmp::Ordering;

use log::{info, warn};

use crate::geometry::{
    find_path_intersections, is_area_at_least_partly_in_area, PathIntersection,
};
use crate::types::{Coast, CoastState, GeoCoord};

/// Clips `coastlines` against `bounding_polygons` and returns the combined
/// set of synthesized coast segments, with all `Undefined` side states
/// resolved.
pub fn synthesize_coastlines(coastlines: &[Coast], bounding_polygons: &[Coast]) -> Vec<Coast> {
    let mut synthesized = clip_coastlines(bounding_polygons, coastlines);

    for coast in &mut synthesized {
        if coast.right == CoastState::Undefined {
            coast.right = CoastState::Unknown;
        }
    }

    // An area with an unresolved land side is water if it sits inside some
    // water-right coast, land otherwise.
    let enclosed_in_water: Vec<bool> = synthesized
        .iter()
        .map(|coast| {
            coast.left == CoastState::Undefined
                && coast.is_area
                && synthesized.iter().any(|test| {
                    test.right == CoastState::Water
                        && is_area_at_least_partly_in_area(&test.points, &coast.points)
                })
        })
        .collect();

    for (coast, in_water) in synthesized.iter_mut().zip(enclosed_in_water) {
        if coast.left == CoastState::Undefined {
            coast.left = if in_water {
                CoastState::Water
            } else {
                CoastState::Land
            };
        }
    }

    info!(
        "{} bounding polygon(s) and {} coastline(s) synthesized into {} coastline(s)",
        bounding_polygons.len(),
        coastlines.len(),
        synthesized.len()
    );

    synthesized
}

/// Copy the ring slice `[start, end)` of `src` into `dst`, wrapping over
/// the ring seam when `start` lies behind `end` (or on the same segment but
/// farther along it).
fn cut_path(
    dst: &mut Vec<GeoCoord>,
    src: &[GeoCoord],
    start: usize,
    end: usize,
    start_distance_square: f64,
    end_distance_square: f64,
) {
    let start = start % src.len();
    let end = end % src.len();

    if start > end || (start == end && start_distance_square > end_distance_square) {
        dst.extend_from_slice(&src[start..]);
        dst.extend_from_slice(&src[..end]);
    } else {
        dst.extend_from_slice(&src[start..end]);
    }
}

fn sort_by_a(i1: &PathIntersection, i2: &PathIntersection) -> Ordering {
    i1.a_index.cmp(&i2.a_index).then(
        i1.a_distance_square
            .partial_cmp(&i2.a_distance_square)
            .unwrap_or(Ordering::Equal),
    )
}

fn sort_by_b(i1: &PathIntersection, i2: &PathIntersection) -> Ordering {
    i1.b_index.cmp(&i2.b_index).then(
        i1.b_distance_square
            .partial_cmp(&i2.b_distance_square)
            .unwrap_or(Ordering::Equal),
    )
}

fn clip_coastlines(bounding_polygons: &[Coast], coastlines: &[Coast]) -> Vec<Coast> {
    let mut synthesized: Vec<Coast> = Vec::new();

    // Crossings of each coastline with any bounding polygon, collected
    // while the polygons are being cut.
    let mut way_intersections: Vec<Vec<PathIntersection>> = vec![Vec::new(); coastlines.len()];

    for polygon in bounding_polygons {
        let candidate = Coast {
            id: polygon.id,
            points: polygon.points.clone(),
            is_area: true,
            left: polygon.left,
            right: polygon.right,
        };

        let mut candidate_intersections: Vec<PathIntersection> = Vec::new();

        for (wi, coastline) in coastlines.iter().enumerate() {
            let intersections = find_path_intersections(
                &candidate.points,
                &coastline.points,
                candidate.is_area,
                coastline.is_area,
            );

            // Crossings with orientation zero only touch; they would break
            // the in/out alternation below.
            let mut valid = 0;
            for intersection in intersections {
                if intersection.orientation != 0.0 {
                    candidate_intersections.push(intersection);
                    way_intersections[wi].push(intersection);
                    valid += 1;
                }
            }

            if valid % 2 != 0 {
                warn!(
                    "Odd count ({}) of valid intersections with coastline {}",
                    valid, coastline.id
                );
            }
        }

        if candidate_intersections.is_empty() {
            synthesized.push(candidate);
            continue;
        }

        if candidate_intersections.len() % 2 != 0 {
            warn!(
                "Odd count of intersections: {}; skipping bounding polygon {}",
                candidate_intersections.len(),
                candidate.id
            );
            continue;
        }

        candidate_intersections.sort_by(sort_by_a);

        for ii in 0..candidate_intersections.len() {
            let int1 = candidate_intersections[ii];
            let int2 = candidate_intersections[(ii + 1) % candidate_intersections.len()];

            let mut points = vec![int1.point];
            cut_path(
                &mut points,
                &candidate.points,
                int1.a_index + 1,
                int2.a_index + 1,
                int1.a_distance_square,
                int2.a_distance_square,
            );
            points.push(int2.point);

            synthesized.push(Coast {
                id: candidate.id,
                points,
                is_area: false,
                left: if int1.orientation > 0.0 {
                    CoastState::Water
                } else {
                    CoastState::Land
                },
                right: candidate.right,
            });
        }
    }

    for (wi, coastline) in coastlines.iter().enumerate() {
        let intersections = &mut way_intersections[wi];

        if intersections.is_empty() {
            // An island that never meets a bounding polygon survives iff it
            // lies inside one of them.
            if coastline.is_area
                && bounding_polygons.iter().any(|polygon| {
                    is_area_at_least_partly_in_area(&coastline.points, &polygon.points)
                })
            {
                synthesized.push(coastline.clone());
            }
            continue;
        }

        if intersections.len() % 2 != 0 {
            warn!(
                "Odd count of intersections: {}; skipping coastline {}",
                intersections.len(),
                coastline.id
            );
            continue;
        }

        intersections.sort_by(sort_by_b);

        let limit = if coastline.is_area {
            intersections.len()
        } else {
            intersections.len() - 1
        };

        for ii in 0..limit {
            let int1 = intersections[ii];
            let int2 = intersections[(ii + 1) % intersections.len()];

            // Keep only the pieces lying inside the data polygon.
            if int1.orientation < 0.0 {
                continue;
            }

            let mut points = vec![int1.point];
            cut_path(
                &mut points,
                &coastline.points,
                int1.b_index + 1,
                int2.b_index + 1,
                int1.b_distance_square,
                int2.b_distance_square,
            );
            points.push(int2.point);

            synthesized.push(Coast {
                id: coastline.id,
                points,
                is_area: false,
                left: coastline.left,
                right: coastline.right,
            });
        }
    }

    synthesized
}
