use anyhow::{anyhow, Result};
use fixedbitset::FixedBitSet;
use ndarray::*;
use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;

/// Cost added to the gate for pairs that must never be matched.
const GATED_COST_OFFSET: f64 = 1e-5;

/// Scale used to convert costs to integers for the solver.
const COST_SCALE: f64 = 1_000_000_000.0;

#[derive(Debug, Clone)]
pub struct Match {
    track_idx: usize,
    detection_idx: usize,
    distance: f64,
}

impl Match {
    /// Return a new Match
    ///
    /// # Parameters
    ///
    /// - `track_idx`: The match track index.
    /// - `detection_idx`: The match detection index.
    /// - `distance`: Cost of the match.
    pub fn new(track_idx: usize, detection_idx: usize, distance: f64) -> Match {
        Match {
            track_idx,
            detection_idx,
            distance,
        }
    }

    /// Return the track index of the match
    pub fn track_idx(&self) -> usize {
        self.track_idx
    }

    /// Return the detection index of the match
    pub fn detection_idx(&self) -> usize {
        self.detection_idx
    }

    /// Return the cost of the match
    pub fn distance(&self) -> f64 {
        self.distance
    }
}

impl PartialEq for Match {
    fn eq(&self, other: &Self) -> bool {
        self.track_idx == other.track_idx && self.detection_idx == other.detection_idx
    }
}

/// Solve linear assignment problem.
///
/// # Parameters
///
/// - `cost_matrix`: The NxM dimensional cost matrix, where element (i, j) is the association cost between the i-th track and the j-th detection. Infinite or NaN entries are never matched.
/// - `max_distance`: Gating threshold. Associations with cost larger than this value are disregarded. An infinite threshold disables gating, a negative one matches nothing.
///
/// # Returns
///
/// A tuple with the following three entries:
///
/// - A list of matched track and detection indices, ordered by track index.
/// - A list of unmatched track indices, ascending.
/// - A list of unmatched detection indices, ascending.
#[allow(clippy::type_complexity)]
pub fn min_cost_matching(
    cost_matrix: &Array2<f64>,
    max_distance: f64,
) -> Result<(Vec<Match>, Vec<usize>, Vec<usize>)> {
    let (num_tracks, num_detections) = cost_matrix.dim();
    if num_tracks == 0 || num_detections == 0 {
        return Ok((vec![], (0..num_tracks).collect(), (0..num_detections).collect()));
    }
    if max_distance.is_nan() {
        return Err(anyhow!("invalid gating threshold {}", max_distance));
    }
    if max_distance < 0.0 {
        return Ok((vec![], (0..num_tracks).collect(), (0..num_detections).collect()));
    }

    // an infinite gate only excludes non-finite costs
    let gated_cost = if max_distance.is_finite() {
        max_distance + GATED_COST_OFFSET
    } else {
        cost_matrix
            .iter()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, |acc, v| acc.max(*v))
            + GATED_COST_OFFSET
    };
    let clamped = cost_matrix.mapv(|v| {
        if v.is_finite() {
            v.clamp(0.0, gated_cost)
        } else {
            gated_cost
        }
    });

    // kuhn_munkres requires no more rows than columns
    let (solver_matrix, transposed) = if num_tracks > num_detections {
        (clamped.t(), true)
    } else {
        (clamped.view(), false)
    };

    // multiply by large constant to convert from f64 to i64 which satisfies Matrix requirements (f64 does not implement `std::cmp::Ord`)
    let cost_vec = solver_matrix
        .iter()
        .map(|v| (v * COST_SCALE).round() as i64)
        .collect::<Vec<i64>>();

    let matrix = Matrix::from_vec(solver_matrix.nrows(), solver_matrix.ncols(), cost_vec)?;
    let (_, col_indices) = kuhn_munkres_min(&matrix);

    let mut matched_tracks = FixedBitSet::with_capacity(num_tracks);
    let mut matched_detections = FixedBitSet::with_capacity(num_detections);
    let mut matches = col_indices
        .into_iter()
        .enumerate()
        .map(|(row, col)| if transposed { (col, row) } else { (row, col) })
        .filter_map(|(track_idx, detection_idx)| {
            let distance = clamped[[track_idx, detection_idx]];
            (cost_matrix[[track_idx, detection_idx]].is_finite() && distance <= max_distance)
                .then(|| Match::new(track_idx, detection_idx, distance))
        })
        .inspect(|m| {
            matched_tracks.insert(m.track_idx());
            matched_detections.insert(m.detection_idx());
        })
        .collect::<Vec<_>>();
    matches.sort_by_key(|m| m.track_idx());

    Ok((
        matches,
        (0..num_tracks)
            .filter(|idx| !matched_tracks.contains(*idx))
            .collect(),
        (0..num_detections)
            .filter(|idx| !matched_detections.contains(*idx))
            .collect(),
    ))
}
