use crate::*;
use fixedbitset::FixedBitSet;

/// The outcome of associating one set of observations with the live tracks.
///
/// Every track index and every observation index appears exactly once: either as a pair in
/// `track_assignments` or in the matching unassigned list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssociatorResult {
    /// For each track, the index of the observation assigned to it.
    pub track_assignments: Vec<Option<usize>>,
    /// Tracks without an observation, ascending.
    pub unassigned_track_indices: Vec<usize>,
    /// Observations without a track, ascending.
    pub unassigned_detection_indices: Vec<usize>,
    /// At least one observation had a shape that could not be interpreted.
    pub had_errors: bool,
}

impl AssociatorResult {
    /// Returns an AssociatorResult where nothing is assigned.
    ///
    /// # Parameters
    ///
    /// * `num_tracks`: Number of tracks taking part in the association.
    /// * `num_observations`: Number of observations taking part in the association.
    /// * `had_errors`: Whether an observation could not be interpreted.
    pub fn unassigned(num_tracks: usize, num_observations: usize, had_errors: bool) -> Self {
        AssociatorResult {
            track_assignments: vec![None; num_tracks],
            unassigned_track_indices: (0..num_tracks).collect(),
            unassigned_detection_indices: (0..num_observations).collect(),
            had_errors,
        }
    }

    /// Returns an AssociatorResult from the output of a linear assignment. Each track and each
    /// observation is used by at most one match; later duplicates are ignored.
    pub fn from_matches(
        num_tracks: usize,
        num_observations: usize,
        matches: &[Match],
        had_errors: bool,
    ) -> Self {
        let mut track_assignments = vec![None; num_tracks];
        let mut assigned_observations = FixedBitSet::with_capacity(num_observations);

        matches
            .iter()
            .filter(|m| m.track_idx() < num_tracks && m.detection_idx() < num_observations)
            .for_each(|m| {
                if track_assignments[m.track_idx()].is_none()
                    && !assigned_observations.put(m.detection_idx())
                {
                    track_assignments[m.track_idx()] = Some(m.detection_idx());
                }
            });

        AssociatorResult {
            unassigned_track_indices: track_assignments
                .iter()
                .enumerate()
                .filter(|(_, assignment)| assignment.is_none())
                .map(|(idx, _)| idx)
                .collect(),
            unassigned_detection_indices: (0..num_observations)
                .filter(|idx| !assigned_observations.contains(*idx))
                .collect(),
            track_assignments,
            had_errors,
        }
    }

    /// Returns the observation assigned to track `track_idx`, if any.
    pub fn assigned_observation(&self, track_idx: usize) -> Option<usize> {
        self.track_assignments.get(track_idx).copied().flatten()
    }

    /// Returns the number of assigned pairs
    pub fn num_assigned(&self) -> usize {
        self.track_assignments.iter().flatten().count()
    }
}

/// Associates a set of observations of type `O` with the live tracks.
pub trait Associator<O: ?Sized> {
    /// Returns a one-to-one assignment between `tracks` and `observations`. Observations that
    /// cannot be interpreted set `had_errors` and stay unassigned.
    fn assign(&self, observations: &O, tracks: &[TrackedObject]) -> AssociatorResult;
}

#[cfg(test)]
mod tests {
    use crate::*;

    #[test]
    fn unassigned() {
        let result = AssociatorResult::unassigned(2, 3, true);

        assert_eq!(result.track_assignments, vec![None, None]);
        assert_eq!(result.unassigned_track_indices, vec![0, 1]);
        assert_eq!(result.unassigned_detection_indices, vec![0, 1, 2]);
        assert!(result.had_errors);
        assert_eq!(result.num_assigned(), 0);
    }

    #[test]
    fn from_matches() {
        let result = AssociatorResult::from_matches(
            3,
            3,
            &[
                Match::new(2, 0, 0.1),
                Match::new(0, 2, 0.3),
                Match::new(1, 2, 0.4),
            ],
            false,
        );

        assert_eq!(result.track_assignments, vec![Some(2), None, Some(0)]);
        assert_eq!(result.unassigned_track_indices, vec![1]);
        assert_eq!(result.unassigned_detection_indices, vec![1]);
        assert_eq!(result.assigned_observation(0), Some(2));
        assert_eq!(result.assigned_observation(1), None);
        assert_eq!(result.assigned_observation(7), None);
        assert_eq!(result.num_assigned(), 2);
    }
}
