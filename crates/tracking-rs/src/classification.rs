use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumeration type for the object class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectClass {
    Unknown,
    Car,
    Truck,
    Bus,
    Trailer,
    Motorcycle,
    Bicycle,
    Pedestrian,
}

const NUM_CLASSES: usize = 8;

impl ObjectClass {
    /// Every class, in discriminant order.
    pub const ALL: [ObjectClass; NUM_CLASSES] = [
        ObjectClass::Unknown,
        ObjectClass::Car,
        ObjectClass::Truck,
        ObjectClass::Bus,
        ObjectClass::Trailer,
        ObjectClass::Motorcycle,
        ObjectClass::Bicycle,
        ObjectClass::Pedestrian,
    ];
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectClass::Unknown => "unknown",
            ObjectClass::Car => "car",
            ObjectClass::Truck => "truck",
            ObjectClass::Bus => "bus",
            ObjectClass::Trailer => "trailer",
            ObjectClass::Motorcycle => "motorcycle",
            ObjectClass::Bicycle => "bicycle",
            ObjectClass::Pedestrian => "pedestrian",
        };
        write!(f, "{}", name)
    }
}

/// A single class hypothesis with its probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectClassification {
    pub classification: ObjectClass,
    pub probability: f32,
}

impl ObjectClassification {
    /// Returns a new ObjectClassification
    pub fn new(classification: ObjectClass, probability: f32) -> ObjectClassification {
        ObjectClassification {
            classification,
            probability,
        }
    }
}

/// Maintains a smoothed class distribution for a single track.
///
/// Each observation is normalized and blended into the current estimate with weight `smoothing`,
/// so a single misclassified frame cannot flip the class of a long lived track.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationTracker {
    probabilities: [f32; NUM_CLASSES],
    smoothing: f32,
}

impl Default for ClassificationTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ClassificationTracker {
    /// Returns a new ClassificationTracker with all mass on `ObjectClass::Unknown`.
    ///
    /// # Parameters
    ///
    /// * `smoothing`: Weight of a new observation in `(0.0, 1.0]`. Default `0.5`.
    pub fn new(smoothing: Option<f32>) -> ClassificationTracker {
        let mut probabilities = [0.0; NUM_CLASSES];
        probabilities[ObjectClass::Unknown as usize] = 1.0;
        ClassificationTracker {
            probabilities,
            smoothing: smoothing.unwrap_or(0.5).clamp(f32::EPSILON, 1.0),
        }
    }

    /// Returns a ClassificationTracker initialized from a first set of class hypotheses.
    pub fn from_classifications(classifications: &[ObjectClassification]) -> ClassificationTracker {
        let mut tracker = ClassificationTracker::default();
        if let Some(observation) = normalize(classifications) {
            tracker.probabilities = observation;
        }
        tracker
    }

    /// Blend a new set of class hypotheses into the estimate. Observations carrying no
    /// probability mass are ignored.
    pub fn update(&mut self, classifications: &[ObjectClassification]) {
        let observation = match normalize(classifications) {
            Some(observation) => observation,
            None => return,
        };

        self.probabilities
            .iter_mut()
            .zip(observation.iter())
            .for_each(|(p, o)| *p = (1.0 - self.smoothing) * *p + self.smoothing * o);

        let total = self.probabilities.iter().sum::<f32>();
        self.probabilities.iter_mut().for_each(|p| *p /= total);
    }

    /// Returns the probability of `class`
    pub fn probability(&self, class: ObjectClass) -> f32 {
        self.probabilities[class as usize]
    }

    /// Returns the most likely class
    pub fn most_likely(&self) -> ObjectClassification {
        ObjectClass::ALL
            .iter()
            .map(|class| ObjectClassification::new(*class, self.probability(*class)))
            .fold(
                ObjectClassification::new(ObjectClass::Unknown, f32::MIN),
                |best, candidate| {
                    if candidate.probability > best.probability {
                        candidate
                    } else {
                        best
                    }
                },
            )
    }

    /// Returns every class with non-zero probability, most likely first.
    pub fn classifications(&self) -> Vec<ObjectClassification> {
        let mut classifications = ObjectClass::ALL
            .iter()
            .map(|class| ObjectClassification::new(*class, self.probability(*class)))
            .filter(|classification| classification.probability > 0.0)
            .collect::<Vec<_>>();
        classifications.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        classifications
    }
}

/// Sum the hypotheses per class and scale them to a distribution.
fn normalize(classifications: &[ObjectClassification]) -> Option<[f32; NUM_CLASSES]> {
    let mut distribution = [0.0; NUM_CLASSES];
    classifications
        .iter()
        .filter(|c| c.probability.is_finite() && c.probability > 0.0)
        .for_each(|c| distribution[c.classification as usize] += c.probability);

    let total = distribution.iter().sum::<f32>();
    if total > 0.0 {
        distribution.iter_mut().for_each(|p| *p /= total);
        Some(distribution)
    } else {
        None
    }
}
