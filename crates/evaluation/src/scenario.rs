use anyhow::{Context, Result};
use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use tracing::{info, warn};
use tracking_rs::{
    ClassifiedRoiArray, DetectedObjects, MultiObjectTracker, Odometry, TrackerUpdateStatus,
};
use uuid::Uuid;

/// One line of a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A detection cycle.
    Detections {
        detections: DetectedObjects,
        odometry: Odometry,
    },
    /// A vision cycle.
    Rois {
        rois: ClassifiedRoiArray,
        tf_camera_from_track: Isometry3<f64>,
    },
}

/// Read a JSON lines scenario. Blank lines are skipped.
pub fn read_events(reader: impl BufRead) -> Result<Vec<Event>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(
                serde_json::from_str::<Event>(&line)
                    .with_context(|| format!("invalid event on line {}", idx + 1)),
            ),
            Err(err) => Some(Err(err.into())),
        })
        .collect()
}

/// One live track after a detection cycle.
#[derive(Debug, Serialize)]
pub struct TrackRow {
    /// Capture time of the cycle, in seconds.
    pub stamp: f64,
    pub object_id: Uuid,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub class: String,
    pub status: String,
}

/// Counters of a replayed scenario.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub detection_cycles: usize,
    pub rejected_cycles: usize,
    pub vision_cycles: usize,
    pub rows: usize,
}

/// Drive a tracker with a sequence of events and write the live tracks of every applied
/// detection cycle.
pub fn replay<W: Write>(
    tracker: &mut MultiObjectTracker,
    events: impl IntoIterator<Item = Event>,
    writer: &mut csv::Writer<W>,
) -> Result<Summary> {
    let mut summary = Summary::default();

    for event in events {
        match event {
            Event::Detections {
                detections,
                odometry,
            } => {
                summary.detection_cycles += 1;
                let stamp = detections.header.stamp;
                let result = tracker.update(detections, &odometry);

                if result.status != TrackerUpdateStatus::Ok {
                    warn!(stamp = ?stamp, "detection cycle: {}", result.status);
                }

                let objects = match result.objects {
                    Some(objects) if result.status.is_applied() => objects,
                    _ => {
                        summary.rejected_cycles += 1;
                        continue;
                    }
                };

                for object in objects.objects {
                    let class = object
                        .classification
                        .first()
                        .map(|classification| classification.classification.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    writer.serialize(TrackRow {
                        stamp: objects.header.stamp.as_secs_f64(),
                        object_id: object.object_id,
                        x: object.position.x,
                        y: object.position.y,
                        vx: object.velocity.x,
                        vy: object.velocity.y,
                        class,
                        status: format!("{:?}", result.status),
                    })?;
                    summary.rows += 1;
                }
            }
            Event::Rois {
                rois,
                tf_camera_from_track,
            } => {
                summary.vision_cycles += 1;
                tracker.update_vision(&rois, &tf_camera_from_track);
            }
        }
    }

    writer.flush()?;
    info!(
        detection_cycles = summary.detection_cycles,
        rejected_cycles = summary.rejected_cycles,
        vision_cycles = summary.vision_cycles,
        rows = summary.rows,
        tracks = tracker.tracks().len(),
        "scenario replayed"
    );

    Ok(summary)
}
