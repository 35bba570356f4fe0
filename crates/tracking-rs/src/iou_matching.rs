use crate::*;
use anyhow::Result;
use ndarray::*;

/// Compute intersection over union.
///
/// # Parameters
///
/// * `bbox`: A bounding box in format `(top left x, top left y, width, height)`.
/// * `candidates`: A matrix of candidate bounding boxes (one per row) in the same format as `bbox`.
///
/// # Returns
///
/// The intersection over union in [0.0, 1.0] between the `bbox` and each candidate. A higher score means a larger fraction of the `bbox` is occluded by the candidate.
pub fn intersection_over_union(bbox: &Array1<f64>, candidates: &Array2<f64>) -> Array1<f64> {
    let bbox_tl = bbox.slice(s![..2]).to_owned();
    let bbox_br = &bbox_tl + &bbox.slice(s![2..4]);
    let candidates_tl = candidates.slice(s![.., 0..2]).to_owned();
    let candidates_br = &candidates_tl + &candidates.slice(s![.., 2..4]);

    let tl = stack!(
        Axis(1),
        candidates_tl.slice(s![.., 0]).mapv(|v| v.max(bbox_tl[0])),
        candidates_tl.slice(s![.., 1]).mapv(|v| v.max(bbox_tl[1]))
    );
    let br = stack!(
        Axis(1),
        candidates_br.slice(s![.., 0]).mapv(|v| v.min(bbox_br[0])),
        candidates_br.slice(s![.., 1]).mapv(|v| v.min(bbox_br[1]))
    );
    let wh = (br - tl).mapv(|v| v.max(0.0));

    let area_intersection = wh.map_axis(Axis(1), |v| v[0] * v[1]);
    let area_bbox = bbox[2] * bbox[3];
    let area_candidates = candidates.map_axis(Axis(1), |v| v[2] * v[3]);

    &area_intersection / &(area_bbox + &area_candidates - &area_intersection)
}

/// Intersection over union distance metric.
///
/// # Parameters
///
/// * `projections`: The image space bounding box of each track, None if the track is not visible.
/// * `rois`: The bounding box of each region of interest, None if the region cannot be interpreted.
///
/// # Returns
///
/// A cost matrix of shape `projections.len(), rois.len()` where entry (i, j) is
/// `1 - iou(projections[i], rois[j])`, or infinity if either box is missing.
pub fn iou_cost(
    projections: &[Option<BoundingBox>],
    rois: &[Option<BoundingBox>],
) -> Result<Array2<f64>> {
    let mut cost_matrix = Array2::<f64>::from_elem((projections.len(), rois.len()), f64::INFINITY);

    let (roi_indices, roi_boxes): (Vec<usize>, Vec<f64>) = rois
        .iter()
        .enumerate()
        .filter_map(|(idx, roi)| roi.as_ref().map(|roi| (idx, roi.to_tlwh())))
        .fold((vec![], vec![]), |(mut indices, mut boxes), (idx, tlwh)| {
            indices.push(idx);
            boxes.extend(tlwh.iter());
            (indices, boxes)
        });
    if roi_indices.is_empty() {
        return Ok(cost_matrix);
    }
    let candidates = Array2::from_shape_vec((roi_indices.len(), 4), roi_boxes)?;

    projections
        .iter()
        .enumerate()
        .filter_map(|(row, projection)| projection.as_ref().map(|projection| (row, projection)))
        .for_each(|(row, projection)| {
            let iou = intersection_over_union(&projection.to_tlwh(), &candidates);
            roi_indices
                .iter()
                .zip(iou.iter())
                .for_each(|(col, iou)| cost_matrix[[row, *col]] = 1.0 - iou);
        });

    Ok(cost_matrix)
}
