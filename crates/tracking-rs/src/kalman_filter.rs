use anyhow::{anyhow, Result};
use nalgebra::{Cholesky, Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

lazy_static! {
    /**
    Table for the 0.95 quantile of the chi-square distribution with N degrees of freedom (contains values for N=1, ..., 9).
    Taken from MATLAB/Octave's chi2inv function and used as Mahalanobis gating threshold.
    */
    pub static ref CHI2INV95: HashMap<usize, f64> = HashMap::from([
        (1, 3.8415),
        (2, 5.9915),
        (3, 7.8147),
        (4, 9.4877),
        (5, 11.070),
        (6, 12.592),
        (7, 14.067),
        (8, 15.507),
        (9, 16.919),
    ]);
}

/**
A simple Kalman filter for tracking objects on the ground plane.

The 4-dimensional state space:
    x, y, vx, vy
contains the object centroid position (x, y) and its velocity.

Object motion follows a constant velocity model driven by white noise acceleration. The position (x, y) is taken as direct observation of the state space (linear observation model); a velocity observation can be applied separately when the sensor provides one.
*/
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanFilter {
    /// Variance of the acceleration noise, in (m/s²)².
    process_noise: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl KalmanFilter {
    /// Returns a new KalmanFilter
    ///
    /// # Arguments
    ///
    /// * `process_noise`: Variance of the acceleration noise, in (m/s²)². Default `1.0`.
    pub fn new(process_noise: Option<f64>) -> KalmanFilter {
        KalmanFilter {
            process_noise: process_noise.unwrap_or(1.0),
        }
    }

    /// Returns the variance of the acceleration noise
    pub fn process_noise(&self) -> f64 {
        self.process_noise
    }

    /// Create track from unassociated measurement.
    ///
    /// # Arguments
    ///
    /// - `position`: The measured position.
    /// - `position_covariance`: Covariance of the measured position.
    /// - `velocity`: The measured velocity, zero if unobserved.
    /// - `velocity_covariance`: Covariance of the velocity.
    ///
    /// # Returns
    ///
    /// A tuple with the following two entries of the new track:
    /// - The mean vector (4 dimensional).
    /// - The covariance matrix (4x4 dimensional).
    pub fn initiate(
        &self,
        position: &Vector2<f64>,
        position_covariance: &Matrix2<f64>,
        velocity: &Vector2<f64>,
        velocity_covariance: &Matrix2<f64>,
    ) -> (Vector4<f64>, Matrix4<f64>) {
        let mean = Vector4::new(position.x, position.y, velocity.x, velocity.y);

        let mut covariance = Matrix4::zeros();
        covariance
            .fixed_view_mut::<2, 2>(0, 0)
            .copy_from(position_covariance);
        covariance
            .fixed_view_mut::<2, 2>(2, 2)
            .copy_from(velocity_covariance);

        (mean, covariance)
    }

    /// Run Kalman filter prediction step.
    ///
    /// # Arguments
    ///
    /// - `mean`: The 4 dimensional mean vector of the object state at the previous time step.
    /// - `covariance`: The 4x4 dimensional covariance matrix of the object state at the previous time step.
    /// - `dt`: Time elapsed since the previous time step.
    ///
    /// # Returns
    ///
    /// A tuple with the following two entries of the predicted state:
    /// - The mean vector (4 dimensional).
    /// - The covariance matrix (4x4 dimensional).
    pub fn predict(
        &self,
        mean: &Vector4<f64>,
        covariance: &Matrix4<f64>,
        dt: Duration,
    ) -> (Vector4<f64>, Matrix4<f64>) {
        let dt = dt.as_secs_f64();

        #[rustfmt::skip]
        let motion_mat = Matrix4::new(
            1.0, 0.0, dt, 0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        let (dt2, dt3, dt4) = (dt.powi(2), dt.powi(3) / 2.0, dt.powi(4) / 4.0);
        #[rustfmt::skip]
        let motion_cov = Matrix4::new(
            dt4, 0.0, dt3, 0.0,
            0.0, dt4, 0.0, dt3,
            dt3, 0.0, dt2, 0.0,
            0.0, dt3, 0.0, dt2,
        ) * self.process_noise;

        let mean = motion_mat * mean;
        let covariance = motion_mat * covariance * motion_mat.transpose() + motion_cov;

        (mean, covariance)
    }

    /// Project state distribution to measurement space.
    ///
    /// # Arguments
    ///
    /// - `mean`: The state's mean vector (4 dimensional array).
    /// - `covariance`: The state's covariance matrix (4x4 dimensional).
    /// - `noise`: The position measurement noise (2x2 dimensional).
    ///
    /// # Returns
    ///
    /// A tuple with the following two entries of the given state estimate:
    /// - The mean vector (2 dimensional).
    /// - The covariance matrix (2x2 dimensional).
    pub fn project(
        &self,
        mean: &Vector4<f64>,
        covariance: &Matrix4<f64>,
        noise: &Matrix2<f64>,
    ) -> (Vector2<f64>, Matrix2<f64>) {
        project(&position_mat(), mean, covariance, noise)
    }

    /// Run Kalman filter correction step with a position measurement.
    ///
    /// # Arguments
    ///
    /// - `mean`: The state's mean vector (4 dimensional array).
    /// - `covariance`: The state's covariance matrix (4x4 dimensional).
    /// - `position`: The measured position (x, y).
    /// - `noise`: Covariance of the measured position.
    ///
    /// # Returns
    ///
    /// A tuple with the following two entries of the measurement-corrected state distribution:
    /// - The mean vector (4 dimensional).
    /// - The covariance matrix (4x4 dimensional).
    pub fn update(
        &self,
        mean: &Vector4<f64>,
        covariance: &Matrix4<f64>,
        position: &Vector2<f64>,
        noise: &Matrix2<f64>,
    ) -> Result<(Vector4<f64>, Matrix4<f64>)> {
        correct(&position_mat(), mean, covariance, position, noise)
    }

    /// Run Kalman filter correction step with a velocity measurement.
    ///
    /// # Arguments
    ///
    /// - `mean`: The state's mean vector (4 dimensional array).
    /// - `covariance`: The state's covariance matrix (4x4 dimensional).
    /// - `velocity`: The measured velocity (vx, vy).
    /// - `noise`: Covariance of the measured velocity.
    pub fn update_velocity(
        &self,
        mean: &Vector4<f64>,
        covariance: &Matrix4<f64>,
        velocity: &Vector2<f64>,
        noise: &Matrix2<f64>,
    ) -> Result<(Vector4<f64>, Matrix4<f64>)> {
        correct(&velocity_mat(), mean, covariance, velocity, noise)
    }

    /// Compute gating distance between state distribution and measurements.
    ///
    /// # Parameters
    ///
    /// - `mean`: Mean vector over the state distribution (4 dimensional).
    /// - `covariance`: Covariance of the state distribution (4x4 dimensional).
    /// - `noise`: The position measurement noise (2x2 dimensional).
    /// - `measurements`: N measured positions.
    ///
    /// # Returns
    ///
    /// A list of length N, where the i-th element contains the squared Mahalanobis distance between (mean, covariance) and `measurements[i]`.
    pub fn gating_distance(
        &self,
        mean: &Vector4<f64>,
        covariance: &Matrix4<f64>,
        noise: &Matrix2<f64>,
        measurements: &[Vector2<f64>],
    ) -> Result<Vec<f64>> {
        let (mean, covariance) = self.project(mean, covariance, noise);

        let cholesky_factor = Cholesky::new(covariance)
            .ok_or_else(|| anyhow!("projected covariance is not positive definite"))?;

        Ok(measurements
            .iter()
            .map(|measurement| {
                let d = measurement - mean;
                d.dot(&cholesky_factor.solve(&d))
            })
            .collect())
    }
}

#[rustfmt::skip]
fn position_mat() -> Matrix2x4<f64> {
    Matrix2x4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
    )
}

#[rustfmt::skip]
fn velocity_mat() -> Matrix2x4<f64> {
    Matrix2x4::new(
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    )
}

fn project(
    update_mat: &Matrix2x4<f64>,
    mean: &Vector4<f64>,
    covariance: &Matrix4<f64>,
    noise: &Matrix2<f64>,
) -> (Vector2<f64>, Matrix2<f64>) {
    (
        update_mat * mean,
        update_mat * covariance * update_mat.transpose() + noise,
    )
}

fn correct(
    update_mat: &Matrix2x4<f64>,
    mean: &Vector4<f64>,
    covariance: &Matrix4<f64>,
    measurement: &Vector2<f64>,
    noise: &Matrix2<f64>,
) -> Result<(Vector4<f64>, Matrix4<f64>)> {
    let (projected_mean, projected_cov) = project(update_mat, mean, covariance, noise);

    let cholesky_factor = Cholesky::new(projected_cov)
        .ok_or_else(|| anyhow!("innovation covariance is not positive definite"))?;

    // K = P Hᵀ S⁻¹, solved as (S⁻¹ H P)ᵀ since S and P are symmetric
    let kalman_gain = cholesky_factor
        .solve(&(update_mat * covariance))
        .transpose();

    let innovation = measurement - projected_mean;

    let new_mean = mean + kalman_gain * innovation;
    let new_covariance = covariance - kalman_gain * projected_cov * kalman_gain.transpose();

    Ok((new_mean, new_covariance))
}
