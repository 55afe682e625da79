use serde::{Deserialize, Serialize};

/// Scored colour-wheel response for one trial.
///
/// Angles are degrees on the displayed wheel. The `None` variants mark a
/// timed-out trial; feedback takes the no-response branch for those instead
/// of doing arithmetic on sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseScore {
    pub target_angle: f64,
    pub response_angle: Option<f64>,
    /// Raw linear difference `response - target` in the 0..360 domain.
    /// Deliberately not wrapped to the shorter circular direction, so
    /// magnitudes above 180 are possible and `score(0, 360)` reports 360.
    pub angular_error: Option<f64>,
    /// `1 - |angular_error| / 360`, in `[0, 1]`.
    pub accuracy_pct: Option<f64>,
}

impl ResponseScore {
    /// Sentinel score for a trial whose response window expired.
    pub fn timeout(target_angle_deg: f64) -> Self {
        Self {
            target_angle: target_angle_deg,
            response_angle: None,
            angular_error: None,
            accuracy_pct: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.response_angle.is_none()
    }
}

/// Scores a response angle against the target angle.
pub fn score(target_angle_deg: f64, response_angle_deg: f64) -> ResponseScore {
    let err = response_angle_deg - target_angle_deg;
    ResponseScore {
        target_angle: target_angle_deg,
        response_angle: Some(response_angle_deg),
        angular_error: Some(err),
        accuracy_pct: Some(1.0 - err.abs() / 360.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_response_scores_perfect() {
        let s = score(10.0, 10.0);
        assert_eq!(s.angular_error, Some(0.0));
        assert_eq!(s.accuracy_pct, Some(1.0));
        assert!(!s.is_timeout());
    }

    #[test]
    fn error_is_signed_raw_difference() {
        let s = score(90.0, 60.0);
        assert_eq!(s.angular_error, Some(-30.0));
        let s = score(60.0, 90.0);
        assert_eq!(s.angular_error, Some(30.0));
        assert!((s.accuracy_pct.unwrap() - (1.0 - 30.0 / 360.0)).abs() < 1e-12);
    }

    #[test]
    fn boundary_wraparound_is_not_folded() {
        // Raw-difference convention: a full-circle response distance stays
        // 360 and zeroes the accuracy rather than folding back to 0.
        let s = score(0.0, 360.0);
        assert_eq!(s.angular_error, Some(360.0));
        assert_eq!(s.accuracy_pct, Some(0.0));
    }

    #[test]
    fn large_errors_can_exceed_half_circle() {
        let s = score(10.0, 350.0);
        assert_eq!(s.angular_error, Some(340.0));
    }

    #[test]
    fn timeout_carries_no_derived_fields() {
        let s = ResponseScore::timeout(123.0);
        assert!(s.is_timeout());
        assert_eq!(s.target_angle, 123.0);
        assert_eq!(s.response_angle, None);
        assert_eq!(s.angular_error, None);
        assert_eq!(s.accuracy_pct, None);
    }
}
