//! Landmark geometry
//!
//! Distance and aspect-ratio metrics over face-mesh landmarks. The index constants
//! follow the 468-point face-mesh topology.

use crate::types::LandmarkPoint;

/// Six landmark indices describing one eye contour, in the order
/// outer corner, upper-outer, upper-inner, inner corner, lower-inner, lower-outer.
pub type EyeLandmarkSet = [usize; 6];

pub const LEFT_EYE: EyeLandmarkSet = [33, 160, 158, 133, 153, 144];
pub const RIGHT_EYE: EyeLandmarkSet = [263, 387, 385, 362, 380, 373];

pub const MOUTH_TOP_LIP: usize = 13;
pub const MOUTH_BOTTOM_LIP: usize = 14;
pub const MOUTH_LEFT_CORNER: usize = 61;
pub const MOUTH_RIGHT_CORNER: usize = 291;

/// Index of the wrist in a hand landmark set
pub const WRIST: usize = 0;

/// Per-frame face measurements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMetrics {
    /// Mean of the left and right eye aspect ratios
    pub ear: f64,
    /// Mouth aspect ratio
    pub mar: f64,
}

/// Euclidean distance in the image plane. NaN inputs propagate.
pub fn distance(a: &LandmarkPoint, b: &LandmarkPoint) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Eye aspect ratio: `(|p2-p6| + |p3-p5|) / (2 * |p1-p4|)`
///
/// A zero-width eye yields infinity (NaN if every point coincides). Neither compares
/// below a closed-eye threshold, so degenerate frames read as "open".
/// Returns `None` if the landmark set does not contain every index.
pub fn eye_aspect_ratio(landmarks: &[LandmarkPoint], eye: &EyeLandmarkSet) -> Option<f64> {
    let p = |i: usize| landmarks.get(eye[i]);
    let (p1, p2, p3, p4, p5, p6) = (p(0)?, p(1)?, p(2)?, p(3)?, p(4)?, p(5)?);

    Some((distance(p2, p6) + distance(p3, p5)) / (2.0 * distance(p1, p4)))
}

/// Mouth aspect ratio: lip gap over corner-to-corner width.
///
/// Returns exactly 0 for a zero-width mouth so a degenerate frame never reads as open.
/// Returns `None` if the landmark set does not contain every index.
pub fn mouth_aspect_ratio(landmarks: &[LandmarkPoint]) -> Option<f64> {
    let top = landmarks.get(MOUTH_TOP_LIP)?;
    let bottom = landmarks.get(MOUTH_BOTTOM_LIP)?;
    let left = landmarks.get(MOUTH_LEFT_CORNER)?;
    let right = landmarks.get(MOUTH_RIGHT_CORNER)?;

    let width = distance(left, right);
    if width == 0.0 {
        return Some(0.0);
    }
    Some(distance(top, bottom) / width)
}

/// Both eye ratios averaged, plus the mouth ratio
pub fn face_metrics(landmarks: &[LandmarkPoint]) -> Option<FaceMetrics> {
    let left = eye_aspect_ratio(landmarks, &LEFT_EYE)?;
    let right = eye_aspect_ratio(landmarks, &RIGHT_EYE)?;
    let mar = mouth_aspect_ratio(landmarks)?;

    Some(FaceMetrics {
        ear: (left + right) / 2.0,
        mar,
    })
}

/// Synthetic face-mesh landmark sets for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Number of points in a face-mesh result
    pub const FACE_MESH_POINTS: usize = 468;

    fn place_eye(points: &mut [LandmarkPoint], eye: &EyeLandmarkSet, cx: f64, openness: f64) {
        // Width 0.1, so EAR == openness / 0.1
        let half_gap = openness / 2.0;
        points[eye[0]] = LandmarkPoint::new(cx - 0.05, 0.4);
        points[eye[1]] = LandmarkPoint::new(cx - 0.02, 0.4 - half_gap);
        points[eye[2]] = LandmarkPoint::new(cx + 0.02, 0.4 - half_gap);
        points[eye[3]] = LandmarkPoint::new(cx + 0.05, 0.4);
        points[eye[4]] = LandmarkPoint::new(cx + 0.02, 0.4 + half_gap);
        points[eye[5]] = LandmarkPoint::new(cx - 0.02, 0.4 + half_gap);
    }

    /// A face whose eyes have the given EAR and whose mouth has the given MAR
    pub fn face(ear: f64, mar: f64) -> Vec<LandmarkPoint> {
        let mut points = vec![LandmarkPoint::new(0.5, 0.5); FACE_MESH_POINTS];
        place_eye(&mut points, &LEFT_EYE, 0.35, ear * 0.1);
        place_eye(&mut points, &RIGHT_EYE, 0.65, ear * 0.1);

        // Mouth width 0.2
        points[MOUTH_LEFT_CORNER] = LandmarkPoint::new(0.4, 0.7);
        points[MOUTH_RIGHT_CORNER] = LandmarkPoint::new(0.6, 0.7);
        points[MOUTH_TOP_LIP] = LandmarkPoint::new(0.5, 0.7 - mar * 0.1);
        points[MOUTH_BOTTOM_LIP] = LandmarkPoint::new(0.5, 0.7 + mar * 0.1);
        points
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::face;
    use super::*;

    #[test]
    fn test_distance() {
        let a = LandmarkPoint::new(0.0, 0.0);
        let b = LandmarkPoint::new(0.3, 0.4);
        assert!((distance(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_distance_propagates_nan() {
        let a = LandmarkPoint::new(f64::NAN, 0.0);
        let b = LandmarkPoint::new(0.3, 0.4);
        assert!(distance(&a, &b).is_nan());
    }

    #[test]
    fn test_eye_aspect_ratio() {
        let landmarks = face(0.3, 0.1);
        let ear = eye_aspect_ratio(&landmarks, &LEFT_EYE).unwrap();
        assert!((ear - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_zero_width_eye_is_not_closed() {
        let mut landmarks = face(0.3, 0.1);
        landmarks[LEFT_EYE[3]] = landmarks[LEFT_EYE[0]];
        let ear = eye_aspect_ratio(&landmarks, &LEFT_EYE).unwrap();
        assert!(ear.is_infinite());
        assert!(ear >= 0.21);
    }

    #[test]
    fn test_mouth_aspect_ratio() {
        let landmarks = face(0.3, 0.6);
        let mar = mouth_aspect_ratio(&landmarks).unwrap();
        assert!((mar - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_zero_width_mouth_returns_zero() {
        let mut landmarks = face(0.3, 0.8);
        landmarks[MOUTH_RIGHT_CORNER] = landmarks[MOUTH_LEFT_CORNER];
        assert_eq!(mouth_aspect_ratio(&landmarks), Some(0.0));
    }

    #[test]
    fn test_short_landmark_set() {
        let landmarks = vec![LandmarkPoint::new(0.5, 0.5); 100];
        assert!(eye_aspect_ratio(&landmarks, &LEFT_EYE).is_none());
        assert!(mouth_aspect_ratio(&landmarks).is_none());
        assert!(face_metrics(&landmarks).is_none());
    }

    #[test]
    fn test_face_metrics_averages_eyes() {
        let mut landmarks = face(0.3, 0.2);
        // Close only the right eye
        for &i in &[RIGHT_EYE[1], RIGHT_EYE[2], RIGHT_EYE[4], RIGHT_EYE[5]] {
            landmarks[i].y = 0.4;
        }
        let metrics = face_metrics(&landmarks).unwrap();
        assert!((metrics.ear - 0.15).abs() < 1e-9);
        assert!((metrics.mar - 0.2).abs() < 1e-9);
    }
}
