//! Transition curves - progress shapes between consecutive visemes
//!
//! A curve maps normalized time `t` in [0, 1] to interpolation progress.
//! The shape depends on the articulation classes at both ends.

use std::f64::consts::FRAC_PI_2;

use crate::{timing_modifier, VisemeCategory};

/// Sample rate used to size a transition curve
pub const CURVE_SAMPLE_RATE: f64 = 60.0;

/// Minimum number of points in a transition curve
pub const MIN_CURVE_POINTS: usize = 10;

/// Transition curve shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveShape {
    /// Smooth arc, closed mouth opening into a vowel
    Opening,
    /// Quick close
    Closing,
    /// Fast release of a lip closure
    Explosive,
    /// Symmetric ease-in/ease-out
    SCurve,
}

impl CurveShape {
    /// Pick the shape for a transition between two categories
    pub fn select(from: Option<VisemeCategory>, to: Option<VisemeCategory>) -> Self {
        use VisemeCategory::*;
        let opening_target = matches!(to, Some(Open) | Some(Rounded));
        let opening_source = matches!(from, Some(Open) | Some(Rounded));

        if from == Some(Closed) && opening_target {
            CurveShape::Opening
        } else if opening_source && to == Some(Closed) {
            CurveShape::Closing
        } else if from == Some(Bilabial) || to == Some(Bilabial) {
            CurveShape::Explosive
        } else {
            CurveShape::SCurve
        }
    }

    /// Evaluate at normalized time `t`
    pub fn eval(self, t: f64) -> f64 {
        match self {
            CurveShape::Opening => (t * FRAC_PI_2).sin(),
            CurveShape::Closing => 1.0 - t * t,
            CurveShape::Explosive => 1.0 - (-5.0 * t).exp(),
            CurveShape::SCurve => 0.5 * (1.0 + (6.0 * (t - 0.5)).tanh()),
        }
    }
}

/// Build the curve for a transition lasting `duration` seconds.
///
/// The timing modifier rescales each point: with `t' = min(1, t * mod)`,
/// a point becomes `value * t' / t` whenever `t' != t`.
pub fn transition_curve(from_viseme: &str, to_viseme: &str, duration: f64) -> Vec<f64> {
    let from = VisemeCategory::of(from_viseme);
    let to = VisemeCategory::of(to_viseme);
    let shape = CurveShape::select(from, to);
    let modifier = timing_modifier(from, to);

    let points = ((duration * CURVE_SAMPLE_RATE).max(0.0) as usize).max(MIN_CURVE_POINTS);
    let last = (points - 1) as f64;

    (0..points)
        .map(|i| {
            let t = i as f64 / last;
            let value = shape.eval(t);
            let adjusted = (t * modifier).min(1.0);
            if adjusted == t {
                value
            } else {
                value * (adjusted / t)
            }
        })
        .collect()
}

/// Linearly resample `curve` to `steps` points over its index domain
pub fn resample(curve: &[f64], steps: usize) -> Vec<f64> {
    if curve.len() == steps || curve.is_empty() {
        return curve.to_vec();
    }
    let span = (curve.len() - 1) as f64;
    (0..steps)
        .map(|j| {
            let x = if steps > 1 {
                span * j as f64 / (steps - 1) as f64
            } else {
                0.0
            };
            let lo = x.floor() as usize;
            let hi = (lo + 1).min(curve.len() - 1);
            let frac = x - lo as f64;
            curve[lo] + (curve[hi] - curve[lo]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use VisemeCategory::*;

    #[test]
    fn test_shape_selection() {
        assert_eq!(CurveShape::select(Some(Closed), Some(Open)), CurveShape::Opening);
        assert_eq!(CurveShape::select(Some(Rounded), Some(Closed)), CurveShape::Closing);
        assert_eq!(CurveShape::select(Some(Bilabial), Some(Mid)), CurveShape::Explosive);
        assert_eq!(CurveShape::select(Some(Mid), Some(Bilabial)), CurveShape::Explosive);
        assert_eq!(CurveShape::select(Some(Glottal), Some(Mid)), CurveShape::SCurve);
        assert_eq!(CurveShape::select(None, None), CurveShape::SCurve);
    }

    #[test]
    fn test_shape_endpoints() {
        assert_eq!(CurveShape::Opening.eval(0.0), 0.0);
        assert!((CurveShape::Opening.eval(1.0) - 1.0).abs() < 1e-12);
        assert_eq!(CurveShape::Closing.eval(0.0), 1.0);
        assert_eq!(CurveShape::Closing.eval(1.0), 0.0);
        assert!((CurveShape::SCurve.eval(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_curve_point_count() {
        assert_eq!(transition_curve("V_H", "V_EH", 0.08).len(), MIN_CURVE_POINTS);
        assert_eq!(transition_curve("V_H", "V_EH", 0.5).len(), 30);
        assert_eq!(transition_curve("V_H", "V_EH", -1.0).len(), MIN_CURVE_POINTS);
    }

    #[test]
    fn test_timing_modifier_scales_points() {
        // Open -> closed runs at 1.2: every interior point is stretched by 1.2
        // until t * 1.2 saturates at 1.
        let curve = transition_curve("V_AA", "V_None", 0.0);
        let t = 1.0 / 9.0;
        let expected = CurveShape::Closing.eval(t) * 1.2;
        assert!((curve[1] - expected).abs() < 1e-12);
        assert_eq!(curve[0], CurveShape::Closing.eval(0.0));

        // Unmodified transitions keep their shape
        let plain = transition_curve("V_H", "V_EH", 0.0);
        assert!((plain[1] - CurveShape::SCurve.eval(t)).abs() < 1e-12);
    }

    #[test]
    fn test_resample() {
        let curve = [0.0, 1.0, 2.0];
        assert_eq!(resample(&curve, 3), vec![0.0, 1.0, 2.0]);
        assert_eq!(resample(&curve, 5), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(resample(&curve, 1), vec![0.0]);
        assert_eq!(resample(&curve, 2), vec![0.0, 2.0]);
    }
}
