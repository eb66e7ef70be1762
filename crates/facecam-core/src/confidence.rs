//! LBPH distance → confidence percentage, and the known/unknown decision.

/// Distance at which confidence reaches zero. Empirical.
pub const LBPH_MAX_DIST: f64 = 120.0;

/// Minimum confidence (inclusive) for a face to be labeled with its identity.
pub const CONFIDENCE_THRESHOLD: f64 = 50.0;

/// Map a recognizer distance to a confidence in [0, 100].
///
/// Linear in the distance, 100 at zero and 0 at [`LBPH_MAX_DIST`]; values
/// outside that range are clamped rather than extrapolated.
pub fn to_confidence(distance: f64) -> f64 {
    if distance.is_nan() {
        return 0.0;
    }
    (100.0 - distance / LBPH_MAX_DIST * 100.0).clamp(0.0, 100.0)
}

/// Whether a face with this confidence counts as recognized.
pub fn is_known(confidence: f64) -> bool {
    confidence >= CONFIDENCE_THRESHOLD
}
