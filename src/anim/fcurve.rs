//! Keyframed animation curves.
//!
//! An [`FCurve`] is a non-empty, frame-sorted list of [`KeyFrame`]s.
//! Between keys the curve follows a cubic Hermite segment driven by the
//! explicit per-key tangents; outside the keyed range it holds the first
//! or last value.

use serde::Serialize;

/// A single key: value and slope at a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct KeyFrame {
    pub frame: f32,
    pub value: f32,
    /// Slope in value units per frame.
    pub tangent: f32,
}

impl KeyFrame {
    pub const fn new(frame: f32, value: f32, tangent: f32) -> Self {
        Self { frame, value, tangent }
    }

    /// Key with a flat tangent.
    pub const fn flat(frame: f32, value: f32) -> Self {
        Self { frame, value, tangent: 0.0 }
    }
}

/// Animation curve with at least one key.
///
/// A single-key curve is a constant; its frame and tangent are not
/// stored on disk and do not take part in equality.
#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct FCurve {
    keys: Vec<KeyFrame>,
}

impl FCurve {
    /// Build a curve from keys, sorting them by frame.
    ///
    /// Returns `None` for an empty key list; "no animation" is modelled as
    /// an absent curve, not an empty one.
    pub fn new(mut keys: Vec<KeyFrame>) -> Option<Self> {
        if keys.is_empty() {
            return None;
        }
        keys.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        Some(Self { keys })
    }

    /// Constant curve.
    pub fn constant(value: f32) -> Self {
        Self { keys: vec![KeyFrame::flat(0.0, value)] }
    }

    /// Curve through `(frame, value)` points with flat tangents.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        Self::new(points.iter().map(|&(f, v)| KeyFrame::flat(f, v)).collect())
    }

    #[inline]
    pub fn keys(&self) -> &[KeyFrame] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True for a single-key curve.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.keys.len() == 1
    }

    #[inline]
    pub fn first(&self) -> &KeyFrame {
        &self.keys[0]
    }

    #[inline]
    pub fn last(&self) -> &KeyFrame {
        &self.keys[self.keys.len() - 1]
    }

    /// Value of the curve at `frame`.
    pub fn sample(&self, frame: f32) -> f32 {
        sample_keys(&self.keys, frame)
    }
}

impl PartialEq for FCurve {
    fn eq(&self, other: &Self) -> bool {
        match (self.keys.as_slice(), other.keys.as_slice()) {
            ([a], [b]) => a.value == b.value,
            (a, b) => a == b,
        }
    }
}

/// Sample a frame-sorted key list.
///
/// Holds the first value at or before the first key and the last value at
/// or after the last key. In between, the bracketing pair `start.frame <=
/// frame < end.frame` is evaluated as a cubic Hermite segment; tangents are
/// per-frame slopes and are scaled by the segment length.
///
/// An empty slice samples to zero and a NaN frame holds the first value.
pub fn sample_keys(keys: &[KeyFrame], frame: f32) -> f32 {
    let (first, last) = match (keys.first(), keys.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 0.0,
    };
    if keys.len() == 1 || frame.is_nan() || frame <= first.frame {
        return first.value;
    }
    if frame >= last.frame {
        return last.value;
    }

    // Unordered key frames (NaN) can leave no key at or before `frame`.
    let end = keys.partition_point(|k| k.frame <= frame);
    if end == 0 || end >= keys.len() {
        return first.value;
    }
    hermite(&keys[end - 1], &keys[end], frame)
}

/// Cubic Hermite segment between two keys.
#[inline]
pub fn hermite(start: &KeyFrame, end: &KeyFrame, frame: f32) -> f32 {
    let range = end.frame - start.frame;
    let t = (frame - start.frame) / range;
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    h00 * start.value + h10 * range * start.tangent + h01 * end.value + h11 * range * end.tangent
}

/// Sample an optional curve, falling back to `default` when absent.
#[inline]
pub fn sample_or(curve: Option<&FCurve>, frame: f32, default: f32) -> f32 {
    curve.map_or(default, |c| c.sample(frame))
}
