//! Curve evaluation.
//!
//! - [`FCurve`] / [`KeyFrame`] - Sparse keyed curves with Hermite sampling
//! - [`VideoTransform`], [`AudioMix`], [`CameraPose`] - Channel sets
//!   sampled at a frame

mod fcurve;
mod transform;

pub use fcurve::*;
pub use transform::*;
