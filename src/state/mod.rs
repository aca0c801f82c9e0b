//! Shared state stores.
//!
//! Each store is an explicit context object handed to whoever needs it. The
//! session is the only writer; readers either poll (audio level) or subscribe
//! to change notifications (avatar, expression).

pub mod audio;
pub mod avatar;
pub mod expression;

pub use audio::AudioLevel;
pub use avatar::{AvatarPose, AvatarState, AvatarStore, AvatarTransform};
pub use expression::{Emotion, ExpressionState, ExpressionStore};
