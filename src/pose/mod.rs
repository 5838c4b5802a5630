pub mod landmark;

pub use landmark::{pose_id, Landmark, LandmarkFrame, POSE_PREFIX};
