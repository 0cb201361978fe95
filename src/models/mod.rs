mod shot;

pub use shot::{ShotDetail, ShotSummary};
