pub mod events;
pub mod jobs;
pub mod robots;
pub mod stats;
