pub mod duration_planner;
pub mod loop_finder;
pub mod sample_buffer;
