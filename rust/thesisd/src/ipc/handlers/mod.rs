pub mod activities;
pub mod core;
pub mod grading;
pub mod prerequisites;
pub mod progress;
pub mod students;
