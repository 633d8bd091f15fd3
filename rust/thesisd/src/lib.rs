pub mod access;
pub mod config;
pub mod db;
pub mod grading;
pub mod ipc;
pub mod prereq;
pub mod records;
pub mod service;
pub mod source;
pub mod weeks;
