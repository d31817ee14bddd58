pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod grades;
pub mod models;
pub mod performance;
pub mod report;

pub use error::{GradeError, LabelError};
