pub mod briefing;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod reference;

pub use pipeline::processor::{LabInterpretation, LabReportProcessor, ProcessingError};
