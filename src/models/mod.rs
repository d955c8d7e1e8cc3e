pub mod enums;
pub mod lab;
pub mod rules;

pub use enums::*;
pub use lab::*;
pub use rules::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid {field} value: '{value}'")]
    InvalidEnum { field: String, value: String },
}
