pub mod extraction;
pub mod parsing;
pub mod rules;
pub mod processor;
