pub mod evaluator;
pub mod ranker;

pub use evaluator::{classify, evaluate, evaluate_all, select_rule};
pub use ranker::{rank_specialties, specialty_scores, DEFAULT_TOP_N};
