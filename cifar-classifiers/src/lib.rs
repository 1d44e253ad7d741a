pub mod bayes;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod model;
pub mod training;
pub mod utils;
