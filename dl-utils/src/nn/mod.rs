pub mod activation;
pub mod flatten;

pub use activation::*;
pub use flatten::*;
