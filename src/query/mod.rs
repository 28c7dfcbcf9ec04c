pub mod engine;

pub use engine::{QueryEngine, SearchHit};
