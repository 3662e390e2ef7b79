pub mod callback;
pub mod domain;
pub mod engine;
pub mod pipeline;
pub mod state;
pub mod traits;
pub mod verdict;
