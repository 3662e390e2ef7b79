pub mod executor;
pub mod problem_store;
