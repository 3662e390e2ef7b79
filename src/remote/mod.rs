pub mod judge0;
