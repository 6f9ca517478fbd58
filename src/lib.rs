pub mod community;
pub mod community_algo;
pub mod config;
pub mod graph;
pub mod heap;
pub mod logger;
pub mod partition;
pub mod types;
pub mod universe;
pub mod util;
