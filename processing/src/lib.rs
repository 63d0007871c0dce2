pub mod api;
pub mod auth;
pub mod batch;
pub mod classifier;
pub mod evaluator;
pub mod executable_utils;
pub mod features;
pub mod model;
pub mod results;
pub mod scorers;
pub mod storage;
