pub mod engine;
pub mod error;
pub mod filter;
pub mod histogram;
pub mod io;
pub mod model;
pub mod stats;
