pub mod sentiment;
pub mod snapshot;
