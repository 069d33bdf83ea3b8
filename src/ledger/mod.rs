pub mod client;
pub mod hashing;
pub mod types;
