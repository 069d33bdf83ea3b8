pub mod agreements;
pub mod evaluations;
pub mod proposals;
