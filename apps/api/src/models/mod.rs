pub mod candidate;
pub mod company;
