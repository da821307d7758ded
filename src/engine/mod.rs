pub mod cycle;
pub mod debt;
