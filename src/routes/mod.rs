pub mod cycle;
pub mod cycle_stats;
pub mod debts;
pub mod payments;
pub mod period;
