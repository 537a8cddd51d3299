//! Integration tests

mod aggregation_test;
mod e2e_test;
mod provider_test;
mod scanner_test;
mod scheduler_test;
