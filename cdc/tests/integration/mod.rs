#![cfg(feature = "test-utils")]

mod cycle_test;
mod poller_test;
mod reconciliation_test;
