#![cfg(all(feature = "failpoints", feature = "test-utils"))]

mod cycle_test;
