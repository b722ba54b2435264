//! Integration test suites

mod countdown_gate;
mod reset_flow;
