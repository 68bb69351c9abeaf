//! Integration tests for the FinMind client
//! These run the client against a mock HTTP backend rather than test doubles

mod test_harness;

mod api_client_test;
mod route_guard_test;
mod session_flow_test;
