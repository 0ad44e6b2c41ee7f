//! Integration tests for Kinetic
//!
//! Exercise the readiness protocol end to end: the HTTP status client against
//! the simulated backend served on an ephemeral port, and the player driving
//! a recording media element.

#[path = "integration/http_readiness.rs"]
mod http_readiness;

#[path = "integration/player_flow.rs"]
mod player_flow;
