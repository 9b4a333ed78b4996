//! Integration tests
//!
//! - `middleware_test` drives the public router in-process with `oneshot`
//! - `cluster_test` runs two processes on loopback with a real client
//! - `reconnector_test` runs the client against `wiremock` servers

#[cfg(feature = "ssr")]
pub mod cluster_test;
#[cfg(feature = "ssr")]
pub mod middleware_test;
pub mod reconnector_test;
