#![allow(dead_code)]

pub mod statlink_env;

/// Scripted HTTP server shared with the library's unit tests.
pub mod http {
    include!("../../src/test_support.rs");
}
