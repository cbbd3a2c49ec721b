//! Integration tests

mod config_test;
mod pipeline_test;
mod reconnect_test;
mod support;
