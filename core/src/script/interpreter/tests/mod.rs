//! Tests for the snippet interpreter
//!
//! Organized by feature area; every test goes through the bundled compiler

mod helpers;

mod basic_tests;
mod class_tests;
mod console_tests;
mod control_flow_tests;
mod error_tests;
mod operator_tests;
mod stdlib_tests;
