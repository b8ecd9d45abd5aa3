//! Configuration and logging shared by the `portcullis` binaries and
//! applications embedding the authentication environment.

pub mod config;
pub mod logging;
