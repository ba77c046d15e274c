// Library root: configuration and the batch runner, shared by the `statline`
// binary and the integration tests.

pub mod config;
pub mod runner;
