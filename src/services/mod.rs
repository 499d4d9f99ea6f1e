pub mod error;
pub mod execution;
pub mod input;
pub mod liveness;
pub mod machine;
pub mod notify;
pub mod process;
pub mod runner;
pub mod settings;
pub mod shutdown;

#[cfg(test)]
pub mod testing;
