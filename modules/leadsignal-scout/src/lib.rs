pub mod assembler;
pub mod fetcher;
pub mod inference;
pub mod orchestrator;
pub mod resolver;
pub mod scoring;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
