//! Mock storage implementations for testing.

mod cluster;

#[cfg(test)]
mod tests;

pub use cluster::MockCluster;
