pub mod analytics;
pub mod cache;
pub mod candidates;
pub mod dashboard;
pub mod export;
pub mod kpi;
#[cfg(test)]
pub mod memory;
pub mod mongo;
pub mod pipelines;
pub mod reference;
pub mod store;
