pub mod analytics;
pub mod cache;
pub mod candidates;
pub mod dashboard;
pub mod export;
pub mod health;
pub mod kpi;
pub mod query;
pub mod reference;
