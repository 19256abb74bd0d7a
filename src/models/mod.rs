pub mod analytics;
pub mod candidate;
pub mod dashboard;
pub mod filters;
pub mod interview;
pub mod kpi;
pub mod team;
