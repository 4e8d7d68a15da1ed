//! Reconciliation logic for Installation resources and their managed objects

pub mod cache;
pub mod expectations;
pub mod generations;
pub mod installation;
pub mod rbac_backup;
