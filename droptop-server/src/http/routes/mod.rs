//! Route modules, one per resource group

pub mod catalog;
pub mod changelog;
pub mod downloads;
pub mod health;
pub mod meta;
