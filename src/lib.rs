pub mod config;
pub mod copy;
pub mod humanize;
pub mod invoice;
pub mod migration;
pub mod repository;
pub mod storage;
