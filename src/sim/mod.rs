pub mod config;
pub mod egress;
pub mod log;
pub mod summary;
pub mod top;
