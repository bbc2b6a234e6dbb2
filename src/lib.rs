pub mod base;
pub mod builtin;
pub mod cam;
pub mod sim;
pub mod timeq;
pub mod traffic;
pub mod ui;
