pub mod account;
pub mod client;
pub mod permissions;
pub mod reader;
pub mod session;
pub mod submitter;
