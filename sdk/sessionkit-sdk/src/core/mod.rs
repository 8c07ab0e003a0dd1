pub mod connection;
pub mod constants;
pub mod http;
pub mod locks;
pub mod signer;
