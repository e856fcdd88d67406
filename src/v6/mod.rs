pub mod extensions;
pub mod handlers;
pub mod options;
pub mod session;
pub mod worker;

pub use worker::v6_worker;
