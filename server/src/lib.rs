//! File transfer server: public-endpoint dispatcher and per-session
//! workers.

pub mod dispatcher;
pub mod session;
