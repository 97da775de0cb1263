//! Inbox accessibility monitor: watches a message store for new arrivals,
//! audits their markup and streams the results to connected observers.

pub mod audit;
pub mod config;
pub mod error;
pub mod inbox;
pub mod monitor;
pub mod server;
