pub mod admin;
pub mod callsign;
pub mod feeds;
pub mod poller;
pub mod schedule;
pub mod scheduled;
pub mod sink;
pub mod spot;
pub mod stats;
