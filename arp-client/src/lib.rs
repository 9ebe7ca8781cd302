//! # arp-client: headless device streaming client
//!
//! Connects to a device running the ARP streaming server, keeps the
//! session alive, counts the media it receives and reconnects according to
//! the configured policy. Rendering is out of scope; decoded output goes to
//! a counting sink.

pub mod config;
pub mod runner;
pub mod sink;
