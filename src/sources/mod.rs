//! Capture source implementations

pub mod channel;
pub mod pcap;
pub mod replay;

pub use channel::{ChannelFeed, ChannelSource};
pub use pcap::{LinkType, PcapSource, capture_command};
pub use replay::ReplaySource;
