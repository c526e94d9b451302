pub mod channels;

pub use channels::{HostChannels, LoopbackChannels};
