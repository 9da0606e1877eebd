mod fake_cluster;

pub use fake_cluster::*;
pub use recording_listener::*;
