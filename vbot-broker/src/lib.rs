mod client;
mod error;
pub mod protocol;
mod subscription;

pub use client::{BrokerClient, ErrorListener, PublishCallback, SubscribeOptions};
pub use error::BrokerError;
pub use subscription::{SubscriptionCallbacks, SubscriptionEntry, SubscriptionState};

/// Fixed channel-name suffixes (spec §4.3): `""` for frames, `"/metadata"`
/// for codec parameters, `"/analysis"` and `"/debug"` for bot output, and
/// the literal `"control"` for control commands.
pub mod channel_suffix {
    pub const FRAMES: &str = "";
    pub const METADATA: &str = "/metadata";
    pub const ANALYSIS: &str = "/analysis";
    pub const DEBUG: &str = "/debug";
    pub const CONTROL: &str = "control";
}
