mod resilient;
mod streams;
mod thread_pin;
mod ws_client;

pub use resilient::{resilient_client, ResilientClient};
pub use streams::{channel, rtm_sink, rtm_source};
pub use thread_pin::ThreadPinnedClient;
pub use ws_client::WsBrokerClient;
