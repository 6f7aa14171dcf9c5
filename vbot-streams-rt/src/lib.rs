mod buffered_worker;
mod delay;
mod interval;
mod shutdown;
mod signal_breaker;
mod threaded_worker;
mod timer_breaker;
#[cfg(feature = "tracing-init")]
mod tracing_init;

pub use buffered_worker::{buffered_worker, BufferedWorkerHandle};
pub use delay::delay;
pub use interval::interval;
pub use shutdown::{system_shutdown, SystemShutdown, SystemTerminator};
pub use signal_breaker::{signal_breaker, try_signal_breaker, Signal, SignalBreakerError};
pub use threaded_worker::{threaded_worker, ThreadedWorkerHandle};
pub use timer_breaker::timer_breaker;
#[cfg(feature = "tracing-init")]
pub use tracing_init::{init_tracing, TracingInitConfig};
