//! Rate limiting logic and state management.

mod clock;
mod key;
mod limiter;
mod policy;
mod ring;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::LimiterKey;
pub(crate) use key::operation_path;
pub use limiter::{Decision, RateLimiter, Rejection};
pub use policy::{Policy, PolicyResolver};
pub use ring::{Millis, RingError, TimestampRing};
