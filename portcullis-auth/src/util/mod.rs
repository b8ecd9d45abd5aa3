//! Clock and identifier primitives shared by every service.

mod clock;
mod id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use id::{IdGenerator, SecureRandomIdGenerator};
