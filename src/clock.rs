use chrono::{DateTime, Utc};

/// Source of the current time. Injected so cache expiry can be tested
/// without sleeping.
pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}
