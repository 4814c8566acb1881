mod resend_timer;
mod stop_signal;
mod time;

pub(crate) use resend_timer::ResendTarget;
pub(crate) use resend_timer::ResendTimerHandle;
pub use time::Clock;
pub use time::RealClock;

#[cfg(test)]
pub(crate) use time::{mocked_clock, MockClock, MockClockController};
