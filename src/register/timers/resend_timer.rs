use crate::register::timers::stop_signal::{self, StopCheck, Stopper};
use crate::register::timers::time::Clock;
use std::sync::{Arc, Weak};
use tokio::time::{Duration, Instant};

/// ResendTarget is what the resend loop drives on every tick.
pub(crate) trait ResendTarget: Send + Sync + 'static {
    fn resend_due_commands(self: Arc<Self>);
}

/// Keeps the resend loop alive. Dropping the handle stops the loop at its next wake-up.
pub(crate) struct ResendTimerHandle {
    _stopper: Stopper,
}

struct ResendTimerTask<T, C> {
    target: Weak<T>,
    stop_check: StopCheck,
    next_tick: Instant,
    interval: Duration,
    clock: C,
}

impl ResendTimerHandle {
    pub(crate) fn spawn_timer_task<T: ResendTarget, C: Clock>(
        target: Weak<T>,
        initial_delay: Duration,
        interval: Duration,
        clock: C,
    ) -> Self {
        let (task, handle) = ResendTimerTask::new(target, initial_delay, interval, clock);
        tokio::task::spawn(task.run());

        handle
    }
}

impl<T: ResendTarget, C: Clock> ResendTimerTask<T, C> {
    fn new(target: Weak<T>, initial_delay: Duration, interval: Duration, clock: C) -> (Self, ResendTimerHandle) {
        let (stopper, stop_check) = stop_signal::new();
        // First deadline is fixed here rather than in `run()`, so it doesn't depend on when the
        // task first gets polled.
        let task = ResendTimerTask {
            target,
            stop_check,
            next_tick: clock.now() + initial_delay,
            interval,
            clock,
        };

        (task, ResendTimerHandle { _stopper: stopper })
    }

    async fn run(mut self) {
        loop {
            self.clock.sleep_until(self.next_tick).await;
            if self.stop_check.should_stop() {
                return;
            }

            match self.target.upgrade() {
                Some(target) => target.resend_due_commands(),
                None => return,
            }

            // Fixed rate: a slow tick doesn't push back the ones after it.
            self.next_tick += self.interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::timers::time::mocked_clock;
    use crate::remoting::test_utils::TestUtilReceiver;
    use tokio::sync::mpsc;

    struct TickRecorder {
        tx: mpsc::UnboundedSender<()>,
    }

    impl ResendTarget for TickRecorder {
        fn resend_due_commands(self: Arc<Self>) {
            let _ = self.tx.send(());
        }
    }

    fn recorder() -> (Arc<TickRecorder>, TestUtilReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(TickRecorder { tx }), TestUtilReceiver::new(rx))
    }

    #[tokio::test]
    async fn ticks_after_initial_delay_then_every_interval() {
        let (target, mut ticks) = recorder();
        let (clock, mut controller) = mocked_clock();
        let initial_delay = Duration::from_millis(1000);
        let interval = Duration::from_millis(2000);

        let (task, handle) = ResendTimerTask::new(Arc::downgrade(&target), initial_delay, interval, clock);
        let join_handle = tokio::task::spawn(task.run());

        controller.advance(initial_delay / 2);
        ticks.assert_nothing_sent().await;
        controller.advance(initial_delay / 2);
        ticks.recv().await;
        ticks.assert_nothing_sent().await;

        for _ in 0..3 {
            controller.advance(interval / 2);
            ticks.assert_nothing_sent().await;
            controller.advance(interval / 2);
            ticks.recv().await;
        }
        assert_eq!(controller.elapsed_time(), initial_delay + interval * 3);

        drop(handle);
        controller.advance(interval);
        join_handle.await.unwrap();
        ticks.assert_nothing_sent().await;
    }

    #[tokio::test]
    async fn exits_once_target_is_gone() {
        let (target, mut ticks) = recorder();
        let (clock, mut controller) = mocked_clock();

        let (task, _handle) =
            ResendTimerTask::new(Arc::downgrade(&target), Duration::from_millis(10), Duration::from_millis(10), clock);
        let join_handle = tokio::task::spawn(task.run());

        drop(target);
        controller.advance(Duration::from_millis(10));
        join_handle.await.unwrap();
        ticks.assert_nothing_sent().await;
    }
}
