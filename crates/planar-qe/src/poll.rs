//! Status polling and the communication monitor task.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::controller::Inner;

/// Pause between the state query and the input query of one poll.
pub const SETTLE_DELAY: Duration = Duration::from_millis(2000);

/// Query power state and, if the display is on, the selected input.
///
/// Only a weak reference is held across the settle delay so a poll in
/// flight never keeps a dropped controller alive.
pub(crate) async fn poll_status(inner: &Weak<Inner>) {
    let settle = {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.query_state();
        if !inner.is_on() {
            return;
        }
        inner.settle_delay()
    };

    sleep(settle).await;

    if let Some(inner) = inner.upgrade() {
        inner.query_input();
    }
}

/// Run the communication monitor until `cancel` fires or the controller
/// is dropped. The first poll goes out immediately.
pub(crate) fn spawn_monitor(
    inner: Weak<Inner>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match inner.upgrade() {
                Some(strong) => strong.check_health(),
                None => break,
            }
            trace!("monitor poll");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = poll_status(&inner) => {}
            }
        }
        debug!("communication monitor stopped");
    })
}
