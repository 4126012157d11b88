//! Fixed-rate tick loop used by the binary.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::controller::{ControlOutput, ControllerCore};

/// Why [`run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    PollerStopped,
}

/// Tick `controller` every `period` until `shutdown` resolves or the poller dies.
///
/// `shutdown` is polled in place for the whole loop, so a signal arriving
/// while a tick is handled is not lost.
pub async fn run(
    controller: &ControllerCore,
    period: Duration,
    shutdown: impl Future<Output = ()>,
) -> LoopExit {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last: Option<ControlOutput> = None;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let output = controller.tick();
                if last != Some(output) {
                    info!(
                        "steering={:+.3} throttle={:+.3} mode={} recording={}",
                        output.steering, output.throttle, output.mode, output.recording
                    );
                    last = Some(output);
                }
                if !controller.is_running() {
                    warn!("Input poller exited unexpectedly");
                    return LoopExit::PollerStopped;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                return LoopExit::Shutdown;
            }
        }
    }
}
