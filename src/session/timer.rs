// src/session/timer.rs

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::{SessionApi, SessionStore, TestSession, TickOutcome};

/// Drives [`TestSession::tick`] once per second until the session stops
/// counting. Dropping the countdown stops it.
pub struct Countdown {
    handle: JoinHandle<()>,
    updates: watch::Receiver<TickOutcome>,
}

impl Countdown {
    pub fn start<A, S>(session: Arc<Mutex<TestSession<A, S>>>) -> Self
    where
        A: SessionApi + 'static,
        S: SessionStore + 'static,
    {
        let (tx, updates) = watch::channel(TickOutcome::Idle);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let outcome = session.lock().await.tick().await;
                match outcome {
                    Ok(TickOutcome::Running(remaining)) => {
                        let _ = tx.send(TickOutcome::Running(remaining));
                    }
                    Ok(done) => {
                        let _ = tx.send(done);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Countdown stopped: {}", e);
                        break;
                    }
                }
            }
        });

        Self { handle, updates }
    }

    /// Latest outcome, for rendering the clock.
    pub fn subscribe(&self) -> watch::Receiver<TickOutcome> {
        self.updates.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the countdown to stop on its own.
    pub async fn finished(&mut self) {
        let _ = (&mut self.handle).await;
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// `h:mm:ss` from an hour up, `m:ss` below.
pub fn format_time(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(7200), "2:00:00");
        assert_eq!(format_time(3725), "1:02:05");
        assert_eq!(format_time(599), "9:59");
        assert_eq!(format_time(5), "0:05");
        assert_eq!(format_time(-3), "0:00");
    }
}
