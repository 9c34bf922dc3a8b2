//! Continuous position sampling.
//!
//! A [`LocationWatcher`] is built per session and handed its provider; nothing here is
//! global. Each [`LocationWatcher::start`] spawns one task that samples on a fixed
//! interval and polls the permission status on another.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::geofence;
use crate::location::provider::{LocationProvider, PermissionStatus, read_position};
use crate::model::location::{Coordinates, LocationSample};

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub time_interval: Duration,
    /// Samples closer than this to the last emitted one are dropped.
    pub distance_interval_meters: f64,
    pub permission_poll: Duration,
    pub read_timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            time_interval: Duration::from_secs(10),
            distance_interval_meters: 10.0,
            permission_poll: Duration::from_secs(30),
            read_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WatchEvent {
    Sample(LocationSample),
    PermissionChanged(PermissionStatus),
}

pub struct WatchHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct LocationWatcher {
    provider: Arc<dyn LocationProvider>,
    options: WatchOptions,
}

impl LocationWatcher {
    pub fn new(provider: Arc<dyn LocationProvider>, options: WatchOptions) -> Self {
        Self { provider, options }
    }

    pub fn start<F, Fut>(&self, on_event: F) -> WatchHandle
    where
        F: Fn(WatchEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let provider = self.provider.clone();
        let options = self.options.clone();

        let task = tokio::spawn(run(provider, options, stop_rx, on_event));
        WatchHandle { stop_tx, task }
    }

    /// Returns once the sampling task is gone. A callback already running when this is
    /// called finishes first; none starts afterwards.
    pub async fn stop(handle: WatchHandle) {
        let _ = handle.stop_tx.send(true);
        let _ = handle.task.await;
    }
}

async fn run<F, Fut>(
    provider: Arc<dyn LocationProvider>,
    options: WatchOptions,
    mut stop_rx: watch::Receiver<bool>,
    on_event: F,
) where
    F: Fn(WatchEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut sample_tick = tokio::time::interval(options.time_interval);
    sample_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut permission_tick = tokio::time::interval(options.permission_poll);
    permission_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_emitted: Option<Coordinates> = None;
    let mut last_permission: Option<PermissionStatus> = None;

    info!("location watcher started");

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = permission_tick.tick() => {
                let status = provider.permission_status().await;
                let changed = match last_permission {
                    Some(previous) => previous != status,
                    None => status != PermissionStatus::Granted,
                };
                last_permission = Some(status);
                if changed {
                    if *stop_rx.borrow() {
                        break;
                    }
                    on_event(WatchEvent::PermissionChanged(status)).await;
                }
            }
            _ = sample_tick.tick() => {
                let sample = match read_position(provider.as_ref(), options.read_timeout).await {
                    Ok(sample) => sample,
                    Err(e) => {
                        debug!(error = %e, "no sample this tick");
                        continue;
                    }
                };
                let moved = last_emitted.is_none_or(|prev| {
                    geofence::distance_meters(prev, sample.coordinates()) >= options.distance_interval_meters
                });
                if !moved {
                    continue;
                }
                if *stop_rx.borrow() {
                    break;
                }
                last_emitted = Some(sample.coordinates());
                on_event(WatchEvent::Sample(sample)).await;
            }
        }
    }

    info!("location watcher stopped");
}
