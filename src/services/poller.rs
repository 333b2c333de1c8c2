use crate::capabilities::CapabilitySet;
use crate::client::{ZontApi, ZontClientError};
use crate::models::state::{WriteEvent, connection_meta, connection_path};
use crate::models::zont::DeviceId;
use crate::services::expand::expand;
use crate::services::topology::HeatingTopology;
use crate::services::translate::translate;
use crate::store::StateStore;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A cycle was already in flight.
    Skipped,
    /// Probe or fetch failed; only the connection status was published.
    Disconnected,
    Completed {
        devices: usize,
        published: usize,
        failed: usize,
    },
}

pub struct Poller<A, S> {
    api: A,
    store: S,
    state: PollState,
    /// Topologies from the last completed cycle, one per device.
    topologies: BTreeMap<DeviceId, HeatingTopology>,
    io_settle: Duration,
}

impl<A: ZontApi, S: StateStore> Poller<A, S> {
    pub fn new(api: A, store: S, io_settle: Duration) -> Self {
        Poller {
            api,
            store,
            state: PollState::Idle,
            topologies: BTreeMap::new(),
            io_settle,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Probe, fetch, expand and publish. Refuses to start while another cycle runs.
    pub fn poll_cycle(&mut self) -> CycleOutcome {
        if self.state == PollState::Polling {
            debug!("Poll: cycle already in flight, skipping tick");
            return CycleOutcome::Skipped;
        }
        self.state = PollState::Polling;
        let outcome = self.run_cycle();
        self.state = PollState::Idle;
        outcome
    }

    fn run_cycle(&mut self) -> CycleOutcome {
        if let Err(e) = self.api.probe() {
            self.report_disconnected("probe", &e);
            return CycleOutcome::Disconnected;
        }
        let list = match self.api.get_devices() {
            Ok(list) => list,
            Err(e) => {
                self.report_disconnected("get_devices", &e);
                return CycleOutcome::Disconnected;
            }
        };
        self.set_connection(true);

        let mut topologies = BTreeMap::new();
        let mut published = 0;
        let mut failed = 0;
        for device in &list.devices {
            let caps = CapabilitySet::of(device);
            let topology = HeatingTopology::build(device);
            let entries = expand(device, &caps, &topology);
            debug!(
                "Poll: device {} ({}) caps={} paths={}",
                device.id.0,
                device.type_code(),
                caps.len(),
                entries.len()
            );
            for entry in &entries {
                let res = self
                    .store
                    .upsert(&entry.path, &entry.meta)
                    .and_then(|_| self.store.publish(&entry.path, &entry.value));
                match res {
                    Ok(()) => published += 1,
                    Err(e) => {
                        failed += 1;
                        warn!("Poll: {}", e);
                    }
                }
            }
            topologies.insert(device.id, topology);
        }
        self.topologies = topologies;

        CycleOutcome::Completed {
            devices: list.devices.len(),
            published,
            failed,
        }
    }

    fn report_disconnected(&mut self, step: &str, err: &ZontClientError) {
        if err.is_auth() {
            error!("Poll: {} refused: {}", step, err);
        } else {
            warn!("Poll: {} failed: {}", step, err);
        }
        self.set_connection(false);
    }

    fn set_connection(&mut self, up: bool) {
        let path = connection_path();
        let res = self
            .store
            .upsert(&path, &connection_meta())
            .and_then(|_| self.store.publish(&path, &Value::Bool(up)));
        if let Err(e) = res {
            warn!("Poll: unable to publish connection state: {}", e);
        }
    }

    /// Translate and send one write. Returns the re-poll delay when a command
    /// was acknowledged.
    pub fn handle_write(&mut self, event: &WriteEvent) -> Option<Duration> {
        if event.ack {
            return None;
        }
        let empty = HeatingTopology::default();
        let topology = event
            .path
            .device_id()
            .and_then(|id| self.topologies.get(&id))
            .unwrap_or(&empty);
        let Some(command) = translate(&event.path, &event.value, topology, Utc::now()) else {
            debug!("Write: no command for {} = {}", event.path, event.value);
            return None;
        };

        match self.api.send(&command) {
            Ok(_) => {
                info!(
                    "Write: {} = {} sent to device {} via {}",
                    event.path,
                    event.value,
                    command.device_id.0,
                    command.endpoint.path()
                );
                Some(command.repoll_delay(self.io_settle))
            }
            Err(e) => {
                error!("Write: {} = {} failed: {}", event.path, event.value, e);
                None
            }
        }
    }

    /// Handle every pending write; returns the shortest requested re-poll delay.
    pub fn process_writes(&mut self) -> Result<Option<Duration>, String> {
        let events = self.store.pending_writes()?;
        let mut repoll: Option<Duration> = None;
        for event in &events {
            if let Some(delay) = self.handle_write(event) {
                repoll = Some(repoll.map_or(delay, |d| d.min(delay)));
            }
        }
        Ok(repoll)
    }
}

/// Next tick on the `interval` grid anchored at `started`, strictly after `finished`.
/// Ticks that elapsed while a cycle overran are dropped, not replayed.
pub fn next_tick(started: Instant, finished: Instant, interval: Duration) -> Instant {
    let mut next = started + interval;
    let mut skipped = 0u32;
    while next <= finished {
        next += interval;
        skipped += 1;
    }
    if skipped > 0 {
        debug!("Poll: cycle overran, dropped {} tick(s)", skipped);
    }
    next
}

pub fn run_loop<A: ZontApi, S: StateStore>(poller: &mut Poller<A, S>, interval: Duration, write_check: Duration) {
    let mut next_poll = Instant::now();
    loop {
        if Instant::now() >= next_poll {
            let started = Instant::now();
            match poller.poll_cycle() {
                CycleOutcome::Completed {
                    devices,
                    published,
                    failed,
                } => info!(
                    "Poll: {} device(s), {} state(s) published, {} failed in {} ms",
                    devices,
                    published,
                    failed,
                    started.elapsed().as_millis()
                ),
                CycleOutcome::Disconnected => warn!("Poll: cloud unreachable, retrying in {}s", interval.as_secs()),
                CycleOutcome::Skipped => {}
            }
            next_poll = next_tick(started, Instant::now(), interval);
        }

        match poller.process_writes() {
            Ok(Some(delay)) => {
                let repoll_at = Instant::now() + delay;
                if repoll_at < next_poll {
                    debug!("Poll: re-poll scheduled in {} ms", delay.as_millis());
                    next_poll = repoll_at;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Write: {}", e),
        }

        let wait = next_poll.saturating_duration_since(Instant::now()).min(write_check);
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}
