//! Panning controller: ties window moves to the audio streams of the moved
//! window's process tree.
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use winpan_config::WinpanConfig;
use winpan_core::alloc::{Arena, OomPolicy};
use winpan_core::audio::{ChannelVolumes, SinkInputIndex, SinkInputTable, SlotId};
use winpan_core::process::{descendants_of, Pid, ProcessSource};
use winpan_telemetry::{EventLogger, MetricsRecorder};

use super::backend::{
    AudioEvent, AudioServer, ClientIndex, EventKind, Facility, WindowEvent, WindowSystem,
};
use super::error::EngineError;
use super::panning::{pan, Balance};

/// What one pass over both event sources did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IterationReport {
    pub window_events: usize,
    pub audio_events: usize,
    pub adjustments: usize,
}

impl IterationReport {
    pub fn is_idle(&self) -> bool {
        self.window_events == 0 && self.audio_events == 0
    }
}

/// Single-threaded owner of all panning state.
///
/// Window handling scans the process table into a scratch arena that is reset
/// after every event, so nothing arena-backed survives between events.
pub struct Controller<W, A, P> {
    windows: W,
    audio: A,
    processes: P,
    arena: Arena,
    index_exponent: u32,
    sinks: SinkInputTable,
    screen_width: u32,
    restore_on_exit: bool,
    poll_interval: Duration,
    metrics: Arc<MetricsRecorder>,
}

impl<W, A, P> Controller<W, A, P>
where
    W: WindowSystem,
    A: AudioServer,
    P: ProcessSource,
{
    pub fn new(
        config: &WinpanConfig,
        windows: W,
        audio: A,
        processes: P,
        metrics: Arc<MetricsRecorder>,
    ) -> Result<Self, EngineError> {
        config.check_sizing()?;
        let policy = if config.core.memory.abort_on_exhaustion {
            OomPolicy::Abort
        } else {
            OomPolicy::Error
        };
        debug!(
            arena_size = config.core.memory.arena_size,
            index_slots = config.core.process.index_capacity(),
            sink_inputs = config.audio.sink_input_capacity,
            "Initializing controller"
        );

        Ok(Self {
            windows,
            audio,
            processes,
            arena: Arena::with_capacity(config.core.memory.arena_size).with_policy(policy),
            index_exponent: config.core.process.index_exponent,
            sinks: SinkInputTable::new(config.audio.sink_input_capacity),
            screen_width: config.audio.screen_width,
            restore_on_exit: config.audio.restore_on_exit,
            poll_interval: Duration::from_millis(config.core.event_loop.poll_interval_ms),
            metrics,
        })
    }

    pub fn sinks(&self) -> &SinkInputTable {
        &self.sinks
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn windows_mut(&mut self) -> &mut W {
        &mut self.windows
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn processes_mut(&mut self) -> &mut P {
        &mut self.processes
    }

    /// Drains pending window events, then pending audio events.
    pub fn iterate(&mut self) -> Result<IterationReport, EngineError> {
        let mut report = IterationReport::default();

        while let Some(event) = self.windows.poll_event() {
            report.window_events += 1;
            report.adjustments += self.handle_window_event(&event)?;
        }
        while let Some(event) = self.audio.poll_event() {
            report.audio_events += 1;
            self.handle_audio_event(event);
        }

        if !report.is_idle() {
            trace!(?report, "iteration complete");
        }
        Ok(report)
    }

    /// Pans every tracked stream owned by the window's process or one of its
    /// descendants. Returns the number of volume commands issued.
    #[instrument(skip_all, fields(window = %event.window))]
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> Result<usize, EngineError> {
        self.metrics.window_events.inc();

        let Some(pid) = self.windows.find_window_pid(event.window) else {
            debug!("window has no process id, skipping");
            return Ok(0);
        };
        let balance = Balance::from_geometry(event.x, event.width, self.screen_width);

        let started = Instant::now();
        let outcome = descendants_of(&self.arena, &self.processes, self.index_exponent, pid)
            .map(|pids| pan_owned(&mut self.sinks, &mut self.audio, pids, balance));
        self.metrics
            .observe_scan(started.elapsed().as_nanos().min(u64::MAX as u128) as u64);
        self.arena.reset();

        let adjusted = outcome.inspect_err(|_| self.metrics.scan_failures.inc())?;
        self.metrics.volume_adjustments.inc_by(adjusted as u64);
        EventLogger::log_window_event(event.window.0, pid, event.x, event.width, adjusted);
        Ok(adjusted)
    }

    pub fn handle_audio_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::Ready => {
                info!("Audio server ready, subscribing to sink inputs");
                self.audio.subscribe_sink_inputs();
                self.audio.request_sink_input_list();
            }
            AudioEvent::Subscription {
                facility: Facility::SinkInput,
                kind,
                index,
            } => match kind {
                EventKind::New | EventKind::Changed => self.audio.request_sink_input_info(index),
                EventKind::Removed => {
                    self.sinks.remove(index);
                }
            },
            AudioEvent::Subscription { facility, .. } => {
                trace!(?facility, "ignoring subscription event");
            }
            AudioEvent::SinkInputInfo {
                index,
                client,
                volume,
            } => self.on_sink_input_info(index, client, volume),
            AudioEvent::ClientInfo { slot, process_id } => self.on_client_info(slot, process_id),
        }
    }

    fn on_sink_input_info(
        &mut self,
        index: SinkInputIndex,
        client: Option<ClientIndex>,
        volume: ChannelVolumes,
    ) {
        let Some(slot) = self.sinks.add_slot(index) else {
            self.metrics.untracked_sink_inputs.inc();
            return;
        };
        let Some(record) = self.sinks.get_mut(slot) else {
            return;
        };
        if record.update_volume(volume) {
            debug!(sink_input = index, volume = ?record.volume(), "stream volume updated");
        }
        if !record.needs_owner_request() {
            return;
        }
        match client {
            Some(client) => {
                debug!(sink_input = index, client, "requesting client info");
                record.mark_owner_requested();
                self.audio.request_client_info(client, slot);
            }
            None => warn!(
                sink_input = index,
                "sink input has no client, cannot determine its process"
            ),
        }
    }

    fn on_client_info(&mut self, slot: SlotId, process_id: Option<String>) {
        let pid = match process_id.as_deref().map(str::parse::<Pid>) {
            Some(Ok(pid)) => pid,
            Some(Err(err)) => {
                warn!(%slot, value = ?process_id, %err, "invalid application.process.id");
                return;
            }
            None => {
                warn!(%slot, "client has no application.process.id");
                return;
            }
        };
        let Some(record) = self.sinks.get_mut(slot) else {
            warn!(%slot, "client info names a slot outside the table");
            return;
        };
        if record.set_owner(pid) {
            debug!(%slot, sink_input = ?record.index(), pid, "sink input owner resolved");
        } else {
            debug!(%slot, pid, "client info for a released slot, ignoring");
        }
    }

    /// Centres every tracked stream. Returns the number of commands issued.
    pub fn restore_volumes(&mut self) -> usize {
        let mut restored = 0;
        for (_, record) in self.sinks.iter_occupied() {
            let (Some(index), Some(volume)) = (record.index(), record.volume().centred()) else {
                continue;
            };
            debug!(sink_input = index, ?volume, "restoring volume");
            self.audio.set_sink_input_volume(index, &volume);
            restored += 1;
        }
        info!(restored, "volumes restored");
        restored
    }

    /// Runs the loop until `shutdown` resolves or an iteration fails.
    ///
    /// Volumes are restored on either exit path if configured to; a failure
    /// is returned after restoring.
    #[instrument(skip_all)]
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), EngineError>
    where
        F: Future<Output = Result<(), EngineError>>,
    {
        info!(poll_interval = ?self.poll_interval, "Starting event loop");
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                result = &mut shutdown => {
                    if result.is_ok() {
                        info!("Shutdown requested");
                    }
                    break result;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.iterate() {
                        error!(%err, "event loop stopped");
                        break Err(err);
                    }
                }
            }
        };

        if self.restore_on_exit {
            self.restore_volumes();
        }
        outcome
    }
}

fn pan_owned<A: AudioServer>(
    sinks: &mut SinkInputTable,
    audio: &mut A,
    pids: &[Pid],
    balance: Balance,
) -> usize {
    let mut adjusted = 0;
    for &pid in pids {
        for record in sinks.owned_by_mut(pid) {
            let Some(index) = record.index() else {
                continue;
            };
            let Some(volume) = pan(record.volume(), balance) else {
                trace!(sink_input = index, "fewer than two channels, not panning");
                continue;
            };
            trace!(sink_input = index, pid, ?volume, "panning");
            audio.set_sink_input_volume(index, &volume);
            record.set_applied(volume);
            adjusted += 1;
        }
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::WindowId;
    use winpan_core::process::MemorySource;

    #[derive(Default)]
    struct NoWindows;

    impl WindowSystem for NoWindows {
        fn poll_event(&mut self) -> Option<WindowEvent> {
            None
        }
        fn window_pid(&self, window: WindowId) -> Option<Pid> {
            Some(window.0 as Pid)
        }
        fn first_child(&self, _: WindowId) -> Option<WindowId> {
            None
        }
    }

    #[derive(Default)]
    struct Recorder {
        volumes: Vec<(SinkInputIndex, ChannelVolumes)>,
        client_requests: Vec<(ClientIndex, SlotId)>,
        subscribed: bool,
        listed: bool,
    }

    impl AudioServer for Recorder {
        fn poll_event(&mut self) -> Option<AudioEvent> {
            None
        }
        fn subscribe_sink_inputs(&mut self) {
            self.subscribed = true;
        }
        fn request_sink_input_list(&mut self) {
            self.listed = true;
        }
        fn request_sink_input_info(&mut self, _: SinkInputIndex) {}
        fn request_client_info(&mut self, client: ClientIndex, slot: SlotId) {
            self.client_requests.push((client, slot));
        }
        fn set_sink_input_volume(&mut self, index: SinkInputIndex, volume: &ChannelVolumes) {
            self.volumes.push((index, *volume));
        }
    }

    fn controller(
        pairs: &[(Pid, Pid)],
    ) -> Controller<NoWindows, Recorder, MemorySource> {
        let mut config = WinpanConfig::default();
        config.core.memory.arena_size = 256 * 1024;
        config.core.process.index_exponent = 8;
        config.audio.sink_input_capacity = 4;
        Controller::new(
            &config,
            NoWindows,
            Recorder::default(),
            MemorySource::from_pairs(pairs.iter().copied()),
            Arc::new(MetricsRecorder::new().unwrap()),
        )
        .unwrap()
    }

    fn track(c: &mut Controller<NoWindows, Recorder, MemorySource>, index: u32, pid: Pid) {
        c.handle_audio_event(AudioEvent::SinkInputInfo {
            index,
            client: Some(index + 100),
            volume: ChannelVolumes::stereo(1000, 1000),
        });
        let slot = c.sinks().find_slot(index).unwrap();
        c.handle_audio_event(AudioEvent::ClientInfo {
            slot,
            process_id: Some(pid.to_string()),
        });
    }

    fn moved(window: u64, x: i32) -> WindowEvent {
        WindowEvent {
            window: WindowId(window),
            x,
            y: 0,
            width: 0,
            height: 100,
        }
    }

    #[test]
    fn test_ready_subscribes_and_lists() {
        let mut c = controller(&[]);
        c.handle_audio_event(AudioEvent::Ready);
        assert!(c.audio().subscribed);
        assert!(c.audio().listed);
    }

    #[test]
    fn test_root_stream_adjusted_once() {
        let mut c = controller(&[(10, 1), (11, 10)]);
        track(&mut c, 1, 10);
        assert_eq!(c.handle_window_event(&moved(10, 3840)).unwrap(), 1);
        assert_eq!(c.audio().volumes, vec![(1, ChannelVolumes::stereo(0, 1000))]);
    }

    #[test]
    fn test_arena_reset_after_event() {
        let mut c = controller(&[(10, 1), (11, 10)]);
        c.handle_window_event(&moved(10, 0)).unwrap();
        assert_eq!(c.arena().used(), 0);
        assert_eq!(c.arena().stats().resets, 1);
    }

    #[test]
    fn test_index_full_is_fatal() {
        let pairs: Vec<_> = (2..400).map(|pid| (pid, 1)).collect();
        let mut c = controller(&pairs);
        let err = c.handle_window_event(&moved(1, 0)).unwrap_err();
        assert!(matches!(err, EngineError::Process(_)));
        assert_eq!(c.arena().used(), 0);
    }

    #[test]
    fn test_invalid_process_id_leaves_owner_unknown() {
        let mut c = controller(&[]);
        c.handle_audio_event(AudioEvent::SinkInputInfo {
            index: 3,
            client: Some(9),
            volume: ChannelVolumes::stereo(1, 1),
        });
        c.handle_audio_event(AudioEvent::ClientInfo {
            slot: SlotId(0),
            process_id: Some("not-a-pid".into()),
        });
        assert_eq!(c.sinks().find_by_index(3).unwrap().pid(), None);
        assert_eq!(c.audio().client_requests, vec![(9, SlotId(0))]);
    }

    #[test]
    fn test_restore_centres_volumes() {
        let mut c = controller(&[]);
        c.handle_audio_event(AudioEvent::SinkInputInfo {
            index: 8,
            client: None,
            volume: ChannelVolumes::stereo(300, 100),
        });
        assert_eq!(c.restore_volumes(), 1);
        assert_eq!(c.audio().volumes, vec![(8, ChannelVolumes::stereo(200, 200))]);
    }
}
