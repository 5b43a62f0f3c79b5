//! Scripted window system and audio server.
//!
//! Both queue their output and hand it to the controller on a later poll, the
//! way a real server connection delivers replies.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

use winpan_core::audio::{ChannelVolumes, SinkInputIndex, SlotId};
use winpan_core::process::Pid;
use winpan_engine::{
    AudioEvent, AudioServer, ClientIndex, EventKind, Facility, WindowEvent, WindowId, WindowSystem,
};

/// A volume change the controller asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VolumeCommand {
    pub index: SinkInputIndex,
    pub volume: ChannelVolumes,
}

/// Volume commands in issue order, shared with whoever inspects the run.
pub type CommandLog = Arc<Mutex<Vec<VolumeCommand>>>;

#[derive(Debug, Default)]
pub struct ScriptedWindowSystem {
    pending: VecDeque<WindowEvent>,
    pids: HashMap<WindowId, Pid>,
    children: HashMap<WindowId, WindowId>,
}

impl ScriptedWindowSystem {
    pub fn add_window(&mut self, window: WindowId, pid: Option<Pid>, child: Option<WindowId>) {
        if let Some(pid) = pid {
            self.pids.insert(window, pid);
        }
        if let Some(child) = child {
            self.children.insert(window, child);
        }
    }

    pub fn push(&mut self, event: WindowEvent) {
        self.pending.push_back(event);
    }
}

impl WindowSystem for ScriptedWindowSystem {
    fn poll_event(&mut self) -> Option<WindowEvent> {
        self.pending.pop_front()
    }

    fn window_pid(&self, window: WindowId) -> Option<Pid> {
        self.pids.get(&window).copied()
    }

    fn first_child(&self, window: WindowId) -> Option<WindowId> {
        self.children.get(&window).copied()
    }
}

#[derive(Clone, Copy, Debug)]
struct Stream {
    client: Option<ClientIndex>,
    volume: ChannelVolumes,
}

/// In-memory audio server with a fixed client registry.
#[derive(Debug, Default)]
pub struct ScriptedAudioServer {
    clients: HashMap<ClientIndex, Option<String>>,
    streams: BTreeMap<SinkInputIndex, Stream>,
    outbox: VecDeque<AudioEvent>,
    subscribed: bool,
    log: CommandLog,
}

impl ScriptedAudioServer {
    pub fn new(log: CommandLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn log(&self) -> CommandLog {
        Arc::clone(&self.log)
    }

    /// Registers a client whose `application.process.id` is `process_id`.
    pub fn add_client(&mut self, client: ClientIndex, process_id: Option<String>) {
        self.clients.insert(client, process_id);
    }

    pub fn connect(&mut self) {
        self.outbox.push_back(AudioEvent::Ready);
    }

    pub fn start_stream(
        &mut self,
        index: SinkInputIndex,
        client: Option<ClientIndex>,
        volume: ChannelVolumes,
    ) {
        self.streams.insert(index, Stream { client, volume });
        self.notify(EventKind::New, index);
    }

    pub fn end_stream(&mut self, index: SinkInputIndex) {
        if self.streams.remove(&index).is_some() {
            self.notify(EventKind::Removed, index);
        }
    }

    /// A volume change made outside the controller, e.g. by a mixer.
    pub fn change_volume(&mut self, index: SinkInputIndex, volume: ChannelVolumes) {
        if let Some(stream) = self.streams.get_mut(&index) {
            stream.volume = volume;
            self.notify(EventKind::Changed, index);
        }
    }

    pub fn stream_volume(&self, index: SinkInputIndex) -> Option<ChannelVolumes> {
        self.streams.get(&index).map(|stream| stream.volume)
    }

    fn notify(&mut self, kind: EventKind, index: SinkInputIndex) {
        if self.subscribed {
            self.outbox.push_back(AudioEvent::Subscription {
                facility: Facility::SinkInput,
                kind,
                index,
            });
        }
    }

    fn info(&self, index: SinkInputIndex, stream: &Stream) -> AudioEvent {
        AudioEvent::SinkInputInfo {
            index,
            client: stream.client,
            volume: stream.volume,
        }
    }
}

impl AudioServer for ScriptedAudioServer {
    fn poll_event(&mut self) -> Option<AudioEvent> {
        self.outbox.pop_front()
    }

    fn subscribe_sink_inputs(&mut self) {
        self.subscribed = true;
    }

    fn request_sink_input_list(&mut self) {
        let infos: Vec<_> = self
            .streams
            .iter()
            .map(|(&index, stream)| self.info(index, stream))
            .collect();
        self.outbox.extend(infos);
    }

    fn request_sink_input_info(&mut self, index: SinkInputIndex) {
        match self.streams.get(&index) {
            Some(stream) => {
                let info = self.info(index, stream);
                self.outbox.push_back(info);
            }
            None => trace!(sink_input = index, "info requested for a gone stream"),
        }
    }

    fn request_client_info(&mut self, client: ClientIndex, slot: SlotId) {
        let process_id = self.clients.get(&client).cloned().flatten();
        self.outbox
            .push_back(AudioEvent::ClientInfo { slot, process_id });
    }

    fn set_sink_input_volume(&mut self, index: SinkInputIndex, volume: &ChannelVolumes) {
        self.log.lock().push(VolumeCommand {
            index,
            volume: *volume,
        });
        self.change_volume(index, *volume);
    }
}
