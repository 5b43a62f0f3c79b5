//! Interfaces to the window system and the audio server.
//!
//! Both are polled from the controller's loop. Requests to the audio server
//! are fire-and-forget; their answers come back later as [`AudioEvent`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use winpan_core::audio::{ChannelVolumes, SinkInputIndex, SlotId};
use winpan_core::process::Pid;

/// Audio-server index of a client connection.
pub type ClientIndex = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A window was moved or resized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEvent {
    pub window: WindowId,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

pub trait WindowSystem {
    /// Next pending geometry change, if any. Never blocks.
    fn poll_event(&mut self) -> Option<WindowEvent>;

    /// Pid advertised by the window itself.
    fn window_pid(&self, window: WindowId) -> Option<Pid>;

    fn first_child(&self, window: WindowId) -> Option<WindowId>;

    /// Pid owning `window`, looking one level down when the frame itself
    /// carries none (reparenting window managers).
    fn find_window_pid(&self, window: WindowId) -> Option<Pid> {
        self.window_pid(window).or_else(|| {
            self.first_child(window)
                .and_then(|child| self.window_pid(child))
        })
    }
}

/// Object class a subscription event refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facility {
    Sink,
    Source,
    SinkInput,
    SourceOutput,
    Module,
    Client,
    SampleCache,
    Server,
    Card,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    New,
    Changed,
    Removed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEvent {
    /// The connection is up and requests may be issued.
    Ready,
    Subscription {
        facility: Facility,
        kind: EventKind,
        index: SinkInputIndex,
    },
    /// Answer to a sink-input info or list request.
    SinkInputInfo {
        index: SinkInputIndex,
        client: Option<ClientIndex>,
        volume: ChannelVolumes,
    },
    /// Answer to [`AudioServer::request_client_info`] for the record at `slot`.
    ClientInfo {
        slot: SlotId,
        process_id: Option<String>,
    },
}

pub trait AudioServer {
    /// Next delivered message, if any. Never blocks.
    fn poll_event(&mut self) -> Option<AudioEvent>;

    fn subscribe_sink_inputs(&mut self);

    /// Ask for one `SinkInputInfo` per existing sink input.
    fn request_sink_input_list(&mut self);

    fn request_sink_input_info(&mut self, index: SinkInputIndex);

    /// Resolve the process behind `client`; the answer names `slot`.
    fn request_client_info(&mut self, client: ClientIndex, slot: SlotId);

    fn set_sink_input_volume(&mut self, index: SinkInputIndex, volume: &ChannelVolumes);
}

impl<W: WindowSystem + ?Sized> WindowSystem for Box<W> {
    fn poll_event(&mut self) -> Option<WindowEvent> {
        (**self).poll_event()
    }

    fn window_pid(&self, window: WindowId) -> Option<Pid> {
        (**self).window_pid(window)
    }

    fn first_child(&self, window: WindowId) -> Option<WindowId> {
        (**self).first_child(window)
    }
}

impl<A: AudioServer + ?Sized> AudioServer for Box<A> {
    fn poll_event(&mut self) -> Option<AudioEvent> {
        (**self).poll_event()
    }

    fn subscribe_sink_inputs(&mut self) {
        (**self).subscribe_sink_inputs()
    }

    fn request_sink_input_list(&mut self) {
        (**self).request_sink_input_list()
    }

    fn request_sink_input_info(&mut self, index: SinkInputIndex) {
        (**self).request_sink_input_info(index)
    }

    fn request_client_info(&mut self, client: ClientIndex, slot: SlotId) {
        (**self).request_client_info(client, slot)
    }

    fn set_sink_input_volume(&mut self, index: SinkInputIndex, volume: &ChannelVolumes) {
        (**self).set_sink_input_volume(index, volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Frames {
        pids: HashMap<u64, Pid>,
        children: HashMap<u64, u64>,
    }

    impl WindowSystem for Frames {
        fn poll_event(&mut self) -> Option<WindowEvent> {
            None
        }

        fn window_pid(&self, window: WindowId) -> Option<Pid> {
            self.pids.get(&window.0).copied()
        }

        fn first_child(&self, window: WindowId) -> Option<WindowId> {
            self.children.get(&window.0).copied().map(WindowId)
        }
    }

    #[test]
    fn test_find_window_pid_falls_back_to_child() {
        let frames = Frames {
            pids: HashMap::from([(1, 100), (3, 300)]),
            children: HashMap::from([(2, 3), (1, 4)]),
        };
        assert_eq!(frames.find_window_pid(WindowId(1)), Some(100));
        assert_eq!(frames.find_window_pid(WindowId(2)), Some(300));
        assert_eq!(frames.find_window_pid(WindowId(5)), None);
    }
}
