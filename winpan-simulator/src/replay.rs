//! Replay module.
//!
//! Drives a [`Controller`] over scripted backends, one scenario step at a
//! time, and folds every volume command into a BLAKE3 state hash.

use std::sync::Arc;

use blake3::Hasher;
use tracing::{debug, info, instrument};

use winpan_config::WinpanConfig;
use winpan_core::process::MemorySource;
use winpan_engine::{Controller, WindowEvent, WindowId};
use winpan_telemetry::MetricsRecorder;

use crate::backends::{CommandLog, ScriptedAudioServer, ScriptedWindowSystem, VolumeCommand};
use crate::error::ScenarioError;
use crate::scenario::{Scenario, Step};

/// Upper bound on controller passes per step; a scripted exchange settles in
/// a handful.
const MAX_SETTLE_PASSES: usize = 64;

type ScriptedController = Controller<ScriptedWindowSystem, ScriptedAudioServer, MemorySource>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub steps: usize,
    pub window_events: usize,
    pub adjustments: usize,
    /// Commands issued while centring volumes at the end of the run.
    pub restored: usize,
    pub commands: Vec<VolumeCommand>,
    pub state_hash: String,
}

pub struct ReplayEngine {
    scenario: Scenario,
    controller: ScriptedController,
    log: CommandLog,
    restore_on_exit: bool,
}

impl ReplayEngine {
    pub fn new(scenario: Scenario, config: &WinpanConfig) -> Result<Self, ScenarioError> {
        Self::with_metrics(scenario, config, Arc::new(MetricsRecorder::new()?))
    }

    pub fn with_metrics(
        scenario: Scenario,
        config: &WinpanConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> Result<Self, ScenarioError> {
        scenario.validate()?;

        let mut processes = MemorySource::new();
        for process in &scenario.processes {
            processes.spawn(process.pid, process.ppid, process.comm.clone());
        }

        let mut windows = ScriptedWindowSystem::default();
        for window in &scenario.windows {
            windows.add_window(
                WindowId(window.id),
                window.pid,
                window.child.map(WindowId),
            );
        }

        let log = CommandLog::default();
        let mut audio = ScriptedAudioServer::new(Arc::clone(&log));
        for client in &scenario.clients {
            audio.add_client(client.index, client.process_id.clone());
        }

        let controller = Controller::new(config, windows, audio, processes, metrics)?;

        Ok(Self {
            scenario,
            controller,
            log,
            restore_on_exit: config.audio.restore_on_exit,
        })
    }

    pub fn controller(&self) -> &ScriptedController {
        &self.controller
    }

    #[instrument(skip_all)]
    pub fn run(mut self) -> Result<ReplayReport, ScenarioError> {
        let mut report = ReplayReport::default();
        let steps = std::mem::take(&mut self.scenario.steps);
        info!(seed = self.scenario.seed, steps = steps.len(), "Replaying scenario");

        for step in steps {
            debug!(?step, "applying step");
            self.apply(step);
            report.steps += 1;
            for _ in 0..MAX_SETTLE_PASSES {
                let pass = self.controller.iterate()?;
                report.window_events += pass.window_events;
                report.adjustments += pass.adjustments;
                if pass.is_idle() {
                    break;
                }
            }
        }

        if self.restore_on_exit {
            report.restored = self.controller.restore_volumes();
        }

        report.commands = self.log.lock().clone();
        report.state_hash = state_hash(&report.commands);
        info!(
            commands = report.commands.len(),
            hash = %report.state_hash,
            "Replay complete"
        );
        Ok(report)
    }

    fn apply(&mut self, step: Step) {
        match step {
            Step::Connect => self.controller.audio_mut().connect(),
            Step::Spawn { pid, ppid, comm } => self.controller.processes_mut().spawn(pid, ppid, comm),
            Step::Exit { pid } => {
                self.controller.processes_mut().exit(pid);
            }
            Step::StreamStarted {
                index,
                client,
                volume,
            } => self.controller.audio_mut().start_stream(index, client, volume),
            Step::StreamEnded { index } => self.controller.audio_mut().end_stream(index),
            Step::StreamVolume { index, volume } => {
                self.controller.audio_mut().change_volume(index, volume)
            }
            Step::Move {
                window,
                x,
                y,
                width,
                height,
            } => self.controller.windows_mut().push(WindowEvent {
                window: WindowId(window),
                x,
                y,
                width,
                height,
            }),
        }
    }
}

/// Hex BLAKE3 digest over the commands in issue order.
pub fn state_hash(commands: &[VolumeCommand]) -> String {
    let mut hasher = Hasher::new();
    for command in commands {
        hasher.update(&command.index.to_le_bytes());
        hasher.update(&[command.volume.channels() as u8]);
        for level in command.volume.as_slice() {
            hasher.update(&level.to_le_bytes());
        }
    }
    hex::encode(hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use winpan_core::audio::{ChannelVolumes, VOLUME_NORM};

    const SCENARIO: &str = r#"
processes:
  - { pid: 100, ppid: 1, comm: shell }
  - { pid: 101, ppid: 100, comm: player }
  - { pid: 200, ppid: 1, comm: editor }
windows:
  - { id: 1, pid: 100 }
  - { id: 2, pid: 200 }
clients:
  - { index: 42, process_id: "101" }
steps:
  - action: connect
  - action: stream_started
    index: 5
    client: 42
    volume: [65536, 65536]
  - { action: move, window: 2, x: 0, width: 100 }
  - { action: move, window: 1, x: 3840, width: 100 }
"#;

    fn config() -> WinpanConfig {
        let mut config = WinpanConfig::default();
        config.core.process.index_exponent = 8;
        config
    }

    #[test]
    fn test_descendant_stream_is_panned_then_restored() {
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let report = ReplayEngine::new(scenario, &config()).unwrap().run().unwrap();

        assert_eq!(report.steps, 4);
        assert_eq!(report.window_events, 2);
        assert_eq!(report.adjustments, 1);
        assert_eq!(report.restored, 1);
        assert_eq!(
            report.commands,
            vec![
                VolumeCommand {
                    index: 5,
                    volume: ChannelVolumes::stereo(0, VOLUME_NORM),
                },
                VolumeCommand {
                    index: 5,
                    volume: ChannelVolumes::stereo(VOLUME_NORM, VOLUME_NORM),
                },
            ]
        );
    }

    #[test]
    fn test_restore_can_be_disabled() {
        let mut config = config();
        config.audio.restore_on_exit = false;
        let scenario = Scenario::from_yaml(SCENARIO).unwrap();
        let report = ReplayEngine::new(scenario, &config).unwrap().run().unwrap();
        assert_eq!(report.restored, 0);
        assert_eq!(report.commands.len(), 1);
    }

    #[test]
    fn test_same_seed_same_hash() {
        let a = ReplayEngine::new(Scenario::generate(9, 40), &config())
            .unwrap()
            .run()
            .unwrap();
        let b = ReplayEngine::new(Scenario::generate(9, 40), &config())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(a.state_hash, b.state_hash);
        assert_eq!(a.state_hash.len(), 64);
    }

    #[test]
    fn test_empty_run_hash() {
        assert_eq!(state_hash(&[]), hex::encode(Hasher::new().finalize().as_bytes()));
    }
}
