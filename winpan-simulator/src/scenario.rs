//! Scenario files: an initial process table, windows and audio clients, then
//! a list of steps fed to the controller one at a time.

use std::fs;
use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use winpan_core::audio::{ChannelVolumes, SinkInputIndex, VOLUME_NORM};
use winpan_core::process::Pid;
use winpan_engine::ClientIndex;

use crate::error::ScenarioError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub processes: Vec<ProcessSpec>,
    #[serde(default)]
    pub windows: Vec<WindowSpec>,
    #[serde(default)]
    pub clients: Vec<ClientSpec>,
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub pid: Pid,
    pub ppid: Pid,
    #[serde(default = "default_comm")]
    pub comm: String,
}

fn default_comm() -> String {
    "proc".into()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub id: u64,
    #[serde(default)]
    pub pid: Option<Pid>,
    /// Client window holding the pid when the frame has none.
    #[serde(default)]
    pub child: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSpec {
    pub index: ClientIndex,
    /// Raw `application.process.id` property.
    #[serde(default)]
    pub process_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// The audio server connection becomes ready.
    Connect,
    Spawn {
        pid: Pid,
        ppid: Pid,
        #[serde(default = "default_comm")]
        comm: String,
    },
    Exit {
        pid: Pid,
    },
    StreamStarted {
        index: SinkInputIndex,
        #[serde(default)]
        client: Option<ClientIndex>,
        volume: ChannelVolumes,
    },
    StreamEnded {
        index: SinkInputIndex,
    },
    StreamVolume {
        index: SinkInputIndex,
        volume: ChannelVolumes,
    },
    Move {
        window: u64,
        x: i32,
        #[serde(default)]
        y: i32,
        width: u32,
        #[serde(default)]
        height: u32,
    },
}

impl Scenario {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = serde_yaml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn to_yaml(&self) -> Result<String, ScenarioError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScenarioError> {
        let path = path.as_ref();
        fs::write(path, self.to_yaml()?).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Every moved window must be declared.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        for step in &self.steps {
            if let Step::Move { window, .. } = step {
                if !self.windows.iter().any(|w| w.id == *window) {
                    return Err(ScenarioError::UnknownWindow(*window));
                }
            }
        }
        Ok(())
    }

    /// A random desktop: a process forest under pid 1, a few windows and
    /// streams, then `moves` window moves with the occasional spawn or exit.
    pub fn generate(seed: u64, moves: usize) -> Self {
        const PROCESSES: Pid = 48;
        const WINDOWS: u64 = 4;
        const CLIENTS: ClientIndex = 6;

        let mut rng = SmallRng::seed_from_u64(seed);
        let mut processes = vec![ProcessSpec {
            pid: 1,
            ppid: 0,
            comm: "init".into(),
        }];
        for pid in 2..=PROCESSES {
            let ppid = processes[rng.random_range(0..processes.len())].pid;
            processes.push(ProcessSpec {
                pid,
                ppid,
                comm: format!("proc{pid}"),
            });
        }

        let windows = (1..=WINDOWS)
            .map(|id| WindowSpec {
                id,
                pid: Some(rng.random_range(1..=PROCESSES)),
                child: None,
            })
            .collect();
        let clients = (1..=CLIENTS)
            .map(|index| ClientSpec {
                index,
                process_id: Some(rng.random_range(1..=PROCESSES).to_string()),
            })
            .collect();

        let mut steps = vec![Step::Connect];
        for index in 1..=CLIENTS {
            let left = rng.random_range(VOLUME_NORM / 4..=VOLUME_NORM);
            let right = rng.random_range(VOLUME_NORM / 4..=VOLUME_NORM);
            steps.push(Step::StreamStarted {
                index,
                client: Some(index),
                volume: ChannelVolumes::stereo(left, right),
            });
        }

        let mut next_pid = PROCESSES + 1;
        for _ in 0..moves {
            if rng.random_bool(0.05) {
                steps.push(Step::Spawn {
                    pid: next_pid,
                    ppid: rng.random_range(1..next_pid),
                    comm: format!("proc{next_pid}"),
                });
                next_pid += 1;
            } else if rng.random_bool(0.02) {
                steps.push(Step::Exit {
                    pid: rng.random_range(2..next_pid),
                });
            }
            steps.push(Step::Move {
                window: rng.random_range(1..=WINDOWS),
                x: rng.random_range(-400..4000),
                y: rng.random_range(0..2000),
                width: rng.random_range(100..1600),
                height: rng.random_range(100..1200),
            });
        }

        Self {
            seed,
            processes,
            windows,
            clients,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
seed: 7
processes:
  - { pid: 100, ppid: 1, comm: bash }
  - { pid: 101, ppid: 100 }
windows:
  - { id: 1, pid: 100 }
  - { id: 2, child: 3 }
clients:
  - { index: 42, process_id: "101" }
steps:
  - action: connect
  - action: stream_started
    index: 5
    client: 42
    volume: [65536, 65536]
  - action: move
    window: 1
    x: 0
    width: 800
"#;

    #[test]
    fn test_parse_sample() {
        let scenario = Scenario::from_yaml(SAMPLE).unwrap();
        assert_eq!(scenario.seed, 7);
        assert_eq!(scenario.processes[1].comm, "proc");
        assert_eq!(scenario.windows[1].child, Some(3));
        assert_eq!(scenario.steps[0], Step::Connect);
        assert_eq!(
            scenario.steps[2],
            Step::Move {
                window: 1,
                x: 0,
                y: 0,
                width: 800,
                height: 0
            }
        );
    }

    #[test]
    fn test_unknown_window_rejected() {
        let text = "steps:\n  - { action: move, window: 9, x: 0, width: 1 }\n";
        assert!(matches!(
            Scenario::from_yaml(text),
            Err(ScenarioError::UnknownWindow(9))
        ));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let a = Scenario::generate(42, 50);
        let b = Scenario::generate(42, 50);
        let c = Scenario::generate(43, 50);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.validate().is_ok());
        assert_eq!(
            a.steps.iter().filter(|s| matches!(s, Step::Move { .. })).count(),
            50
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.yaml");
        let scenario = Scenario::generate(1, 5);
        scenario.save_to_file(&path).unwrap();
        assert_eq!(Scenario::load_from_file(&path).unwrap(), scenario);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Scenario::load_from_file("/nonexistent/scenario.yaml"),
            Err(ScenarioError::Io { .. })
        ));
    }
}
