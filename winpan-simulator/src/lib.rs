/*!
# winpan Simulator

Deterministic replay of desktop scenarios through the panning controller.

## Key Components:
- **Scripted backends:** window system and audio server driven by scenario steps.
- **Scenarios:** YAML files, or generated from a seed.
- **Replay Engine:** runs the controller step by step and hashes the volume
  commands it issued, so runs can be compared across builds.
*/

pub mod backends;
pub mod error;
pub mod replay;
pub mod scenario;

pub use backends::{CommandLog, ScriptedAudioServer, ScriptedWindowSystem, VolumeCommand};
pub use error::ScenarioError;
pub use replay::{state_hash, ReplayEngine, ReplayReport};
pub use scenario::{ClientSpec, ProcessSpec, Scenario, Step, WindowSpec};

/// Runs `engine` and checks the resulting hash against `expected`.
pub fn replay_and_validate(
    engine: ReplayEngine,
    expected: Option<&str>,
) -> Result<ReplayReport, ScenarioError> {
    let report = engine.run()?;
    match expected {
        Some(expected) if expected != report.state_hash => Err(ScenarioError::HashMismatch {
            expected: expected.to_string(),
            actual: report.state_hash,
        }),
        _ => Ok(report),
    }
}
