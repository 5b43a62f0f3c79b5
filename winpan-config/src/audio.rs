//! Audio stream tracking and panning parameters.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct AudioConfig {
    /// Number of sink inputs tracked at once; extra streams go untracked.
    #[validate(range(min = 1, max = 65536))]
    pub sink_input_capacity: usize,

    /// Horizontal extent (pixels) mapped onto the left-right balance.
    #[validate(range(min = 1, max = 65536))]
    pub screen_width: u32,

    /// Centre every tracked stream again on shutdown.
    pub restore_on_exit: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sink_input_capacity: 1024,
            screen_width: 2 * 1920,
            restore_on_exit: true,
        }
    }
}
