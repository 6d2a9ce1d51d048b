//! Simulated GPIO chip
//!
//! Tracks which lines exist and who holds them, the way a character-device
//! chip refuses a second request for a line.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use contracts::{ChannelId, InitializationError, LineOffset, MirrorBlueprint};
use tracing::{debug, instrument};

use crate::edge_source::SimulatedEdgeSource;
use crate::output_line::SimulatedOutputLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineUsage {
    Free,
    Input,
    Output,
}

impl LineUsage {
    fn label(self) -> &'static str {
        match self {
            LineUsage::Free => "free",
            LineUsage::Input => "input",
            LineUsage::Output => "output",
        }
    }
}

/// Simulated GPIO chip
pub struct SimulatedChip {
    /// Line offset -> current holder
    lines: Mutex<HashMap<LineOffset, LineUsage>>,
    /// Zero point of every edge timestamp issued by this chip
    epoch: Instant,
}

impl SimulatedChip {
    /// Create a chip exposing the given lines
    pub fn new(lines: impl IntoIterator<Item = LineOffset>) -> Self {
        Self {
            lines: Mutex::new(lines.into_iter().map(|l| (l, LineUsage::Free)).collect()),
            epoch: Instant::now(),
        }
    }

    /// Create the chip described by a blueprint's `simulation` section
    pub fn from_blueprint(blueprint: &MirrorBlueprint) -> Self {
        Self::new(blueprint.simulated_lines())
    }

    /// Number of lines on the chip
    pub fn line_count(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    /// Request a line as an edge-detecting input
    #[instrument(name = "sim_chip_request_input", skip(self))]
    pub fn request_input(
        &self,
        line: LineOffset,
    ) -> Result<SimulatedEdgeSource, InitializationError> {
        self.claim(line, LineUsage::Input)?;
        debug!(line, "input line requested");
        Ok(SimulatedEdgeSource::with_epoch(line, self.epoch))
    }

    /// Request a line as an output bound to `channel`
    #[instrument(name = "sim_chip_request_output", skip(self), fields(channel = %channel))]
    pub fn request_output(
        &self,
        line: LineOffset,
        channel: ChannelId,
    ) -> Result<SimulatedOutputLine, InitializationError> {
        self.claim(line, LineUsage::Output)?;
        debug!(line, "output line requested");
        Ok(SimulatedOutputLine::new(channel, line))
    }

    /// Return a line to the free pool
    pub fn release(&self, line: LineOffset) {
        if let Some(usage) = self.lines.lock().unwrap().get_mut(&line) {
            *usage = LineUsage::Free;
        }
    }

    fn claim(&self, line: LineOffset, usage: LineUsage) -> Result<(), InitializationError> {
        let mut lines = self.lines.lock().unwrap();
        match lines.get_mut(&line) {
            None => Err(InitializationError::LineUnavailable { line }),
            Some(current) if *current != LineUsage::Free => Err(InitializationError::LineInUse {
                line,
                usage: current.label(),
            }),
            Some(current) => {
                *current = usage;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EdgeSource, OutputConfig, OutputLine};

    #[test]
    fn test_request_unknown_line() {
        let chip = SimulatedChip::new([4, 11]);
        let err = chip.request_input(5).unwrap_err();
        assert!(matches!(err, InitializationError::LineUnavailable { line: 5 }));
    }

    #[test]
    fn test_line_is_exclusive() {
        let chip = SimulatedChip::new([4, 11]);
        let input = chip.request_input(11).unwrap();
        assert_eq!(input.line(), 11);

        let err = chip.request_output(11, "out".into()).unwrap_err();
        assert!(matches!(
            err,
            InitializationError::LineInUse {
                line: 11,
                usage: "input"
            }
        ));

        chip.release(11);
        let output = chip.request_output(11, "out".into()).unwrap();
        assert_eq!(output.channel_id(), "out");
    }

    #[test]
    fn test_from_blueprint() {
        let bp = MirrorBlueprint::new(11, vec![OutputConfig::new("a", 4)]);
        let chip = SimulatedChip::from_blueprint(&bp);
        assert_eq!(chip.line_count(), 2);
        assert!(chip.request_output(4, "a".into()).is_ok());
    }
}
