//! # GPIO Simulator
//!
//! In-process GPIO chip used to run and test the mirror without hardware.
//!
//! Responsibilities:
//! - Line acquisition with availability and exclusivity checks
//! - `EdgeSource` implementation with injected, square-wave and scripted edges
//! - `OutputLine` implementation that records pulses and can inject faults
//!
//! ## Example
//!
//! ```ignore
//! use gpio_sim::SimulatedChip;
//!
//! let chip = SimulatedChip::new([4, 11]);
//! let input = chip.request_input(11)?;
//! let output = chip.request_output(4, "emitter_0".into())?;
//! let probe = output.probe();
//! ```

mod chip;
mod edge_source;
mod output_line;

pub use chip::SimulatedChip;
pub use contracts::{EdgeSource, OutputLine};
pub use edge_source::{Playback, SimulatedEdgeSource};
pub use output_line::{OutputProbe, SimulatedOutputLine};
