//! PulseRecorder - records the measured pulse train from mirror reports

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{Level, MirrorReport, PulseBit, PulseMeasurement, ReportCallback};

/// Accumulates every measurement reported by a mirror
#[derive(Debug, Clone, Default)]
pub struct PulseRecorder {
    measurements: Arc<Mutex<Vec<PulseMeasurement>>>,
}

impl PulseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to register on the mirror's [`contracts::Reporter`]
    pub fn callback(&self) -> ReportCallback {
        let measurements = self.measurements.clone();
        Arc::new(move |report: &MirrorReport| {
            if let Some(m) = report.measurement() {
                measurements
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(*m);
            }
        })
    }

    /// Measurements in arrival order
    pub fn measurements(&self) -> Vec<PulseMeasurement> {
        self.measurements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.measurements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.measurements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Widths of one polarity, in arrival order
    pub fn widths(&self, polarity: Level) -> Vec<u64> {
        self.measurements()
            .into_iter()
            .filter(|m| m.polarity == polarity)
            .map(|m| m.width_micros)
            .collect()
    }

    /// The i-th high width paired with the i-th low width
    ///
    /// Unpaired trailing pulses are dropped.
    pub fn bits(&self) -> Vec<PulseBit> {
        self.widths(Level::High)
            .into_iter()
            .zip(self.widths(Level::Low))
            .map(|(on_micros, off_micros)| PulseBit {
                on_micros,
                off_micros,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EdgeError, Reporter};

    fn measured(polarity: Level, start: u64, end: u64) -> MirrorReport {
        MirrorReport::Measured(PulseMeasurement::between(polarity, start, end).unwrap())
    }

    #[test]
    fn test_records_only_measurements() {
        let recorder = PulseRecorder::new();
        let reporter = Reporter::new().with(recorder.callback());

        reporter.emit(measured(Level::High, 0, 500));
        reporter.emit(MirrorReport::EdgeRejected(EdgeError::OutOfOrder {
            level: Level::Low,
            timestamp_micros: 10,
            last_micros: 500,
        }));
        reporter.emit(measured(Level::Low, 500, 1500));

        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.widths(Level::High), vec![500]);
        assert_eq!(recorder.widths(Level::Low), vec![1000]);
    }

    #[test]
    fn test_bits_pair_by_index() {
        let recorder = PulseRecorder::new();
        let callback = recorder.callback();

        callback(&measured(Level::High, 0, 560));
        callback(&measured(Level::Low, 560, 2250));
        callback(&measured(Level::High, 2250, 2810));
        callback(&measured(Level::Low, 2810, 3370));
        callback(&measured(Level::High, 3370, 3930));

        assert_eq!(
            recorder.bits(),
            vec![
                PulseBit {
                    on_micros: 560,
                    off_micros: 1690
                },
                PulseBit {
                    on_micros: 560,
                    off_micros: 560
                },
            ]
        );

        recorder.clear();
        assert!(recorder.is_empty());
        assert!(recorder.bits().is_empty());
    }
}
