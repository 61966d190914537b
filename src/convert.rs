//! Conversion driver: owns all state across the input stream and
//! sequences framing, decoding, cycle detection and encoding per line.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::config::ConverterCfg;
use crate::cycle::{CycleState, ReceiverProfile, UnknownProfile};
use crate::dr::{self, VehicleGeometry};
use crate::nmea::{RawSentence, Sentence};
use crate::poslog::LogWriter;

/// Errors terminating a conversion run. Checksum mismatches are not
/// among them: a bad line is skipped with a warning and processing
/// continues.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// An input or output path could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        /// The offending path.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// Reading or writing a line failed mid-stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The configured receiver profile name is not supported.
    #[error(transparent)]
    Profile(#[from] UnknownProfile),
}

/// Streaming converter. Feeds one NMEA input line at a time through
/// checksum validation, decoding and cycle detection, and writes the
/// positioning log records of every completed cycle.
pub struct Converter {
    profile: ReceiverProfile,
    geometry: VehicleGeometry,
    derive_sensors: bool,
    debug: bool,
    state: CycleState,
}

impl Converter {
    /// Create a converter for one input stream.
    pub fn new(
        profile: ReceiverProfile,
        geometry: VehicleGeometry,
        derive_sensors: bool,
        debug: bool,
    ) -> Self {
        Self {
            profile,
            geometry,
            derive_sensors,
            debug,
            state: CycleState::default(),
        }
    }

    /// Consume every line of `input` in order, writing zero or more
    /// output lines per input line.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        log: &mut LogWriter<W>,
    ) -> Result<(), ConvertError> {
        for line in input.lines() {
            let line = line?;
            self.process_line(line.trim_end(), log)?;
        }
        Ok(())
    }

    /// Feed a single input line.
    pub fn process_line<W: Write>(
        &mut self,
        line: &str,
        log: &mut LogWriter<W>,
    ) -> Result<(), ConvertError> {
        let raw = match RawSentence::frame(line) {
            Ok(Some(raw)) => raw,
            // Not a sentence at all: comments and passthrough noise are
            // not part of the protocol.
            Ok(None) => return Ok(()),
            Err(err) => {
                log::warn!("skipping {line:?}: {err}");
                return Ok(());
            }
        };
        let sentence = raw.decode();
        if matches!(
            sentence,
            Sentence::PositionVelocity(_) | Sentence::FixQuality(_) | Sentence::SatelliteView(_)
        ) {
            // Echo every decoded sentence for traceability.
            log.comment(line)?;
        }
        self.state.absorb(&sentence);
        if self.profile.is_trigger(&sentence) && self.state.close_cycle(self.profile) {
            self.flush(log)?;
        }
        Ok(())
    }

    /// Emit all records of the completed cycle, then roll the buffers.
    fn flush<W: Write>(&mut self, log: &mut LogWriter<W>) -> Result<(), ConvertError> {
        let snap = &self.state.current;
        log.position(snap)?;
        log.course(snap)?;
        log.accuracy(snap)?;
        log.satellites(snap)?;
        if self.derive_sensors {
            log.comment("SNS 'derived' from GPS")?;
            log.vehicle_speed(snap)?;
            let estimate = dr::estimate(
                &snap.position_velocity,
                &self.state.previous.position_velocity,
                &self.geometry,
                snap.timestamp,
                self.state.previous.timestamp,
            );
            log.gyroscope(&estimate, snap.timestamp)?;
            log.wheel_ticks(&estimate, snap.timestamp)?;
            if self.debug {
                if let Some(trace) = estimate.trace {
                    log.comment(&format!(
                        "wheel ticks: delta_t={:.3}s delta_heading={:.3}deg dpp={:.4}m avg={:.2} diff={:.2}",
                        trace.delta_t,
                        trace.delta_heading,
                        trace.distance_per_pulse,
                        trace.avg_ticks,
                        trace.delta_ticks,
                    ))?;
                }
            }
        }
        self.state.rollover();
        Ok(())
    }
}

fn open_input(path: &Path) -> Result<File, ConvertError> {
    File::open(path).map_err(|source| ConvertError::Open {
        path: path.display().to_string(),
        source,
    })
}

fn open_output(path: &Path) -> Result<File, ConvertError> {
    File::create(path).map_err(|source| ConvertError::Open {
        path: path.display().to_string(),
        source,
    })
}

/// Convert one NMEA log file into one positioning log file.
///
/// Fails fast before any output is produced when either path cannot be
/// opened; both files are closed when this returns.
pub fn convert_file(cfg: &ConverterCfg) -> Result<(), ConvertError> {
    let geometry = cfg.geometry();
    let input = open_input(&cfg.nmea_log)?;
    let output = open_output(&cfg.positioning_log)?;
    let mut log = LogWriter::new(BufWriter::new(output));
    log.header(
        &cfg.nmea_log.display().to_string(),
        cfg.receiver_type,
        cfg.sns.then_some(&geometry),
    )?;
    let mut converter = Converter::new(cfg.receiver_type, geometry, cfg.sns, cfg.debug);
    converter.run(BufReader::new(input), &mut log)?;
    log.flush()?;
    Ok(())
}
