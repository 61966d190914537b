//! Encoder for the line-oriented positioning log.
//!
//! Every data record has the shape
//! `TIMESTAMP,ORDINAL$TAG,TIMESTAMP,field1,...,fieldN,VALIDITY_MASK`.
//! The field count per tag is structurally fixed; an absent field only
//! changes its printed value to the placeholder and leaves its validity
//! bit clear.

use std::io::{self, Write};

use crate::cycle::{CycleSnapshot, ReceiverProfile};
use crate::dr::{DeadReckoning, VehicleGeometry};

/// Tags of the records this tool emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `GVGNSP`: simple position.
    Position,
    /// `GVGNSC`: simple course.
    Course,
    /// `GVGNSAC`: extended accuracy.
    Accuracy,
    /// `GVGNSSAT`: satellite detail.
    Satellite,
    /// `GVSNSVSP`: vehicle speed.
    VehicleSpeed,
    /// `GVSNSGYR`: gyroscope.
    Gyroscope,
    /// `GVSNSWHE`: wheel ticks.
    WheelTicks,
}

impl Tag {
    fn label(self) -> &'static str {
        match self {
            Tag::Position => "GVGNSP",
            Tag::Course => "GVGNSC",
            Tag::Accuracy => "GVGNSAC",
            Tag::Satellite => "GVGNSSAT",
            Tag::VehicleSpeed => "GVSNSVSP",
            Tag::Gyroscope => "GVSNSGYR",
            Tag::WheelTicks => "GVSNSWHE",
        }
    }

    /// Hex digits of the validity mask for this tag.
    fn mask_digits(self) -> usize {
        match self {
            Tag::Accuracy => 3,
            _ => 2,
        }
    }
}

/// One output record under construction. Fields are appended left to
/// right; each consumes one bit of the validity mask unless explicitly
/// pushed outside of it.
#[derive(Debug)]
pub struct LogLine {
    tag: Tag,
    timestamp: u64,
    ordinal: u32,
    fields: Vec<String>,
    mask: u32,
    bits: u32,
}

impl LogLine {
    /// Start a record with ordinal 0.
    pub fn new(tag: Tag, timestamp: u64) -> Self {
        Self::with_ordinal(tag, timestamp, 0)
    }

    /// Start a record with an explicit ordinal (satellite detail lines
    /// carry their countdown value here).
    pub fn with_ordinal(tag: Tag, timestamp: u64, ordinal: u32) -> Self {
        Self {
            tag,
            timestamp,
            ordinal,
            fields: Vec::new(),
            mask: 0,
            bits: 0,
        }
    }

    /// Append one masked field: `Some` renders the given text and sets
    /// the field's validity bit, `None` prints the placeholder.
    fn push(&mut self, text: Option<String>, placeholder: &str) {
        match text {
            Some(text) => {
                self.mask |= 1 << self.bits;
                self.fields.push(text);
            }
            None => self.fields.push(placeholder.to_string()),
        }
        self.bits += 1;
    }

    /// Fixed-precision decimal field.
    pub fn decimal(&mut self, value: Option<f64>, precision: usize) -> &mut Self {
        self.push(value.map(|v| format!("{v:.precision$}")), "0");
        self
    }

    /// Zero-padded integer field.
    pub fn integer<T: Into<i64>>(&mut self, value: Option<T>, width: usize) -> &mut Self {
        self.push(
            value.map(|v| {
                let v: i64 = v.into();
                format!("{v:0width$}")
            }),
            "0",
        );
        self
    }

    /// Verbatim field with a custom placeholder.
    pub fn literal(&mut self, value: Option<&str>, placeholder: &str) -> &mut Self {
        self.push(value.map(str::to_string), placeholder);
        self
    }

    /// Verbatim field that does not participate in the validity mask.
    pub fn outside_mask(&mut self, text: &str) -> &mut Self {
        self.fields.push(text.to_string());
        self
    }

    /// Render the record as one output line.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let ts = self.timestamp;
        match self.tag {
            Tag::Satellite => write!(out, "{ts:09},{:02}", self.ordinal)?,
            _ => write!(out, "{ts:09},0")?,
        }
        write!(out, "${},{ts:09}", self.tag.label())?;
        for field in &self.fields {
            write!(out, ",{field}")?;
        }
        writeln!(out, ",0X{mask:0digits$X}", mask = self.mask, digits = self.tag.mask_digits())
    }
}

/// Writes the positioning log: a fixed header followed by data records
/// built from cycle snapshots.
pub struct LogWriter<W: Write> {
    out: W,
}

impl<W: Write> LogWriter<W> {
    /// Wrap an output sink.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Traceability comments plus the version lines of the positioning
    /// and sensor sub-streams. Written once before any data line.
    pub fn header(
        &mut self,
        input_name: &str,
        profile: ReceiverProfile,
        geometry: Option<&VehicleGeometry>,
    ) -> io::Result<()> {
        writeln!(self.out, "#Positioning log converted from NMEA")?;
        writeln!(self.out, "#Original NMEA file: {input_name}")?;
        writeln!(self.out, "#Receiver type: {profile}")?;
        if let Some(geometry) = geometry {
            writeln!(self.out, "#Rear track width: {:.3}m", geometry.track_width)?;
            writeln!(
                self.out,
                "#Wheel rolling circumference: {:.3}m",
                geometry.wheel_circumference
            )?;
            writeln!(
                self.out,
                "#Wheel ticks per revolution: {}",
                geometry.ticks_per_revolution
            )?;
        }
        writeln!(self.out, "0,0$GVGNSVER,2,0,0")?;
        writeln!(self.out, "0,0$GVSNSVER,2,0,0")
    }

    /// Echo an input sentence or a debug note as a `#` comment line.
    pub fn comment(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "#{text}")
    }

    /// `GVGNSP`, simple position. Latitude and longitude prefer the
    /// fix-quality record and fall back to the position/velocity one.
    pub fn position(&mut self, snap: &CycleSnapshot) -> io::Result<()> {
        let gga = &snap.fix_quality;
        let rmc = &snap.position_velocity;
        let mut line = LogLine::new(Tag::Position, snap.timestamp);
        line.decimal(gga.lat.or(rmc.lat), 5)
            .decimal(gga.lon.or(rmc.lon), 5)
            .decimal(gga.alt_msl, 1);
        line.write_to(&mut self.out)
    }

    /// `GVGNSC`, simple course. Climb rate is never available from the
    /// decoded sentences.
    pub fn course(&mut self, snap: &CycleSnapshot) -> io::Result<()> {
        let rmc = &snap.position_velocity;
        let mut line = LogLine::new(Tag::Course, snap.timestamp);
        line.decimal(rmc.speed, 2)
            .decimal(None, 2) // climb
            .decimal(rmc.course, 2);
        line.write_to(&mut self.out)
    }

    /// `GVGNSAC`, extended accuracy. Fix status and fix type are
    /// synthesized from the presence of a position, the dilution and
    /// satellite counts come from the fix-quality record.
    pub fn accuracy(&mut self, snap: &CycleSnapshot) -> io::Result<()> {
        let gga = &snap.fix_quality;
        let rmc = &snap.position_velocity;
        let mut line = LogLine::new(Tag::Accuracy, snap.timestamp);
        line.decimal(None, 1) // pdop
            .decimal(gga.hdop, 1)
            .decimal(None, 1) // vdop
            .integer(gga.sat_used, 2)
            .integer::<i64>(None, 1) // tracked satellites
            .integer::<i64>(None, 1) // visible satellites
            .decimal(None, 1) // sigma latitude
            .decimal(None, 1) // sigma longitude
            .decimal(None, 1) // sigma altitude
            // a valid position is reported as a single-frequency 3D fix
            .literal(rmc.lat.map(|_| "2"), "0")
            .literal(rmc.lat.map(|_| "0X00000001"), "0");
        line.write_to(&mut self.out)
    }

    /// `GVGNSSAT`, satellite detail burst.
    ///
    /// The satellites-in-view count of the first buffer slot drives a
    /// countdown; the 3x4 slot grid is walked in buffer-index then
    /// satellite-slot order, each slot consumes one countdown step and
    /// lines are emitted while the countdown stays non-negative. The
    /// ordinal of each line is the countdown value at emission time.
    pub fn satellites(&mut self, snap: &CycleSnapshot) -> io::Result<()> {
        let first = &snap.satellites.slots()[0];
        let mut countdown = match (first.total_sentences, first.sentence_index, first.sats_in_view)
        {
            (Some(total), Some(index), Some(in_view))
                if total > 0 && index > 0 && in_view > 0 =>
            {
                i64::from(in_view)
            }
            _ => return Ok(()),
        };
        for view in snap.satellites.slots() {
            for sat in &view.sats {
                countdown -= 1;
                if countdown < 0 {
                    return Ok(());
                }
                let mut line =
                    LogLine::with_ordinal(Tag::Satellite, snap.timestamp, countdown as u32);
                line.literal(Some("1"), "0") // system: GPS
                    .integer(sat.prn, 2)
                    .integer(sat.azimuth, 3)
                    .integer(sat.elevation, 2)
                    .integer(sat.snr, 2)
                    .literal(None, "0X00"); // status bits not supported
                line.write_to(&mut self.out)?;
            }
        }
        Ok(())
    }

    /// `GVSNSVSP`, vehicle speed taken from the fix.
    pub fn vehicle_speed(&mut self, snap: &CycleSnapshot) -> io::Result<()> {
        let mut line = LogLine::new(Tag::VehicleSpeed, snap.timestamp);
        line.decimal(snap.position_velocity.speed, 2);
        line.write_to(&mut self.out)
    }

    /// `GVSNSGYR`, gyroscope record carrying the derived yaw rate.
    /// Pitch rate, roll rate and temperature are never available.
    pub fn gyroscope(&mut self, estimate: &DeadReckoning, timestamp: u64) -> io::Result<()> {
        let mut line = LogLine::new(Tag::Gyroscope, timestamp);
        line.decimal(estimate.yaw_rate, 2)
            .decimal(None, 2) // pitch rate
            .decimal(None, 2) // roll rate
            .decimal(None, 2); // temperature
        line.write_to(&mut self.out)
    }

    /// `GVSNSWHE`, rear wheel ticks. Front wheels carry no tick sensor.
    /// The trailing wheel unit word sits outside the validity mask.
    pub fn wheel_ticks(&mut self, estimate: &DeadReckoning, timestamp: u64) -> io::Result<()> {
        let mut line = LogLine::new(Tag::WheelTicks, timestamp);
        match estimate.rear_ticks {
            Some(ticks) => {
                line.integer(Some(ticks.left), 3).integer(Some(ticks.right), 3);
                for _ in 0..6 {
                    line.integer::<i64>(None, 1);
                }
                line.outside_mask("0X0001");
            }
            None => {
                for _ in 0..8 {
                    line.integer::<i64>(None, 1);
                }
                line.outside_mask("0X0000");
            }
        }
        line.write_to(&mut self.out)
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cycle::SatelliteBuffer;
    use crate::dr::WheelTicks;
    use crate::nmea::{SatelliteInfo, SatelliteView};

    const TS: u64 = 61_066_000;

    fn snapshot() -> CycleSnapshot {
        let mut snap = CycleSnapshot::default();
        snap.timestamp = TS;
        snap
    }

    fn render<F>(write: F) -> String
    where
        F: FnOnce(&mut LogWriter<&mut Vec<u8>>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        let mut log = LogWriter::new(&mut buf);
        write(&mut log).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn full_view(index: u32, first_prn: u32) -> SatelliteView {
        let mut view = SatelliteView {
            total_sentences: Some(3),
            sentence_index: Some(index),
            sats_in_view: Some(10),
            ..Default::default()
        };
        for (slot, sat) in view.sats.iter_mut().enumerate() {
            *sat = SatelliteInfo {
                prn: Some(first_prn + slot as u32),
                elevation: Some(21),
                azimuth: Some(125),
                snr: Some(43),
            };
        }
        view
    }

    #[test]
    fn position_prefers_fix_quality_and_falls_back() {
        let mut snap = snapshot();
        snap.fix_quality.lat = Some(49.0 + 1.5940 / 60.0);
        snap.fix_quality.lon = Some(12.0 + 3.9163 / 60.0);
        snap.fix_quality.alt_msl = Some(336.7);
        assert_eq!(
            render(|log| log.position(&snap)),
            "061066000,0$GVGNSP,061066000,49.02657,12.06527,336.7,0X07\n"
        );

        let mut snap = snapshot();
        snap.position_velocity.lat = Some(49.0 + 1.5940 / 60.0);
        snap.position_velocity.lon = Some(12.0 + 3.9163 / 60.0);
        assert_eq!(
            render(|log| log.position(&snap)),
            "061066000,0$GVGNSP,061066000,49.02657,12.06527,0,0X03\n"
        );
    }

    #[test]
    fn course_marks_absent_fields_with_placeholder() {
        let mut snap = snapshot();
        snap.position_velocity.speed = Some(0.0);
        snap.position_velocity.course = Some(131.9);
        assert_eq!(
            render(|log| log.course(&snap)),
            "061066000,0$GVGNSC,061066000,0.00,0,131.90,0X05\n"
        );
        assert_eq!(
            render(|log| log.course(&snapshot())),
            "061066000,0$GVGNSC,061066000,0,0,0,0X00\n"
        );
    }

    #[test]
    fn accuracy_line_masks_synthesized_fix_fields() {
        let mut snap = snapshot();
        snap.fix_quality.hdop = Some(1.0);
        snap.fix_quality.sat_used = Some(7);
        snap.position_velocity.lat = Some(49.0);
        assert_eq!(
            render(|log| log.accuracy(&snap)),
            "061066000,0$GVGNSAC,061066000,0,1.0,0,07,0,0,0,0,0,2,0X00000001,0X60A\n"
        );
    }

    #[test]
    fn accuracy_line_without_any_fix() {
        assert_eq!(
            render(|log| log.accuracy(&snapshot())),
            "061066000,0$GVGNSAC,061066000,0,0,0,0,0,0,0,0,0,0,0,0X000\n"
        );
    }

    #[test]
    fn satellite_countdown_bounds_the_burst() {
        let mut snap = snapshot();
        let mut buffer = SatelliteBuffer::default();
        let mut first = full_view(1, 3);
        first.sats_in_view = Some(5);
        buffer.insert(first);
        buffer.insert(full_view(2, 7));
        buffer.insert(full_view(3, 11));
        snap.satellites = buffer;
        let out = render(|log| log.satellites(&snap));
        let lines: Vec<&str> = out.lines().collect();
        // sat_view = 5: exactly five lines, ordinals counting down
        assert_eq!(lines.len(), 5);
        for (line, ordinal) in lines.iter().zip([4u8, 3, 2, 1, 0]) {
            assert!(line.starts_with(&format!("061066000,{ordinal:02}$GVGNSSAT,061066000,1,")));
        }
        // the fifth entry comes from the second buffer slot
        assert_eq!(
            lines[4],
            "061066000,00$GVGNSSAT,061066000,1,07,125,21,43,0X00,0X1F"
        );
    }

    #[test]
    fn satellite_slots_without_data_still_consume_countdown() {
        let mut snap = snapshot();
        let mut buffer = SatelliteBuffer::default();
        let mut first = full_view(1, 3);
        first.sats[3] = SatelliteInfo::default();
        first.sats_in_view = Some(4);
        buffer.insert(first);
        snap.satellites = buffer;
        let out = render(|log| log.satellites(&snap));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        // the empty fourth slot prints placeholders, only the system bit set
        assert_eq!(
            lines[3],
            "061066000,00$GVGNSSAT,061066000,1,0,0,0,0,0X00,0X01"
        );
    }

    #[test]
    fn satellite_burst_needs_a_complete_first_slot() {
        let mut snap = snapshot();
        let mut buffer = SatelliteBuffer::default();
        let mut first = full_view(1, 3);
        first.sats_in_view = None;
        buffer.insert(first);
        snap.satellites = buffer;
        assert_eq!(render(|log| log.satellites(&snap)), "");
    }

    #[test]
    fn vehicle_speed_line() {
        let mut snap = snapshot();
        snap.position_velocity.speed = Some(5.144444444444445);
        assert_eq!(
            render(|log| log.vehicle_speed(&snap)),
            "061066000,0$GVSNSVSP,061066000,5.14,0X01\n"
        );
    }

    #[test]
    fn gyroscope_line() {
        let est = DeadReckoning {
            yaw_rate: Some(-20.0),
            ..Default::default()
        };
        assert_eq!(
            render(|log| log.gyroscope(&est, TS)),
            "061066000,0$GVSNSGYR,061066000,-20.00,0,0,0,0X01\n"
        );
        assert_eq!(
            render(|log| log.gyroscope(&DeadReckoning::default(), TS)),
            "061066000,0$GVSNSGYR,061066000,0,0,0,0,0X00\n"
        );
    }

    #[test]
    fn wheel_tick_line_layout_is_fixed() {
        let est = DeadReckoning {
            rear_ticks: Some(WheelTicks { left: 40, right: 159 }),
            ..Default::default()
        };
        assert_eq!(
            render(|log| log.wheel_ticks(&est, TS)),
            "061066000,0$GVSNSWHE,061066000,040,159,0,0,0,0,0,0,0X0001,0X03\n"
        );
        assert_eq!(
            render(|log| log.wheel_ticks(&DeadReckoning::default(), TS)),
            "061066000,0$GVSNSWHE,061066000,0,0,0,0,0,0,0,0,0X0000,0X00\n"
        );
    }

    #[test]
    fn header_names_both_sub_streams() {
        let out = render(|log| {
            log.header("drive.nmea", ReceiverProfile::Geko301, Some(&VehicleGeometry::default()))
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "#Original NMEA file: drive.nmea");
        assert_eq!(lines[2], "#Receiver type: geko301");
        assert_eq!(lines[3], "#Rear track width: 1.525m");
        assert_eq!(lines[lines.len() - 2], "0,0$GVGNSVER,2,0,0");
        assert_eq!(lines[lines.len() - 1], "0,0$GVSNSVER,2,0,0");
    }

    #[test]
    fn header_omits_geometry_without_sensor_derivation() {
        let out = render(|log| log.header("drive.nmea", ReceiverProfile::Z205, None));
        assert!(!out.contains("track width"));
        assert_eq!(out.lines().count(), 5);
    }
}
