//! NMEA 0183 sentence framing, checksum validation and decoding.
//!
//! Only the three sentence kinds carrying data for the positioning log
//! are decoded (`GPRMC`, `GPGGA`, `GPGSV`), plus the `GPRTE` route
//! sentence which some receivers emit as the last sentence of an update
//! burst. Everything else decodes to [`Sentence::Ignored`].

use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Conversion factor from knots to m/s.
pub const KNOTS_TO_MPS: f64 = 1.852 / 3.6;

/// Error raised by sentence framing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceError {
    /// The XOR over the payload bytes does not match the trailing
    /// two-hex-digit checksum.
    #[error("checksum mismatch: computed {computed:02X}, sentence carries {stated:02X}")]
    ChecksumMismatch {
        /// XOR over the bytes between `$` and `*`.
        computed: u8,
        /// Value parsed from the two hex digits after `*`.
        stated: u8,
    },
}

lazy_static! {
    static ref FRAME: Regex = Regex::new(r"^\$(?P<payload>[^*]*)\*(?P<cksum>[0-9A-Fa-f]{2})$")
        .expect("Failed to compile regex");
}

/// A framed sentence, split into its comma-separated payload fields.
///
/// The leading `$` and the trailing checksum are stripped during
/// framing, so the checksum can never be mistaken for a data field.
#[derive(Debug, Clone)]
pub struct RawSentence<'a> {
    fields: Vec<&'a str>,
}

impl<'a> RawSentence<'a> {
    /// Frame and checksum-verify one input line.
    ///
    /// Returns `Ok(None)` for lines that do not look like a sentence at
    /// all (comments, passthrough noise) and an error only for a framed
    /// sentence whose checksum does not verify.
    pub fn frame(line: &'a str) -> Result<Option<Self>, SentenceError> {
        let caps = match FRAME.captures(line) {
            Some(caps) => caps,
            None => return Ok(None),
        };
        let payload = caps.name("payload").map(|m| m.as_str()).unwrap_or("");
        let computed = payload.bytes().fold(0u8, |acc, b| acc ^ b);
        if let Ok(stated) = u8::from_str_radix(&caps["cksum"], 16) {
            if computed != stated {
                return Err(SentenceError::ChecksumMismatch { computed, stated });
            }
        }
        Ok(Some(Self {
            fields: payload.split(',').collect(),
        }))
    }

    /// The sentence type tag, e.g. `GPRMC`.
    pub fn tag(&self) -> &str {
        self.fields.first().copied().unwrap_or("")
    }

    /// Decode into a typed record. Sentences below the minimum field
    /// count for their tag are ignored, as are unknown tags.
    pub fn decode(&self) -> Sentence {
        match self.tag() {
            "GPRMC" if self.fields.len() >= 12 => Sentence::PositionVelocity(self.decode_rmc()),
            "GPGGA" if self.fields.len() >= 14 => Sentence::FixQuality(self.decode_gga()),
            "GPGSV" if self.fields.len() >= 4 => Sentence::SatelliteView(self.decode_gsv()),
            "GPRTE" => Sentence::Route,
            _ => Sentence::Ignored,
        }
    }

    /// Field by index, with empty fields mapped to `None`.
    fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).copied().filter(|f| !f.is_empty())
    }

    fn num<T: std::str::FromStr>(&self, idx: usize) -> Option<T> {
        self.field(idx).and_then(|f| f.parse().ok())
    }

    fn decode_rmc(&self) -> PositionVelocity {
        let mut ret = PositionVelocity::default();
        // The status field gates the whole record: anything but an
        // active fix decodes to all-absent.
        if !self.field(2).is_some_and(|s| s.eq_ignore_ascii_case("A")) {
            return ret;
        }
        ret.time = self.field(1).and_then(parse_time);
        ret.lat = hemisphere(self.field(3).and_then(|s| parse_angle(s, 2)), self.field(4), "S");
        ret.lon = hemisphere(self.field(5).and_then(|s| parse_angle(s, 3)), self.field(6), "W");
        ret.speed = self.num::<f64>(7).map(|knots| knots * KNOTS_TO_MPS);
        ret.course = self.num(8);
        ret.date = self.field(9).and_then(parse_date);
        ret
    }

    fn decode_gga(&self) -> FixQuality {
        let mut ret = FixQuality::default();
        // Only GPS (1) and DGPS (2) fixes are trusted.
        let quality = self.num::<u8>(6);
        if !matches!(quality, Some(1) | Some(2)) {
            return ret;
        }
        ret.quality = quality;
        ret.time = self.field(1).and_then(parse_time);
        ret.lat = hemisphere(self.field(2).and_then(|s| parse_angle(s, 2)), self.field(3), "S");
        ret.lon = hemisphere(self.field(4).and_then(|s| parse_angle(s, 3)), self.field(5), "W");
        ret.sat_used = self.num(7);
        ret.hdop = self.num(8);
        ret.alt_msl = self.num(9);
        ret.geoid_sep = self.num(11);
        ret
    }

    fn decode_gsv(&self) -> SatelliteView {
        let mut ret = SatelliteView {
            total_sentences: self.num(1),
            sentence_index: self.num(2),
            sats_in_view: self.num(3),
            sats: Default::default(),
        };
        for (slot, sat) in ret.sats.iter_mut().enumerate() {
            let base = 4 + 4 * slot;
            // A slot is read only when the sentence is long enough to
            // hold all four of its fields; a short sentence leaves this
            // slot and all further slots absent.
            if self.fields.len() < base + 4 {
                break;
            }
            sat.prn = self.num(base);
            sat.elevation = self.num(base + 1);
            sat.azimuth = self.num(base + 2);
            sat.snr = self.num(base + 3);
        }
        ret
    }
}

/// One decoded sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    /// `GPRMC`: position, time and velocity.
    PositionVelocity(PositionVelocity),
    /// `GPGGA`: position and fix quality.
    FixQuality(FixQuality),
    /// `GPGSV`: one of up to three satellites-in-view sentences.
    SatelliteView(SatelliteView),
    /// `GPRTE`: route sentence, carries no data here but closes the
    /// update cycle on some receivers.
    Route,
    /// Unknown tag or too few fields.
    Ignored,
}

/// Content of an active `GPRMC` sentence. Every field is independently
/// optional; a void status yields an all-absent record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionVelocity {
    /// UTC date; two-digit years are windowed into 20xx.
    pub date: Option<NaiveDate>,
    /// UTC time of day.
    pub time: Option<NaiveTime>,
    /// Latitude in decimal degrees, south negative.
    pub lat: Option<f64>,
    /// Longitude in decimal degrees, west negative.
    pub lon: Option<f64>,
    /// Ground speed in m/s.
    pub speed: Option<f64>,
    /// Course over ground in degrees, clockwise from true north.
    pub course: Option<f64>,
}

/// Content of a `GPGGA` sentence with a GPS or DGPS quality code.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FixQuality {
    /// UTC time of day.
    pub time: Option<NaiveTime>,
    /// Latitude in decimal degrees, south negative.
    pub lat: Option<f64>,
    /// Longitude in decimal degrees, west negative.
    pub lon: Option<f64>,
    /// Fix quality code (1 = GPS, 2 = DGPS).
    pub quality: Option<u8>,
    /// Number of satellites used for the fix.
    pub sat_used: Option<u32>,
    /// Horizontal dilution of precision.
    pub hdop: Option<f64>,
    /// Altitude above mean sea level in m.
    pub alt_msl: Option<f64>,
    /// Geoid separation in m.
    pub geoid_sep: Option<f64>,
}

/// One satellite slot of a `GPGSV` sentence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SatelliteInfo {
    /// Satellite PRN number.
    pub prn: Option<u32>,
    /// Elevation in degrees.
    pub elevation: Option<i32>,
    /// Azimuth in degrees.
    pub azimuth: Option<u32>,
    /// Signal to noise ratio in dB.
    pub snr: Option<u32>,
}

/// Content of one `GPGSV` sentence: its position in the multi-sentence
/// report and up to four satellite slots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SatelliteView {
    /// Total number of sentences in this report.
    pub total_sentences: Option<u32>,
    /// One-based index of this sentence within the report.
    pub sentence_index: Option<u32>,
    /// Satellites in view for the whole report.
    pub sats_in_view: Option<u32>,
    /// Up to four satellites described by this sentence.
    pub sats: [SatelliteInfo; 4],
}

/// Decode `hhmmss[.sss]`; fractional seconds are dropped.
fn parse_time(s: &str) -> Option<NaiveTime> {
    if s.len() < 6 || !s.is_char_boundary(6) {
        return None;
    }
    let hour = s[0..2].parse().ok()?;
    let minute = s[2..4].parse().ok()?;
    let second = s[4..6].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Decode `ddmmyy` with the two-digit year windowed into 20xx.
fn parse_date(s: &str) -> Option<NaiveDate> {
    if s.len() != 6 {
        return None;
    }
    let day = s[0..2].parse().ok()?;
    let month = s[2..4].parse().ok()?;
    let year: i32 = s[4..6].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

/// Decode a degrees-minutes angle (`DDMM.MMMM`, longitude `DDDMM.MMMM`)
/// into decimal degrees.
fn parse_angle(s: &str, deg_digits: usize) -> Option<f64> {
    if s.len() < 4 {
        return None;
    }
    let deg: f64 = s.get(..deg_digits)?.parse().ok()?;
    let min: f64 = s.get(deg_digits..)?.parse().ok()?;
    Some(deg + min / 60.0)
}

/// Negate `value` when the hemisphere letter matches `negative`
/// (case-insensitive).
fn hemisphere(value: Option<f64>, dir: Option<&str>, negative: &str) -> Option<f64> {
    value.map(|v| {
        if dir.is_some_and(|d| d.eq_ignore_ascii_case(negative)) {
            -v
        } else {
            v
        }
    })
}
