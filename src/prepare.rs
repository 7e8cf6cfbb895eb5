//! Conversion of the raw Porto taxi export (one GPS polyline per trip,
//! sampled every 15 seconds) into the flat feature table used for prediction.

use std::fmt;
use std::io;

use chrono::{DateTime, Datelike, Duration, Timelike};
use csv::{Reader, ReaderBuilder, Writer};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{PredictError, Result};
use crate::geo::{geodir, geodist, LonLat};

/// Minutes between two polyline samples.
pub const SAMPLE_MINUTES: f64 = 0.25;

/// Waypoint positions written as features: start, 2, 5 and 10 minutes.
const SNAPSHOT_SAMPLES: [usize; 4] = [0, 8, 20, 40];

const HOLIDAYS: [u32; 18] = [
    20130101, 20130329, 20130331, 20130425, 20130501, 20130610, 20130815, 20131208, 20131225,
    20140101, 20140418, 20140420, 20140425, 20140501, 20140610, 20140815, 20141208, 20141225,
];

pub const HEADER: [&str; 24] = [
    "TRIP_ID",
    "CALL_TYPE",
    "ORIGIN_CALL",
    "ORIGIN_STAND",
    "TAXI_ID",
    "TIMESTAMP",
    "DAY_TYPE",
    "WEEK_DAY",
    "DAY_BUSY",
    "DAY_HOUR",
    "MISSING_DATA",
    "DRIVE_DIST",
    "TRIP_DIST",
    "TRIP_TIME",
    "LON_START",
    "LAT_START",
    "LON_02",
    "LAT_02",
    "LON_05",
    "LAT_05",
    "LON_10",
    "LAT_10",
    "LON_FINISH",
    "LAT_FINISH",
];

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Waypoint {
    pub point: LonLat,
    /// Meters from the previous waypoint; 0 for the first one.
    pub distance: f64,
    /// Heading from the previous waypoint (see [`geodir`]).
    pub heading: f64,
}

/// Parses `[[lon,lat],[lon,lat],...]`. Pairs that do not parse become (0, 0)
/// and the returned flag is set. A waypoint following a (0, 0) point has no
/// distance or heading.
pub fn parse_waypoints(text: &str) -> (Vec<Waypoint>, bool) {
    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return (Vec::new(), false);
    }

    let mut malformed = false;
    let mut last: Option<LonLat> = None;
    let mut waypoints = Vec::new();
    for pair in inner.split("],[") {
        let parsed = pair.split_once(',').and_then(|(lon, lat)| {
            Some(LonLat::new(lon.trim().parse().ok()?, lat.trim().parse().ok()?))
        });
        let point = parsed.unwrap_or_else(|| {
            malformed = true;
            LonLat::new(0.0, 0.0)
        });
        let waypoint = match last {
            Some(prev) if prev.lon != 0.0 && prev.lat != 0.0 => Waypoint {
                point,
                distance: geodist(point, prev),
                heading: geodir(prev, point),
            },
            _ => Waypoint {
                point,
                distance: 0.0,
                heading: 0.0,
            },
        };
        last = Some(point);
        waypoints.push(waypoint);
    }
    (waypoints, malformed)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DayKind {
    Workday,
    Weekend,
    Holiday,
}

impl fmt::Display for DayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DayKind::Workday => "WD",
            DayKind::Weekend => "WE",
            DayKind::Holiday => "HOL",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeInfo {
    /// YYYYMMDD of the service day.
    pub date: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub weekday: u32,
    pub day_kind: DayKind,
    /// Hours since midnight of the service day, in [4, 28).
    pub day_hour: f64,
}

/// Decodes a Unix timestamp (UTC). Hours before 4 AM count as the late end
/// of the previous day, so 01:30 on the 4th is hour 25.5 of the 3rd.
pub fn decode_timestamp(secs: i64) -> Option<TimeInfo> {
    let mut when = DateTime::from_timestamp(secs, 0)?;
    let mut day_hour =
        when.hour() as f64 + when.minute() as f64 / 60.0 + when.second() as f64 / 3600.0;
    if day_hour < 4.0 {
        day_hour += 24.0;
        when -= Duration::hours(24);
    }

    let date = when.year() as u32 * 10000 + when.month() * 100 + when.day();
    let weekday = when.weekday().num_days_from_sunday();
    let day_kind = if weekday == 0 || weekday == 6 {
        DayKind::Weekend
    } else if HOLIDAYS.contains(&date) {
        DayKind::Holiday
    } else {
        DayKind::Workday
    };
    Some(TimeInfo {
        date,
        weekday,
        day_kind,
        day_hour,
    })
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TripMetrics {
    /// Meters driven along the polyline.
    pub drive_dist: f64,
    /// Straight-line meters from first to last waypoint.
    pub trip_dist: f64,
    /// Minutes.
    pub trip_time: f64,
}

impl TripMetrics {
    pub fn of(waypoints: &[Waypoint]) -> Self {
        let (first, last) = match (waypoints.first(), waypoints.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Self::default(),
        };
        Self {
            drive_dist: waypoints.iter().map(|w| w.distance).sum(),
            trip_dist: geodist(first.point, last.point),
            trip_time: SAMPLE_MINUTES * (waypoints.len() - 1) as f64,
        }
    }

    /// Average driving speed in km/h.
    pub fn average_speed(&self) -> f64 {
        if self.trip_time == 0.0 {
            0.0
        } else {
            self.drive_dist / 1000.0 / (self.trip_time / 60.0)
        }
    }
}

/// Why a trip is left out of the prepared table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Excuse {
    /// Less than 30 seconds.
    TooShortTime,
    /// Less than 30 meters from start to finish.
    TooShortDistance,
    /// Averaged under 5 km/h.
    TooSlow,
    /// Over 625 m in one 15 s sample (150 km/h).
    TooFast,
}

impl Excuse {
    pub const ALL: [Excuse; 4] = [
        Excuse::TooShortTime,
        Excuse::TooShortDistance,
        Excuse::TooSlow,
        Excuse::TooFast,
    ];

    pub fn classify(metrics: &TripMetrics, waypoints: &[Waypoint]) -> Option<Excuse> {
        if metrics.trip_time < 0.5 {
            Some(Excuse::TooShortTime)
        } else if metrics.trip_dist < 30.0 {
            Some(Excuse::TooShortDistance)
        } else if metrics.average_speed() < 5.0 {
            Some(Excuse::TooSlow)
        } else if waypoints.iter().any(|w| w.distance > 625.0) {
            Some(Excuse::TooFast)
        } else {
            None
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Excuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Excuse::TooShortTime => "trip less than 30 seconds",
            Excuse::TooShortDistance => "trip less than 30 metres",
            Excuse::TooSlow => "taxi averaged under 5 km/h",
            Excuse::TooFast => "taxi exceeded 150 km/h",
        })
    }
}

#[derive(Copy, Clone, Debug)]
pub struct PrepareOptions {
    /// Stop after this many sampled trips; 0 reads everything. Trips
    /// rejected as outliers count toward the limit.
    pub limit: usize,
    /// Keep every `sample`-th trip.
    pub sample: usize,
    /// Write trips that fail the outlier checks instead of dropping them.
    pub keep_outliers: bool,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            limit: 0,
            sample: 1,
            keep_outliers: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrepareStats {
    pub read: usize,
    pub accepted: usize,
    pub written: usize,
    rejected: [usize; 4],
}

impl PrepareStats {
    pub fn rejected(&self, excuse: Excuse) -> usize {
        self.rejected[excuse.slot()]
    }
}

#[derive(Debug, Deserialize)]
struct RawTrip {
    #[serde(rename = "TRIP_ID")]
    trip_id: String,
    #[serde(rename = "CALL_TYPE")]
    call_type: String,
    #[serde(rename = "ORIGIN_CALL")]
    origin_call: String,
    #[serde(rename = "ORIGIN_STAND")]
    origin_stand: String,
    #[serde(rename = "TAXI_ID")]
    taxi_id: String,
    #[serde(rename = "TIMESTAMP")]
    timestamp: String,
    #[serde(rename = "DAY_TYPE")]
    day_type: String,
    #[serde(rename = "MISSING_DATA", default)]
    missing_data: String,
    #[serde(rename = "POLYLINE")]
    polyline: String,
}

fn coordinate_pair(waypoints: &[Waypoint], idx: Option<usize>) -> [String; 2] {
    match idx.and_then(|i| waypoints.get(i)) {
        Some(w) => [format!("{:.6}", w.point.lon), format!("{:.6}", w.point.lat)],
        None => [String::new(), String::new()],
    }
}

/// Every `sample`-th raw trip with its row number, at most `limit` of them.
fn sampled_trips<'a, R: io::Read + 'a>(
    rdr: &'a mut Reader<R>,
    options: PrepareOptions,
) -> impl Iterator<Item = (usize, csv::Result<RawTrip>)> + 'a {
    let sample = options.sample.max(1);
    let limit = if options.limit == 0 {
        usize::MAX
    } else {
        options.limit
    };
    rdr.deserialize::<RawTrip>()
        .enumerate()
        .filter(move |(row, _)| row % sample == 0)
        .take(limit)
}

fn missing_flag(waypoints: &[Waypoint], raw: &RawTrip) -> &'static str {
    if waypoints.is_empty() || raw.missing_data.starts_with('T') {
        "True"
    } else {
        "False"
    }
}

/// Reads the raw export from `reader` and writes the prepared table to
/// `writer`.
pub fn prepare<R: io::Read, W: io::Write>(
    reader: R,
    writer: W,
    options: &PrepareOptions,
) -> Result<PrepareStats> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    let mut stats = PrepareStats::default();
    for (row, result) in sampled_trips(&mut rdr, *options) {
        let raw = result?;
        stats.read += 1;

        let (waypoints, malformed) = parse_waypoints(&raw.polyline);
        if malformed {
            warn!(trip_id = %raw.trip_id, "unparseable waypoints replaced by (0, 0)");
        }
        let metrics = TripMetrics::of(&waypoints);
        match Excuse::classify(&metrics, &waypoints) {
            Some(excuse) => {
                stats.rejected[excuse.slot()] += 1;
                if !options.keep_outliers {
                    continue;
                }
            }
            None => stats.accepted += 1,
        }

        let secs: i64 = raw.timestamp.trim().parse().map_err(|_| PredictError::Parse {
            row,
            column: "TIMESTAMP".to_string(),
            value: raw.timestamp.clone(),
        })?;
        let time = decode_timestamp(secs).ok_or_else(|| PredictError::Parse {
            row,
            column: "TIMESTAMP".to_string(),
            value: raw.timestamp.clone(),
        })?;
        let missing = missing_flag(&waypoints, &raw);

        let mut record = vec![
            raw.trip_id,
            raw.call_type,
            raw.origin_call,
            raw.origin_stand,
            raw.taxi_id,
            raw.timestamp,
            raw.day_type,
            time.weekday.to_string(),
            time.day_kind.to_string(),
            format!("{:.3}", time.day_hour),
            missing.to_string(),
            format!("{:.0}", metrics.drive_dist),
            format!("{:.0}", metrics.trip_dist),
            format!("{:.2}", metrics.trip_time),
        ];
        for idx in SNAPSHOT_SAMPLES {
            record.extend(coordinate_pair(&waypoints, Some(idx)));
        }
        record.extend(coordinate_pair(&waypoints, waypoints.len().checked_sub(1)));
        wtr.write_record(&record)?;
        stats.written += 1;
    }
    wtr.flush()?;

    info!(
        read = stats.read,
        accepted = stats.accepted,
        written = stats.written,
        "prepared trips"
    );
    for excuse in Excuse::ALL {
        info!(count = stats.rejected(excuse), reason = %excuse, "rejected");
    }
    Ok(stats)
}

pub const SUMMARY_HEADER: [&str; 11] = [
    "TRIP_ID",
    "CALL_TYPE",
    "ORIGIN_CALL",
    "ORIGIN_STAND",
    "TAXI_ID",
    "TIMESTAMP",
    "DAY_TYPE",
    "MISSING_DATA",
    "DRIVE_DIST",
    "TRIP_DIST",
    "TRIP_TIME",
];

/// Writes one line per sampled trip with the polyline replaced by drive
/// distance and trip distance (km) and trip time (minutes). No trip is
/// rejected. Returns the number of trips written.
pub fn summarize<R: io::Read, W: io::Write>(
    reader: R,
    writer: W,
    options: &PrepareOptions,
) -> Result<usize> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(SUMMARY_HEADER)?;

    let mut written = 0;
    for (_, result) in sampled_trips(&mut rdr, *options) {
        let raw = result?;
        let (waypoints, _) = parse_waypoints(&raw.polyline);
        let metrics = TripMetrics::of(&waypoints);
        let record: [&str; 11] = [
            &raw.trip_id,
            &raw.call_type,
            &raw.origin_call,
            &raw.origin_stand,
            &raw.taxi_id,
            &raw.timestamp,
            &raw.day_type,
            missing_flag(&waypoints, &raw),
            &format!("{:.3}", metrics.drive_dist / 1000.0),
            &format!("{:.3}", metrics.trip_dist / 1000.0),
            &format!("{:.2}", metrics.trip_time),
        ];
        wtr.write_record(record)?;
        written += 1;
    }
    wtr.flush()?;
    info!(written, "summarized trips");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_polyline() {
        let (w, malformed) = parse_waypoints("[[-8.61,41.14],[-8.6105,41.1405],[-8.611,41.141]]");
        assert!(!malformed);
        assert_eq!(w.len(), 3);
        assert_eq!(w[0].point, LonLat::new(-8.61, 41.14));
        assert_eq!(w[0].distance, 0.0);
        assert!(w[1].distance > 50.0 && w[1].distance < 80.0);
        // moving north-west
        assert!(w[1].heading > 90.0 && w[1].heading < 180.0);
    }

    #[test]
    fn empty_and_malformed_polylines() {
        assert_eq!(parse_waypoints("[]"), (Vec::new(), false));
        let (w, malformed) = parse_waypoints("[[-8.61,41.14],[oops],[-8.6,41.15]]");
        assert!(malformed);
        assert_eq!(w[1].point, LonLat::new(0.0, 0.0));
        assert_eq!(w[2].distance, 0.0);
    }

    #[test]
    fn early_morning_belongs_to_previous_day() {
        // 2014-01-04 01:30:00 UTC, a Saturday
        let t = decode_timestamp(1388799000).unwrap();
        assert_eq!(t.date, 20140103);
        assert!((t.day_hour - 25.5).abs() < 1e-9);
        assert_eq!(t.weekday, 5);
        assert_eq!(t.day_kind, DayKind::Workday);
    }

    #[test]
    fn day_kinds() {
        // 2013-12-25 12:00:00 UTC, a Wednesday
        let t = decode_timestamp(1387972800).unwrap();
        assert_eq!(t.date, 20131225);
        assert_eq!(t.day_kind, DayKind::Holiday);
        // 2013-12-29 12:00:00 UTC, a Sunday
        let t = decode_timestamp(1388318400).unwrap();
        assert_eq!(t.weekday, 0);
        assert_eq!(t.day_kind, DayKind::Weekend);
        assert_eq!(t.day_kind.to_string(), "WE");
    }

    fn waypoints_every(n: usize, step_deg: f64) -> Vec<Waypoint> {
        let text = (0..n)
            .map(|i| format!("[-8.6,{}]", 41.1 + i as f64 * step_deg))
            .collect::<Vec<_>>()
            .join(",");
        parse_waypoints(&format!("[{}]", text)).0
    }

    #[test]
    fn outlier_rules() {
        let short = waypoints_every(2, 0.001);
        assert_eq!(
            Excuse::classify(&TripMetrics::of(&short), &short),
            Some(Excuse::TooShortTime)
        );
        let parked = waypoints_every(10, 0.00001);
        assert_eq!(
            Excuse::classify(&TripMetrics::of(&parked), &parked),
            Some(Excuse::TooShortDistance)
        );
        let slow = waypoints_every(200, 0.000005);
        let m = TripMetrics::of(&slow);
        assert!(m.trip_dist >= 30.0);
        assert_eq!(Excuse::classify(&m, &slow), Some(Excuse::TooSlow));
        // 0.01 deg latitude is about 1.1 km per sample
        let fast = waypoints_every(10, 0.01);
        assert_eq!(
            Excuse::classify(&TripMetrics::of(&fast), &fast),
            Some(Excuse::TooFast)
        );
        // about 111 m per sample, 27 km/h
        let fine = waypoints_every(50, 0.001);
        assert_eq!(Excuse::classify(&TripMetrics::of(&fine), &fine), None);
    }

    #[test]
    fn prepares_table() {
        let fine: Vec<String> = (0..50)
            .map(|i| format!("[-8.6,{:.3}]", 41.1 + i as f64 * 0.001))
            .collect();
        let input = format!(
            "TRIP_ID,CALL_TYPE,ORIGIN_CALL,ORIGIN_STAND,TAXI_ID,TIMESTAMP,DAY_TYPE,MISSING_DATA,POLYLINE\n\
             1,C,,,20000589,1387972800,A,False,\"[{}]\"\n\
             2,B,,7,20000596,1387972800,A,False,\"[[-8.6,41.1]]\"\n",
            fine.join(",")
        );
        let mut out = Vec::new();
        let stats = prepare(input.as_bytes(), &mut out, &PrepareOptions::default()).unwrap();
        assert_eq!(stats.read, 2);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.written, 1);
        assert_eq!(stats.rejected(Excuse::TooShortTime), 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), HEADER.join(","));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(row[0], "1");
        assert_eq!(row[8], "HOL");
        assert_eq!(row[9], "12.000");
        assert_eq!(row[14], "-8.600000");
        assert_eq!(row[15], "41.100000");
        assert_eq!(row[21], "41.140000");
        assert_eq!(row[23], "41.149000");
        assert!(lines.next().is_none());
    }

    fn raw_csv(trips: &[(&str, &str)]) -> String {
        let mut csv = String::from(
            "TRIP_ID,CALL_TYPE,ORIGIN_CALL,ORIGIN_STAND,TAXI_ID,TIMESTAMP,DAY_TYPE,MISSING_DATA,POLYLINE\n",
        );
        for (id, polyline) in trips {
            csv.push_str(&format!("{id},C,,,20000589,1387972800,A,False,\"{polyline}\"\n"));
        }
        csv
    }

    fn fine_polyline() -> String {
        let points: Vec<String> = (0..50)
            .map(|i| format!("[-8.6,{:.3}]", 41.1 + i as f64 * 0.001))
            .collect();
        format!("[{}]", points.join(","))
    }

    fn written_ids(out: Vec<u8>) -> Vec<String> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn sample_limit_and_outliers() {
        let fine = fine_polyline();
        let input = raw_csv(&[
            ("a", "[[-8.6,41.1]]"),
            ("b", fine.as_str()),
            ("c", fine.as_str()),
            ("d", fine.as_str()),
            ("e", "[[-8.6,41.1]]"),
        ]);

        // every second trip: a, c, e
        let options = PrepareOptions {
            sample: 2,
            ..PrepareOptions::default()
        };
        let mut out = Vec::new();
        let stats = prepare(input.as_bytes(), &mut out, &options).unwrap();
        assert_eq!(stats.read, 3);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected(Excuse::TooShortTime), 2);
        assert_eq!(written_ids(out), vec!["c"]);

        // the rejected trip a uses up the limit
        let options = PrepareOptions {
            sample: 2,
            limit: 1,
            keep_outliers: false,
        };
        let mut out = Vec::new();
        let stats = prepare(input.as_bytes(), &mut out, &options).unwrap();
        assert_eq!((stats.read, stats.written), (1, 0));
        assert!(written_ids(out).is_empty());

        let options = PrepareOptions {
            sample: 2,
            limit: 2,
            keep_outliers: true,
        };
        let mut out = Vec::new();
        let stats = prepare(input.as_bytes(), &mut out, &options).unwrap();
        assert_eq!((stats.read, stats.accepted, stats.written), (2, 1, 2));
        assert_eq!(written_ids(out), vec!["a", "c"]);
    }

    #[test]
    fn summary_keeps_every_sampled_trip() {
        let input = raw_csv(&[("a", fine_polyline().as_str()), ("b", "[]"), ("c", "[[-8.6,41.1]]")]);
        let mut out = Vec::new();
        let written = summarize(input.as_bytes(), &mut out, &PrepareOptions::default()).unwrap();
        assert_eq!(written, 3);

        let text = String::from_utf8(out).unwrap();
        let rows: Vec<Vec<&str>> = text.lines().map(|l| l.split(',').collect()).collect();
        assert_eq!(rows[0], SUMMARY_HEADER);
        // 49 hops of 0.001 deg latitude
        assert_eq!(rows[1][7], "False");
        let drive_km: f64 = rows[1][8].parse().unwrap();
        assert!((drive_km - 5.4486).abs() < 0.001);
        assert_eq!(rows[1][10], "12.25");
        assert_eq!(rows[2][7], "True");
        assert_eq!(rows[2][8], "0.000");
        assert_eq!(rows[3][10], "0.00");
    }
}
