//! Human-readable dump of raw taxi trips: one labelled line per field, the
//! polyline expanded into timed waypoints with compass heading and a speed
//! arrow.

use std::io::{self, Write};

use chrono::DateTime;
use csv::ReaderBuilder;

use crate::error::Result;
use crate::geo::compass_name;
use crate::prepare::{parse_waypoints, TripMetrics, Waypoint, SAMPLE_MINUTES};

/// Longest speed arrow, in `=` characters (one per 50 m hop).
const MAX_ARROW: usize = 30;

#[derive(Copy, Clone, Debug)]
pub struct IllumeOptions {
    /// Show this many trips starting at `start`. 0 shows trips 0, 1, 2, 3,
    /// 4, 6, 8, 12, 16, 24, ... from the whole file.
    pub limit: usize,
    pub start: usize,
}

impl Default for IllumeOptions {
    fn default() -> Self {
        Self { limit: 10, start: 0 }
    }
}

/// True for 0, powers of two and 1.5 times a power of two.
pub fn is_interesting(n: usize) -> bool {
    let rest = n & n.wrapping_sub(1);
    rest == 0 || (rest & rest.wrapping_sub(1) == 0 && n & (n >> 1) != 0)
}

/// Plain-language note for coded fields.
pub fn annotate(label: &str, atom: &str) -> Option<String> {
    let note = match (label, atom) {
        (_, "") => return None,
        ("CALL_TYPE", "A") => "central dispatch",
        ("CALL_TYPE", "B") => "taxi stand",
        ("CALL_TYPE", "C") => "street hail",
        ("DAY_TYPE", "A") => "normal day",
        ("DAY_TYPE", "B") => "holiday",
        ("DAY_TYPE", "C") => "day before holiday",
        ("CALL_TYPE" | "DAY_TYPE", _) => "-",
        ("TIMESTAMP", _) => {
            let secs: i64 = atom.parse().ok()?;
            let when = DateTime::from_timestamp(secs, 0)?;
            return Some(when.format("%b-%d %H:%M:%S").to_string());
        }
        _ => return None,
    };
    Some(note.to_string())
}

/// `<===` for westward hops, `===>` for eastward, one `=` per 50 m.
pub fn speed_arrow(waypoint: &Waypoint) -> String {
    let shaft = "=".repeat(((waypoint.distance / 50.0).round() as usize).min(MAX_ARROW));
    if waypoint.heading > -90.0 && waypoint.heading <= 90.0 {
        format!("{shaft}>")
    } else {
        format!("<{shaft}")
    }
}

pub fn write_waypoints<W: Write>(out: &mut W, waypoints: &[Waypoint], indent: usize) -> io::Result<()> {
    let prefix = " ".repeat(indent);
    for (i, w) in waypoints.iter().enumerate() {
        let minutes = i as f64 * SAMPLE_MINUTES;
        if w.distance != 0.0 {
            writeln!(
                out,
                "{prefix}{minutes:5.2}: {:.6}, {:.6}, {:4.0}m, {:4.0}°  {:>2}{}",
                w.point.lon,
                w.point.lat,
                w.distance,
                w.heading,
                compass_name(w.heading),
                speed_arrow(w)
            )?;
        } else {
            writeln!(
                out,
                "{prefix}{minutes:5.2}: {:.6}, {:.6}, {:4.0}m,    -",
                w.point.lon, w.point.lat, w.distance
            )?;
        }
    }
    Ok(())
}

fn write_metrics<W: Write>(out: &mut W, waypoints: &[Waypoint], width: usize) -> io::Result<()> {
    let metrics = TripMetrics::of(waypoints);
    let trip_speed = if metrics.trip_time == 0.0 {
        0.0
    } else {
        metrics.trip_dist / 1000.0 / (metrics.trip_time / 60.0)
    };
    writeln!(out, "{:>width$}: {:6.3} km", "ROUTE_LEN", metrics.drive_dist / 1000.0)?;
    writeln!(out, "{:>width$}: {:6.3} km", "TRIP_LEN", metrics.trip_dist / 1000.0)?;
    writeln!(out, "{:>width$}: {:5.2} min", "TRIP_TIME", metrics.trip_time)?;
    writeln!(out, "{:>width$}: {:4.1} km/h", "AVG_SPEED", metrics.average_speed())?;
    writeln!(out, "{:>width$}: {:4.1} km/h", "TRIP_SPEED", trip_speed)
}

/// Writes the selected trips of a raw export to `out`. Returns the number of
/// trips scanned.
pub fn illume<R: io::Read, W: Write>(reader: R, mut out: W, options: &IllumeOptions) -> Result<usize> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let mut labels: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let width = labels.iter().map(String::len).max().unwrap_or(0).max(3);
    let finish = options.start + options.limit;

    let mut count = 0;
    for result in rdr.records() {
        let record = result?;
        let shown = if options.limit == 0 {
            is_interesting(count)
        } else {
            count >= options.start && count < finish
        };
        if shown {
            writeln!(out, "__{}{}", count, "_".repeat(width))?;
            while labels.len() < record.len() {
                labels.push((labels.len() + 1).to_string());
            }
            for (label, atom) in labels.iter().zip(record.iter()) {
                if label == "POLYLINE" {
                    let (waypoints, _) = parse_waypoints(atom);
                    writeln!(out, "{label:>width$}:")?;
                    write_waypoints(&mut out, &waypoints, width)?;
                    write_metrics(&mut out, &waypoints, width)?;
                } else {
                    match annotate(label, atom) {
                        Some(note) => writeln!(out, "{label:>width$}: {atom}  ({note})")?,
                        None => writeln!(out, "{label:>width$}: {atom}")?,
                    }
                }
            }
            writeln!(out)?;
        }
        count += 1;
        if options.limit != 0 && count >= finish {
            break;
        }
    }
    if count > 0 {
        writeln!(out, "{}", "_".repeat(width + 2))?;
    }
    out.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LonLat;

    #[test]
    fn interesting_numbers() {
        let picked: Vec<usize> = (0..50).filter(|&n| is_interesting(n)).collect();
        assert_eq!(picked, vec![0, 1, 2, 3, 4, 6, 8, 12, 16, 24, 32, 48]);
    }

    #[test]
    fn annotations() {
        assert_eq!(annotate("CALL_TYPE", "B").as_deref(), Some("taxi stand"));
        assert_eq!(annotate("DAY_TYPE", "Z").as_deref(), Some("-"));
        assert_eq!(annotate("DAY_TYPE", ""), None);
        assert_eq!(
            annotate("TIMESTAMP", "1387972800").as_deref(),
            Some("Dec-25 12:00:00")
        );
        assert_eq!(annotate("TIMESTAMP", "soon"), None);
        assert_eq!(annotate("TAXI_ID", "20000589"), None);
    }

    #[test]
    fn arrows_follow_heading() {
        let east = Waypoint {
            point: LonLat::new(-8.6, 41.1),
            distance: 150.0,
            heading: 10.0,
        };
        assert_eq!(speed_arrow(&east), "===>");
        let west = Waypoint { heading: 170.0, ..east };
        assert_eq!(speed_arrow(&west), "<===");
        let flying = Waypoint { distance: 5000.0, ..east };
        assert_eq!(speed_arrow(&flying).len(), MAX_ARROW + 1);
    }

    #[test]
    fn waypoint_lines_carry_compass() {
        // about 119 m north-north-east
        let (waypoints, _) = parse_waypoints("[[-8.6,41.1],[-8.5995,41.101]]");
        let mut out = Vec::new();
        write_waypoints(&mut out, &waypoints, 2).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "   0.00: -8.600000, 41.100000,    0m,    -");
        assert!(lines[1].starts_with("   0.25: -8.599500, 41.101000,  119m,"));
        assert!(lines[1].contains("°   N"));
        assert!(lines[1].ends_with("==>"));
    }

    const RAW: &str = "\
TRIP_ID,CALL_TYPE,TIMESTAMP,POLYLINE
t0,C,1387972800,\"[[-8.6,41.1],[-8.6,41.101]]\"
t1,A,1387972800,\"[]\"
t2,B,1387972800,\"[[-8.6,41.1]]\"
";

    #[test]
    fn dumps_selected_trips() {
        let mut out = Vec::new();
        let options = IllumeOptions { limit: 1, start: 1 };
        let count = illume(RAW.as_bytes(), &mut out, &options).unwrap();
        assert_eq!(count, 2);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("__1_________\n"));
        assert!(text.contains("  TRIP_ID: t1\n"));
        assert!(text.contains("CALL_TYPE: A  (central dispatch)\n"));
        assert!(text.contains("TIMESTAMP: 1387972800  (Dec-25 12:00:00)\n"));
        assert!(text.contains(" POLYLINE:\n"));
        assert!(text.contains("ROUTE_LEN:  0.000 km\n"));
        assert!(!text.contains("t0"));
        assert!(!text.contains("t2"));
    }

    #[test]
    fn zero_limit_samples_whole_file() {
        let mut out = Vec::new();
        let options = IllumeOptions { limit: 0, start: 0 };
        assert_eq!(illume(RAW.as_bytes(), &mut out, &options).unwrap(), 3);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("t0") && text.contains("t1") && text.contains("t2"));
    }
}
