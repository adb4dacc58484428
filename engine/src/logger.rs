//! Boat log and celestial-sight persistence: one CSV file per boat plus a
//! relational store, drained from an unbounded batch queue.
//!
//! Grounded on `original_source/src/Logger.c` (`Logger_fillLogEntry`,
//! `writeLogsCsv`, `writeLogsSql`'s field order and busy-retry loop) with the
//! mutex/condvar FIFO replaced by a `tokio::sync::mpsc` channel and the
//! hand-rolled SQLite bindings replaced by `sqlx`, matching the teacher's
//! `audit.rs` append-only CSV idiom (`tokio::fs::OpenOptions` with `.append`)
//! for the file half of this module.

use std::path::PathBuf;
use std::time::Duration;

use sqlx::{Row, SqlitePool};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::error::LoggerError;

/// One tick's worth of per-boat telemetry, the Rust analogue of `LogEntry`.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: i64,
    pub boat_name: String,
    pub lat: f64,
    pub lon: f64,
    pub course_water: f64,
    pub speed_water: f64,
    pub track_ground: f64,
    pub speed_ground: f64,
    pub wind_dir: f64,
    pub wind_spd: f64,
    pub ocean: Option<OceanLogFields>,
    pub air_temp: f32,
    pub dewpoint: f32,
    pub pressure: f32,
    pub cloud: f32,
    pub visibility: f32,
    pub prate: f32,
    pub cond: i32,
    pub boat_state: i32,
    pub loc_state: i32,
    pub distance: f64,
    pub damage: f64,
    pub wind_gust: f32,
    pub wave_height: Option<f32>,
    pub compass_mag_dec: f64,
    pub report_invisible: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct OceanLogFields {
    pub current_dir: f64,
    pub current_spd: f64,
    pub surface_temp: f32,
    pub salinity: f32,
    pub ice: f32,
}

/// A single celestial sight logged this tick, the Rust analogue of
/// `CelestialSightEntry`.
#[derive(Debug, Clone)]
pub struct CelestialSightEntry {
    pub time: i64,
    pub boat_name: String,
    pub obj: i32,
    pub az: f64,
    pub alt: f64,
}

pub struct LogBatch {
    pub entries: Vec<LogEntry>,
    pub sights: Vec<CelestialSightEntry>,
}

pub struct Logger {
    csv_dir: Option<PathBuf>,
    pool: Option<SqlitePool>,
    rx: mpsc::UnboundedReceiver<LogBatch>,
}

impl Logger {
    pub fn new(csv_dir: Option<PathBuf>, pool: Option<SqlitePool>) -> (Self, mpsc::UnboundedSender<LogBatch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { csv_dir, pool, rx }, tx)
    }

    /// Runs until the sender half is dropped. Never returns an error itself —
    /// individual write failures are logged and skipped so one bad batch
    /// doesn't stall the queue.
    pub async fn run(mut self) {
        if let Some(pool) = &self.pool {
            if let Err(e) = run_migrations(pool).await {
                error!(error = %e, "failed to run logger migrations");
            }
        }

        while let Some(batch) = self.rx.recv().await {
            if let Err(e) = self.write_sql(&batch).await {
                error!(error = %e, "failed to write log batch to relational store");
            }
            if let Err(e) = self.write_csv(&batch).await {
                error!(error = %e, "failed to write log batch to csv");
            }
        }
    }

    async fn write_csv(&self, batch: &LogBatch) -> Result<(), LoggerError> {
        let Some(dir) = &self.csv_dir else {
            return Ok(());
        };

        for log in &batch.entries {
            let path = dir.join(format!("{}.csv", log.boat_name));
            let line = format_csv_line(log);

            let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "failed to open boat log file");
                    continue;
                }
            };

            if let Err(e) = file.write_all(line.as_bytes()).await {
                return Err(LoggerError::Csv(e));
            }
        }

        Ok(())
    }

    async fn write_sql(&self, batch: &LogBatch) -> Result<(), LoggerError> {
        let Some(pool) = &self.pool else {
            return Ok(());
        };

        loop {
            let mut tx = match pool.begin().await {
                Ok(tx) => tx,
                Err(sqlx::Error::Database(e)) if e.message().contains("locked") => {
                    warn!("database locked starting boat_log transaction, retrying in 1s");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                Err(e) => return Err(LoggerError::Sql(e)),
            };

            for log in &batch.entries {
                insert_log_entry(&mut tx, log).await?;
            }
            tx.commit().await?;
            break;
        }

        loop {
            let mut tx = match pool.begin().await {
                Ok(tx) => tx,
                Err(sqlx::Error::Database(e)) if e.message().contains("locked") => {
                    warn!("database locked starting celestial_sight transaction, retrying in 1s");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                Err(e) => return Err(LoggerError::Sql(e)),
            };

            for sight in &batch.sights {
                insert_sight_entry(&mut tx, sight).await?;
            }
            tx.commit().await?;
            break;
        }

        Ok(())
    }
}

async fn insert_log_entry(tx: &mut sqlx::SqliteConnection, log: &LogEntry) -> Result<(), sqlx::Error> {
    let (current_dir, current_spd, surface_temp, salinity, ice) = match log.ocean {
        Some(o) => (
            Some(o.current_dir),
            Some(o.current_spd),
            Some(o.surface_temp),
            Some(o.salinity),
            Some(o.ice),
        ),
        None => (None, None, None, None, None),
    };

    sqlx::query(
        "INSERT INTO boat_log (
            time, boat_name, lat, lon, course_water, speed_water, track_ground, speed_ground,
            wind_dir, wind_spd, current_dir, current_spd, water_temp, air_temp, dewpoint,
            pressure, cloud, visibility, prate, cond, boat_state, loc_state, salinity, ice,
            distance, damage, wind_gust, wave_height, compass_mag_dec, report_invisible
        ) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(log.time)
    .bind(&log.boat_name)
    .bind(log.lat)
    .bind(log.lon)
    .bind(log.course_water)
    .bind(log.speed_water)
    .bind(log.track_ground)
    .bind(log.speed_ground)
    .bind(log.wind_dir)
    .bind(log.wind_spd)
    .bind(current_dir)
    .bind(current_spd)
    .bind(surface_temp)
    .bind(log.air_temp)
    .bind(log.dewpoint)
    .bind(log.pressure)
    .bind(log.cloud)
    .bind(log.visibility)
    .bind(log.prate)
    .bind(log.cond)
    .bind(log.boat_state)
    .bind(log.loc_state)
    .bind(salinity)
    .bind(ice)
    .bind(log.distance)
    .bind(log.damage)
    .bind(log.wind_gust)
    .bind(log.wave_height)
    .bind(log.compass_mag_dec)
    .bind(log.report_invisible)
    .execute(&mut *tx)
    .await?;

    Ok(())
}

async fn insert_sight_entry(tx: &mut sqlx::SqliteConnection, sight: &CelestialSightEntry) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO celestial_sight (time, boat_name, obj, az, alt) VALUES (?,?,?,?,?)")
        .bind(sight.time)
        .bind(&sight.boat_name)
        .bind(sight.obj)
        .bind(sight.az)
        .bind(sight.alt)
        .execute(&mut *tx)
        .await?;

    Ok(())
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS boat_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time INTEGER NOT NULL,
            boat_name TEXT NOT NULL,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            course_water REAL NOT NULL,
            speed_water REAL NOT NULL,
            track_ground REAL NOT NULL,
            speed_ground REAL NOT NULL,
            wind_dir REAL NOT NULL,
            wind_spd REAL NOT NULL,
            current_dir REAL,
            current_spd REAL,
            water_temp REAL,
            air_temp REAL NOT NULL,
            dewpoint REAL NOT NULL,
            pressure REAL NOT NULL,
            cloud REAL NOT NULL,
            visibility REAL NOT NULL,
            prate REAL NOT NULL,
            cond INTEGER NOT NULL,
            boat_state INTEGER NOT NULL,
            loc_state INTEGER NOT NULL,
            salinity REAL,
            ice REAL,
            distance REAL NOT NULL,
            damage REAL NOT NULL,
            wind_gust REAL NOT NULL,
            wave_height REAL,
            compass_mag_dec REAL NOT NULL,
            report_invisible INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS celestial_sight (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time INTEGER NOT NULL,
            boat_name TEXT NOT NULL,
            obj INTEGER NOT NULL,
            az REAL NOT NULL,
            alt REAL NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    // Active-boat roster, the Rust analogue of the original's `Boat` table
    // (name/type/flags/group/friendly-name/sail area, minus `race`'s wider
    // scheduling metadata). Paired with the latest `boat_log` row per name,
    // this is what the init loader's relational-snapshot path reads back on
    // restart.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS boat_roster (
            name TEXT PRIMARY KEY,
            boat_type INTEGER NOT NULL,
            flags INTEGER NOT NULL,
            group_name TEXT,
            alt_name TEXT,
            sail_area REAL NOT NULL,
            desired_course REAL NOT NULL,
            course_magnetic INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Upserts one boat's roster row, called whenever the Scheduler adds a boat
/// or updates its sail area/course via a command. Best-effort: failures are
/// logged by the caller, never fatal to the tick loop.
pub async fn upsert_roster(
    pool: &SqlitePool,
    name: &str,
    boat_type: i32,
    flags: u32,
    group: Option<&str>,
    alt_name: Option<&str>,
    sail_area: f64,
    desired_course: f64,
    course_magnetic: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO boat_roster (name, boat_type, flags, group_name, alt_name, sail_area, desired_course, course_magnetic)
         VALUES (?,?,?,?,?,?,?,?)
         ON CONFLICT(name) DO UPDATE SET
            boat_type = excluded.boat_type,
            flags = excluded.flags,
            group_name = excluded.group_name,
            alt_name = excluded.alt_name,
            sail_area = excluded.sail_area,
            desired_course = excluded.desired_course,
            course_magnetic = excluded.course_magnetic",
    )
    .bind(name)
    .bind(boat_type)
    .bind(flags as i64)
    .bind(group)
    .bind(alt_name)
    .bind(sail_area)
    .bind(desired_course)
    .bind(course_magnetic)
    .execute(pool)
    .await?;

    Ok(())
}

/// Removes a boat's roster row, called when the Scheduler removes a boat.
pub async fn delete_roster(pool: &SqlitePool, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM boat_roster WHERE name = ?").bind(name).execute(pool).await?;
    Ok(())
}

fn format_csv_line(log: &LogEntry) -> String {
    let wave_str = log.wave_height.map(|h| format!("{:.2}", h)).unwrap_or_default();

    match &log.ocean {
        Some(o) => format!(
            "{},{:.6},{:.6},{:.1},{:.3},{:.1},{:.3},{:.1},{:.3},{:.1},{:.3},{:.1},{:.1},{:.1},{:.1},{:.0},{:.0},{:.2},{},{},{},{:.3},{:.0},{:.1},{:.3},{:.3},{},{:.1},{}\n",
            log.time,
            log.lat,
            log.lon,
            log.course_water,
            log.speed_water,
            log.track_ground,
            log.speed_ground,
            log.wind_dir,
            log.wind_spd,
            o.current_dir,
            o.current_spd,
            o.surface_temp,
            log.air_temp,
            log.dewpoint,
            log.pressure,
            log.cloud,
            log.visibility,
            log.prate,
            log.cond,
            log.boat_state,
            log.loc_state,
            o.salinity,
            o.ice,
            log.distance,
            log.damage,
            log.wind_gust,
            wave_str,
            log.compass_mag_dec,
            log.report_invisible as i32,
        ),
        None => format!(
            "{},{:.6},{:.6},{:.1},{:.3},{:.1},{:.3},{:.1},{:.3},,,,{:.1},{:.1},{:.1},{:.0},{:.0},{:.2},{},{},{},,,{:.1},{:.3},{:.3},{},{:.1},{}\n",
            log.time,
            log.lat,
            log.lon,
            log.course_water,
            log.speed_water,
            log.track_ground,
            log.speed_ground,
            log.wind_dir,
            log.wind_spd,
            log.air_temp,
            log.dewpoint,
            log.pressure,
            log.cloud,
            log.visibility,
            log.prate,
            log.cond,
            log.boat_state,
            log.loc_state,
            log.distance,
            log.damage,
            log.wind_gust,
            wave_str,
            log.compass_mag_dec,
            log.report_invisible as i32,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(ocean: Option<OceanLogFields>) -> LogEntry {
        LogEntry {
            time: 1_700_000_000,
            boat_name: "alice".into(),
            lat: 45.0,
            lon: -60.0,
            course_water: 90.0,
            speed_water: 4.2,
            track_ground: 88.3,
            speed_ground: 4.4,
            wind_dir: 225.1,
            wind_spd: 8.3,
            ocean,
            air_temp: 15.0,
            dewpoint: 11.0,
            pressure: 1013.0,
            cloud: 40.0,
            visibility: 15000.0,
            prate: 0.0,
            cond: 0,
            boat_state: 1,
            loc_state: 0,
            distance: 120.5,
            damage: 0.0,
            wind_gust: 9.1,
            wave_height: Some(1.2),
            compass_mag_dec: -12.3,
            report_invisible: false,
        }
    }

    #[test]
    fn csv_line_with_ocean_has_no_empty_ocean_fields() {
        let ocean = OceanLogFields {
            current_dir: 180.0,
            current_spd: 0.3,
            surface_temp: 18.0,
            salinity: 35.0,
            ice: 0.0,
        };
        let line = format_csv_line(&sample_entry(Some(ocean)));
        assert!(line.starts_with("1700000000,45.000000,-60.000000,"));
        assert!(line.contains(",180.0,0.300,18.0,"));
        assert!(line.ends_with("\n"));
    }

    #[test]
    fn csv_line_without_ocean_leaves_fields_empty() {
        let line = format_csv_line(&sample_entry(None));
        assert!(line.contains(",8.300,,,,15.0,"));
    }
}
