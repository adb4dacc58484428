//! Startup boat seeding: populates a freshly-created `Registry` from either a
//! relational-store snapshot or a CSV seed file before the Scheduler and
//! request server start accepting work.
//!
//! Grounded on `original_source/src/BoatInitParser.c`: the CSV branch mirrors
//! `startFile`/`getNextFile`/`readBoatInitData` (one `name,lat,lon,type,flags`
//! line per boat, group membership not carried since the original's own CSV
//! path does not set it either), and the relational branch mirrors
//! `startSql`/`getNextSql` (the `Boat` table joined against each boat's most
//! recent log row for its last-known position and derived state), adapted
//! from hand-rolled `sqlite3_stmt` stepping onto `sqlx`'s row decoding, the
//! way the teacher's `persistence.rs` reads rows back into domain structs.

use std::path::Path;

use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use sailnavsim_types::GeoPos;

use crate::boat::Boat;
use crate::error::InitLoaderError;
use crate::registry::Registry;

/// Seeds `registry` at startup. Prefers the relational snapshot in
/// `boat_roster` when `pool` is given and the table holds any rows; falls
/// back to the CSV seed file at `csv_path` otherwise, matching
/// `BoatInitParser_start`'s db-then-csv precedence.
pub async fn load(
    registry: &mut Registry,
    pool: Option<&SqlitePool>,
    csv_path: Option<&Path>,
) -> Result<(), InitLoaderError> {
    if let Some(pool) = pool {
        let loaded = load_from_sql(registry, pool).await?;
        if loaded > 0 {
            info!(count = loaded, "loaded boats from relational snapshot");
            return Ok(());
        }
    }

    if let Some(path) = csv_path {
        let loaded = load_from_csv(registry, path).await?;
        info!(count = loaded, path = %path.display(), "loaded boats from csv seed file");
    }

    Ok(())
}

/// Reads `boat_roster` joined with each boat's latest `boat_log` row,
/// hydrating position, velocity, course and derived `stop`/`sails_down`/
/// `moving_to_sea` flags. Returns the number of boats added.
async fn load_from_sql(registry: &mut Registry, pool: &SqlitePool) -> Result<usize, InitLoaderError> {
    let rows = sqlx::query(
        "SELECT
            r.name, r.boat_type, r.flags, r.group_name, r.alt_name,
            r.sail_area, r.desired_course, r.course_magnetic,
            l.lat, l.lon, l.course_water, l.speed_water, l.track_ground, l.speed_ground,
            l.boat_state, l.loc_state, l.distance, l.damage
         FROM boat_roster r
         LEFT JOIN boat_log l ON l.id = (
             SELECT id FROM boat_log WHERE boat_name = r.name ORDER BY id DESC LIMIT 1
         )",
    )
    .fetch_all(pool)
    .await?;

    let mut count = 0usize;
    for row in rows {
        let name: String = row.try_get("name")?;
        let boat_type: i32 = row.try_get("boat_type")?;
        let flags: i64 = row.try_get("flags")?;
        let group: Option<String> = row.try_get("group_name")?;
        let alt_name: Option<String> = row.try_get("alt_name")?;
        let sail_area: f64 = row.try_get("sail_area")?;
        let desired_course: f64 = row.try_get("desired_course")?;
        let course_magnetic: bool = row.try_get("course_magnetic")?;

        let lat: Option<f64> = row.try_get("lat")?;
        let lon: Option<f64> = row.try_get("lon")?;
        let Some(lat) = lat else {
            warn!(name = %name, "boat roster row has no logged position, skipping");
            continue;
        };
        let lon = lon.unwrap_or(0.0);

        let course_water: f64 = row.try_get::<Option<f64>, _>("course_water")?.unwrap_or(0.0);
        let speed_water: f64 = row.try_get::<Option<f64>, _>("speed_water")?.unwrap_or(0.0);
        let track_ground: f64 = row.try_get::<Option<f64>, _>("track_ground")?.unwrap_or(0.0);
        let speed_ground: f64 = row.try_get::<Option<f64>, _>("speed_ground")?.unwrap_or(0.0);
        let boat_state: i64 = row.try_get::<Option<i64>, _>("boat_state")?.unwrap_or(0);
        let loc_state: i64 = row.try_get::<Option<i64>, _>("loc_state")?.unwrap_or(0);
        let distance: f64 = row.try_get::<Option<f64>, _>("distance")?.unwrap_or(0.0);
        let damage: f64 = row.try_get::<Option<f64>, _>("damage")?.unwrap_or(0.0);

        let seed = name.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut boat = Boat::new(name.clone(), GeoPos::new(lat, lon), boat_type, flags as u32, seed);
        boat.v = sailnavsim_types::GeoVec::new(course_water, speed_water);
        boat.v_ground = sailnavsim_types::GeoVec::new(track_ground, speed_ground);
        boat.sail_area = sail_area;
        boat.desired_course = desired_course;
        boat.course_magnetic = course_magnetic;
        boat.distance_travelled = distance;
        boat.damage = damage;
        boat.set_immediate_desired_course = false;

        // No persisted "ever started" flag survives a restart; derive the
        // run state from the last logged `boat_state`/`loc_state` pair
        // instead (0 = stopped, 2 = sails down, 1 = under way; loc_state 1
        // meaning the last fix was over land).
        boat.stop = boat_state == 0;
        boat.sails_down = boat_state == 2;
        boat.moving_to_sea = boat_state == 1 && loc_state == 1;

        if let Err(e) = registry.add(&name, boat, group, alt_name) {
            warn!(error = %e, name = %name, "failed to add boat from relational snapshot");
            continue;
        }
        count += 1;
    }

    Ok(count)
}

/// Reads `name,lat,lon,type,flags` lines from a CSV seed file. Group
/// membership isn't representable in this format, matching the original's
/// CSV path.
async fn load_from_csv(registry: &mut Registry, path: &Path) -> Result<usize, InitLoaderError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(InitLoaderError::Io(e)),
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(contents.as_bytes());
    let mut count = 0usize;

    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "skipping malformed boat init csv record");
                continue;
            }
        };

        if record.len() < 5 {
            warn!(fields = record.len(), "skipping boat init csv record with too few fields");
            continue;
        }

        let name = record[0].trim().to_string();
        let (Ok(lat), Ok(lon), Ok(boat_type), Ok(flags)) = (
            record[1].trim().parse::<f64>(),
            record[2].trim().parse::<f64>(),
            record[3].trim().parse::<i32>(),
            record[4].trim().parse::<u32>(),
        ) else {
            warn!(name = %name, "skipping boat init csv record with unparsable fields");
            continue;
        };

        let seed = name.bytes().fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let boat = Boat::new(name.clone(), GeoPos::new(lat, lon), boat_type, flags, seed);

        if let Err(e) = registry.add(&name, boat, None, None) {
            warn!(error = %e, name = %name, "failed to add boat from csv seed file");
            continue;
        }
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn csv_seed_file_loads_valid_boats_and_skips_bad_rows() {
        let dir = tempfile_dir();
        let path = dir.join("boatinit.csv");
        tokio::fs::write(&path, "alpha,10.0,-20.0,0,5\nbroken,row\nbravo,5.5,5.5,1,0\n")
            .await
            .unwrap();

        let mut registry = Registry::new();
        let count = load_from_csv(&mut registry, &path).await.unwrap();
        assert_eq!(count, 2);
        assert!(registry.get_mut("alpha").is_some());
        assert!(registry.get_mut("bravo").is_some());

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn missing_csv_seed_file_loads_nothing() {
        let mut registry = Registry::new();
        let count = load_from_csv(&mut registry, Path::new("/nonexistent/path/boatinit.csv"))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("sailnavsim-init-loader-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
