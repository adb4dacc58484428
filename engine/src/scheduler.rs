//! The tick loop: advances every boat once per second, logs a snapshot every
//! `ITERATIONS_PER_LOG` ticks, then drains pending commands.
//!
//! Grounded on `original_source/src/main.c`'s main loop (iteration detection
//! via `curTime % ITERATIONS_PER_LOG`, wrlock-advance / log-snapshot /
//! wrlock-command-drain ordering) translated from `clock_gettime`/`nanosleep`
//! onto `tokio::time::interval`, matching the teacher's periodic-tick task in
//! `main.rs`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use sailnavsim_env::{CelestialProvider, CompassProvider, GeoInfoProvider, OceanProvider, WaveProvider, WeatherProvider};
use sailnavsim_types::{BoatFlags, Command, CommandAction};

use crate::boat::{Boat, EnvRefs};
use crate::celestial;
use crate::geo_utils;
use crate::logger::{CelestialSightEntry, LogBatch, LogEntry, OceanLogFields};
use crate::registry::Registry;

pub const ITERATIONS_PER_LOG: i64 = 60;

/// Every environment provider the Scheduler and Boat advance step need,
/// bundled behind `Arc` so a single instance can be shared across ticks and
/// (eventually) request-server lookups.
pub struct EnvBundle {
    pub weather: Arc<dyn WeatherProvider>,
    pub ocean: Arc<dyn OceanProvider>,
    pub wave: Arc<dyn WaveProvider>,
    pub geo: Arc<dyn GeoInfoProvider>,
    pub compass: Arc<dyn CompassProvider>,
    pub celestial: Arc<dyn CelestialProvider>,
}

impl EnvBundle {
    fn refs(&self) -> EnvRefs<'_> {
        EnvRefs {
            weather: self.weather.as_ref(),
            ocean: self.ocean.as_ref(),
            wave: self.wave.as_ref(),
            geo: self.geo.as_ref(),
            compass: self.compass.as_ref(),
        }
    }
}

pub struct Scheduler {
    registry: Arc<RwLock<Registry>>,
    env: Arc<EnvBundle>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    log_tx: mpsc::UnboundedSender<LogBatch>,
    /// The same pool the Logger writes `boat_log`/`celestial_sight` to, used
    /// here only to keep `boat_roster` current for the init loader's
    /// relational-snapshot path. `None` disables relational persistence
    /// entirely (CSV-only / no-db configurations).
    roster_pool: Option<sqlx::SqlitePool>,
    last_iter: i64,
    rng: rand::rngs::SmallRng,
}

impl Scheduler {
    pub fn new(
        registry: Arc<RwLock<Registry>>,
        env: Arc<EnvBundle>,
        cmd_rx: mpsc::UnboundedReceiver<Command>,
        log_tx: mpsc::UnboundedSender<LogBatch>,
        roster_pool: Option<sqlx::SqlitePool>,
    ) -> Self {
        use rand::SeedableRng;
        Self {
            registry,
            env,
            cmd_rx,
            log_tx,
            roster_pool,
            last_iter: 1,
            rng: rand::rngs::SmallRng::seed_from_u64(now_unix() as u64),
        }
    }

    pub async fn run(mut self) -> ! {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);

        loop {
            let tick_start = tokio::time::Instant::now();
            self.tick().await;
            if tick_start.elapsed() > Duration::from_millis(1500) {
                warn!("tick fell behind schedule, starting next right away");
            }
            interval.tick().await;
        }
    }

    async fn tick(&mut self) {
        let cur_time = now_unix();
        let iter = if ITERATIONS_PER_LOG >= 2 { cur_time % ITERATIONS_PER_LOG } else { 1 };
        let do_log = ITERATIONS_PER_LOG >= 2 && iter < self.last_iter;
        self.last_iter = iter;

        let mut batch = if do_log {
            Some(LogBatch {
                entries: Vec::new(),
                sights: Vec::new(),
            })
        } else {
            None
        };

        let registry = Arc::clone(&self.registry);
        let env = Arc::clone(&self.env);
        let rng = &mut self.rng;

        {
            let mut reg = registry.write().await;
            let env_refs = env.refs();

            reg.for_each_mut(|name, entry| {
                entry.boat.advance(&env_refs);

                if let Some(batch) = &mut batch {
                    let (log, sight) = build_log_entry(&env, rng, name, &entry.boat, cur_time);
                    batch.entries.push(log);
                    if let Some(sight) = sight {
                        batch.sights.push(sight);
                    }
                }
            });
        }

        if let Some(batch) = batch {
            let _ = self.log_tx.send(batch);
        }

        {
            let mut reg = registry.write().await;
            while let Ok(cmd) = self.cmd_rx.try_recv() {
                self.apply_command(&mut reg, cmd);
            }
        }
    }

    fn apply_command(&self, reg: &mut Registry, cmd: Command) {
        match cmd.action {
            CommandAction::AddBoat | CommandAction::AddBoatWithGroup => {
                let (Some(lat), Some(lon), Some(boat_type), Some(flags)) =
                    (cmd.values.lat, cmd.values.lon, cmd.values.boat_type, cmd.values.flags)
                else {
                    return;
                };
                let pos = sailnavsim_types::GeoPos::new(lat, lon);
                let seed = now_unix() as u64 ^ (reg.len() as u64);
                let boat = Boat::new(cmd.target_name.clone(), pos, boat_type, flags, seed);

                let group = cmd.values.group.clone();
                let alt_name = cmd.values.alt_name.clone();
                if let Err(e) = reg.add(&cmd.target_name, boat, group.clone(), alt_name.clone()) {
                    warn!(error = %e, name = %cmd.target_name, "failed to add boat from command");
                } else if let Some(pool) = self.roster_pool.clone() {
                    let name = cmd.target_name.clone();
                    tokio::spawn(async move {
                        if let Err(e) = crate::logger::upsert_roster(
                            &pool, &name, boat_type, flags, group.as_deref(), alt_name.as_deref(),
                            0.0, 0.0, false,
                        ).await {
                            warn!(error = %e, name = %name, "failed to upsert boat roster row");
                        }
                    });
                }
            }
            CommandAction::RemoveBoat => {
                reg.remove(&cmd.target_name);
                if let Some(pool) = self.roster_pool.clone() {
                    let name = cmd.target_name.clone();
                    tokio::spawn(async move {
                        if let Err(e) = crate::logger::delete_roster(&pool, &name).await {
                            warn!(error = %e, name = %name, "failed to delete boat roster row");
                        }
                    });
                }
            }
            CommandAction::Stop => {
                if let Some(entry) = reg.get_mut(&cmd.target_name) {
                    entry.boat.sails_down = true;
                }
            }
            CommandAction::Start => {
                if let Some(entry) = reg.get_mut(&cmd.target_name) {
                    let env_refs = self.env.refs();
                    if entry.boat.is_heading_toward_water(&env_refs) {
                        entry.boat.stop = false;
                        entry.boat.sails_down = false;
                        entry.boat.moving_to_sea = true;
                    }
                }
            }
            CommandAction::CourseTrue | CommandAction::CourseMagnetic => {
                if let Some(entry) = reg.get_mut(&cmd.target_name) {
                    if let Some(c) = cmd.values.int_val {
                        entry.boat.desired_course = c as f64;
                        entry.boat.course_magnetic = cmd.action == CommandAction::CourseMagnetic;
                        self.sync_roster(entry, &cmd.target_name);
                    }
                }
            }
            CommandAction::SailArea => {
                if let Some(entry) = reg.get_mut(&cmd.target_name) {
                    if let Some(s) = cmd.values.int_val {
                        entry.boat.sail_area = s as f64;
                        self.sync_roster(entry, &cmd.target_name);
                    }
                }
            }
        }
    }

    /// Fires off a best-effort `boat_roster` upsert reflecting `entry`'s
    /// current sail area / course, so a restart picks up the latest
    /// commanded values rather than the boat's creation-time defaults.
    fn sync_roster(&self, entry: &crate::registry::Entry, name: &str) {
        let Some(pool) = self.roster_pool.clone() else { return };
        let name = name.to_string();
        let boat_type = entry.boat.boat_type;
        let flags = entry.boat.flags.bits();
        let group = entry.group.clone();
        let alt_name = entry.alt_name.clone();
        let sail_area = entry.boat.sail_area;
        let desired_course = entry.boat.desired_course;
        let course_magnetic = entry.boat.course_magnetic;
        tokio::spawn(async move {
            if let Err(e) = crate::logger::upsert_roster(
                &pool, &name, boat_type, flags, group.as_deref(), alt_name.as_deref(),
                sail_area, desired_course, course_magnetic,
            ).await {
                warn!(error = %e, name = %name, "failed to sync boat roster row");
            }
        });
    }
}

/// Builds one tick's log snapshot for a single boat, shooting a celestial
/// sight first if the boat carries `BOAT_FLAG_CELESTIAL`. A free function
/// (not a `Scheduler` method) so its `&EnvBundle`/`&mut SmallRng` borrows
/// don't overlap with the `Registry` write-lock guard held by the caller.
fn build_log_entry(
    env: &EnvBundle,
    rng: &mut rand::rngs::SmallRng,
    name: &str,
    boat: &Boat,
    cur_time: i64,
) -> (LogEntry, Option<CelestialSightEntry>) {
    let wx = env.weather.get(&boat.pos, false);
    let ocean = env.ocean.get(&boat.pos);
    let wave = env.wave.get(&boat.pos);
    let is_water = env.geo.is_water(&boat.pos);

    let mut sight_entry = None;
    // `main.c`'s main loop defaults `isReportVisible` to true and only
    // recomputes it for celestial boats; matched here verbatim.
    let mut report_invisible = true;

    if boat.flags.contains(BoatFlags::CELESTIAL) {
        let cloud_percent = wx.cloud.round() as i32;
        if let Some(mut sight) = celestial::shoot(env.celestial.as_ref(), &boat.pos, cloud_percent, rng) {
            let adjusted = celestial::adjust_for_waves(boat.flags, wave, boat.boat_type, sight.azimuth, sight.altitude, rng);

            match adjusted {
                Some((az, alt)) => {
                    sight.azimuth = az;
                    sight.altitude = alt;
                    sight_entry = Some(CelestialSightEntry {
                        time: cur_time,
                        boat_name: name.to_string(),
                        obj: sight_object_code(sight.object),
                        az: sight.azimuth,
                        alt: sight.altitude,
                    });
                }
                None => {
                    // Wave-adjusted sight dropped below the horizon.
                }
            }
        }

        // `GeoUtils_isApproximatelyNearVisibleLand` reports whether land is
        // within visibility range (true even if the boat itself sits on
        // land). The original assigns this straight into `isReportVisible`
        // with no inversion, despite the name suggesting the opposite; this
        // column carries that value through unchanged.
        report_invisible = geo_utils::is_approximately_near_visible_land(env.geo.as_ref(), &boat.pos, wx.visibility);
    }

    let compass_mag_dec = env.compass.declination(&boat.pos) as f64;

    let log = LogEntry {
        time: cur_time,
        boat_name: name.to_string(),
        lat: boat.pos.lat,
        lon: boat.pos.lon,
        course_water: boat.v.angle,
        speed_water: boat.v.mag,
        track_ground: boat.v_ground.angle,
        speed_ground: boat.v_ground.mag,
        wind_dir: wx.wind.angle,
        wind_spd: wx.wind.mag,
        ocean: ocean.map(|o| OceanLogFields {
            current_dir: o.current.angle,
            current_spd: o.current.mag,
            surface_temp: o.surface_temp,
            salinity: o.salinity,
            ice: o.ice,
        }),
        air_temp: wx.temp,
        dewpoint: wx.dewpoint,
        pressure: wx.pressure,
        cloud: wx.cloud,
        visibility: wx.visibility,
        prate: wx.prate,
        cond: wx.cond,
        boat_state: if boat.stop { 0 } else if boat.sails_down { 2 } else { 1 },
        loc_state: if is_water { 0 } else { 1 },
        distance: boat.distance_travelled,
        damage: boat.damage,
        wind_gust: wx.wind_gust,
        wave_height: wave.map(|w| w.wave_height),
        compass_mag_dec,
        report_invisible,
    };

    (log, sight_entry)
}

fn sight_object_code(object: celestial::SightObject) -> i32 {
    match object {
        celestial::SightObject::Sun => 0,
        // Star identity beyond "some star" isn't persisted; the original
        // engine's object IDs come from a fixed star catalog enum this crate
        // doesn't reproduce 1:1, so every star sight is coded the same.
        celestial::SightObject::Star(_) => 1,
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}
