//! Command channel: parses the line-oriented command syntax shared by the
//! tailed command file and the `boatcmd` request, and tails that file.
//!
//! Grounded on `original_source/src/Command.c`'s `handleCmd`/`getAction`/
//! `areValuesValidForAction`, translated from the mutex-protected linked list
//! there into an unbounded `tokio::sync::mpsc` channel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use sailnavsim_types::{Command, CommandAction, CommandValues};

use crate::error::CommandParseError;
use crate::wind_response;

const BOAT_FLAGS_MAX_VALUE: u32 = 0x003f;

/// Parses one `name,action[,args...]` line. The caller is responsible for
/// stripping the trailing newline (or this accepts either).
pub fn parse_line(line: &str) -> Result<Command, CommandParseError> {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut fields = line.split(',');

    let target_name = fields.next().filter(|s| !s.is_empty()).ok_or(CommandParseError::MissingField)?;

    let action_str = fields.next().ok_or(CommandParseError::MissingField)?;
    let action = CommandAction::parse(action_str).ok_or_else(|| CommandParseError::UnknownAction(action_str.to_string()))?;

    let values = parse_values(action, &mut fields)?;
    validate(action, &values)?;

    Ok(Command {
        target_name: target_name.to_string(),
        action,
        values,
    })
}

fn next_field<'a>(fields: &mut impl Iterator<Item = &'a str>) -> Result<&'a str, CommandParseError> {
    fields.next().ok_or(CommandParseError::MissingField)
}

fn parse_values<'a>(
    action: CommandAction,
    fields: &mut impl Iterator<Item = &'a str>,
) -> Result<CommandValues, CommandParseError> {
    let mut values = CommandValues::default();

    match action {
        CommandAction::Stop | CommandAction::Start | CommandAction::RemoveBoat => {}
        CommandAction::CourseTrue | CommandAction::CourseMagnetic | CommandAction::SailArea => {
            let raw = next_field(fields)?;
            let parsed: i64 = raw.parse().map_err(|_| CommandParseError::OutOfRange(raw.to_string()))?;
            values.int_val = Some(parsed);
        }
        CommandAction::AddBoat | CommandAction::AddBoatWithGroup => {
            let lat: f64 = next_field(fields)?.parse().map_err(|_| CommandParseError::MissingField)?;
            let lon: f64 = next_field(fields)?.parse().map_err(|_| CommandParseError::MissingField)?;
            let boat_type: i32 = next_field(fields)?.parse().map_err(|_| CommandParseError::MissingField)?;
            let flags: u32 = next_field(fields)?.parse().map_err(|_| CommandParseError::MissingField)?;
            values.lat = Some(lat);
            values.lon = Some(lon);
            values.boat_type = Some(boat_type);
            values.flags = Some(flags);

            if action == CommandAction::AddBoatWithGroup {
                let group = next_field(fields)?;
                let alt_name = next_field(fields)?;
                values.group = Some(group.to_string());
                values.alt_name = Some(alt_name.to_string());
            }
        }
    }

    Ok(values)
}

fn validate(action: CommandAction, values: &CommandValues) -> Result<(), CommandParseError> {
    match action {
        CommandAction::CourseTrue | CommandAction::CourseMagnetic => {
            let c = values.int_val.ok_or(CommandParseError::MissingField)?;
            if !(0..=360).contains(&c) {
                return Err(CommandParseError::OutOfRange(format!("course {c}")));
            }
        }
        CommandAction::SailArea => {
            let s = values.int_val.ok_or(CommandParseError::MissingField)?;
            if !(0..=100).contains(&s) {
                return Err(CommandParseError::OutOfRange(format!("sail_area {s}")));
            }
        }
        CommandAction::AddBoat | CommandAction::AddBoatWithGroup => {
            let lat = values.lat.ok_or(CommandParseError::MissingField)?;
            let lon = values.lon.ok_or(CommandParseError::MissingField)?;
            let boat_type = values.boat_type.ok_or(CommandParseError::MissingField)?;
            let flags = values.flags.ok_or(CommandParseError::MissingField)?;

            if !(lat > -90.0 && lat < 90.0) {
                return Err(CommandParseError::OutOfRange(format!("lat {lat}")));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(CommandParseError::OutOfRange(format!("lon {lon}")));
            }
            if !(wind_response::is_basic(boat_type) || wind_response::is_advanced(boat_type)) {
                return Err(CommandParseError::OutOfRange(format!("boat_type {boat_type}")));
            }
            if flags > BOAT_FLAGS_MAX_VALUE {
                return Err(CommandParseError::OutOfRange(format!("flags {flags}")));
            }

            if action == CommandAction::AddBoatWithGroup {
                let group = values.group.as_deref().unwrap_or("");
                if group.is_empty() {
                    return Err(CommandParseError::MissingField);
                }
            }
        }
        CommandAction::Stop | CommandAction::Start | CommandAction::RemoveBoat => {}
    }

    Ok(())
}

/// Tails `path`, forwarding successfully-parsed lines to `tx`. Reopens the
/// file and retries every second on EOF or open failure, never exits.
pub async fn tail_file(path: PathBuf, tx: mpsc::UnboundedSender<Command>, error_count: Arc<AtomicU64>) {
    loop {
        match tokio::fs::File::open(&path).await {
            Ok(file) => {
                let mut lines = BufReader::new(file).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            if line.is_empty() {
                                continue;
                            }
                            match parse_line(&line) {
                                Ok(cmd) => {
                                    let _ = tx.send(cmd);
                                }
                                Err(_) => {
                                    error_count.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "command file read error");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to open command input file");
            }
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_and_start_take_no_args() {
        let cmd = parse_line("alice,stop\n").unwrap();
        assert_eq!(cmd.target_name, "alice");
        assert_eq!(cmd.action, CommandAction::Stop);
    }

    #[test]
    fn course_out_of_range_rejected() {
        assert!(parse_line("alice,course,400").is_err());
    }

    #[test]
    fn course_in_range_accepted() {
        let cmd = parse_line("alice,course,090").unwrap();
        assert_eq!(cmd.values.int_val, Some(90));
    }

    #[test]
    fn add_boat_requires_valid_fields() {
        let cmd = parse_line("bob,add,45.0,-60.0,0,0").unwrap();
        assert_eq!(cmd.action, CommandAction::AddBoat);
        assert_eq!(cmd.values.lat, Some(45.0));
    }

    #[test]
    fn add_boat_rejects_pole_latitude() {
        assert!(parse_line("bob,add,90.0,-60.0,0,0").is_err());
    }

    #[test]
    fn add_boat_with_group_requires_nonempty_group() {
        assert!(parse_line("bob,add_g,45.0,-60.0,0,0,,Bobby").is_err());
        let cmd = parse_line("bob,add_g,45.0,-60.0,0,0,Team,Bobby").unwrap();
        assert_eq!(cmd.values.group.as_deref(), Some("Team"));
    }

    #[test]
    fn unknown_action_rejected() {
        assert!(parse_line("bob,frobnicate").is_err());
    }

    #[test]
    fn missing_target_rejected() {
        assert!(parse_line(",stop").is_err());
    }
}
