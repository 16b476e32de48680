// Line-oriented front-end over an InstanceTracker

mod board;

pub use board::{board, format_local, format_remaining, render_board, EntityView};

use crate::action::ActionRecord;
use crate::reservation::ReservationStatus;
use crate::tracker::InstanceTracker;
use anyhow::Result;
use chrono::FixedOffset;
use std::fmt;
use std::fmt::Write;
use std::str::FromStr;

pub const HELP: &str = "commands: kill <id> | collect <id> | nick <name> | reserve | log | board | reload | quit";

/// One console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `kill <id>` or `collect <id>`; the recorded kind comes from the entity
    Act { entity_id: String },
    Nick(String),
    Reserve,
    Log,
    Board,
    Reload,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    MissingArgument(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Unknown(word) => write!(f, "unknown command '{}'; {}", word, HELP),
            CommandError::MissingArgument(usage) => write!(f, "usage: {}", usage),
        }
    }
}

impl std::error::Error for CommandError {}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "kill" | "collect" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("kill|collect <entity-id>"));
                }
                Ok(Command::Act {
                    entity_id: rest.to_string(),
                })
            }
            "nick" => Ok(Command::Nick(rest.to_string())),
            "reserve" => Ok(Command::Reserve),
            "log" => Ok(Command::Log),
            "board" => Ok(Command::Board),
            "reload" => Ok(Command::Reload),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// What the loop should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Keep going; print the text
    Continue(String),
    Quit,
}

/// Execute `command` against `tracker`.
///
/// User mistakes (unknown ids, reserving without a nickname) come back as
/// `Err`; the caller reports them and keeps the loop running.
pub fn run_command(
    tracker: &mut InstanceTracker,
    command: Command,
    log_limit: usize,
) -> Result<Outcome> {
    let text = match command {
        Command::Act { entity_id } => {
            let record = tracker.act(&entity_id, None)?;
            let next = tracker
                .state(&record.entity_id)
                .and_then(|state| state.next_spawn_time)
                .map(|next| format_local(next, tracker.catalog().zone()))
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{} {} by {} (next spawn {})",
                record.entity_name,
                record.action_kind.verb(),
                record.actor_name,
                next
            )
        }
        Command::Nick(name) => {
            tracker.set_nickname(&name)?;
            match tracker.nickname() {
                Some(nickname) => format!("nickname set to {}", nickname),
                None => "nickname cleared".to_string(),
            }
        }
        Command::Reserve => {
            let reservation = tracker.reserve()?;
            format!(
                "reserved for {} until {}",
                reservation.holder_name,
                format_local(reservation.expires_at, tracker.catalog().zone())
            )
        }
        Command::Log => {
            let records = tracker.recent_actions(log_limit)?;
            if records.is_empty() {
                "no actions recorded".to_string()
            } else {
                let zone = *tracker.catalog().zone();
                let mut out = String::new();
                for record in &records {
                    let _ = writeln!(out, "{}", action_line(record, &zone));
                }
                out
            }
        }
        Command::Board => {
            let mut out = render_board(tracker.catalog(), tracker.states(), tracker.now());
            out.push_str(&reservation_line(&tracker.reservation_status()?));
            out
        }
        Command::Reload => {
            let written = tracker.reload()?;
            format!("reloaded {} ({} repaired)", tracker.instance_id(), written)
        }
        Command::Quit => return Ok(Outcome::Quit),
    };

    Ok(Outcome::Continue(text))
}

/// One action log entry, local time first
pub fn action_line(record: &ActionRecord, zone: &FixedOffset) -> String {
    format!(
        "{}  {} {} {}",
        format_local(record.timestamp, zone),
        record.actor_name,
        record.action_kind.verb(),
        record.entity_name
    )
}

/// One-line reservation summary
pub fn reservation_line(status: &ReservationStatus) -> String {
    match status {
        ReservationStatus::Active {
            holder_name,
            remaining,
        } => format!("reservation ({}): {}", holder_name, format_remaining(*remaining)),
        ReservationStatus::Expired => "reservation expired".to_string(),
        ReservationStatus::Idle => "no reservation".to_string(),
    }
}
