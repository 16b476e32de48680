use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
mod tests;

/// Schedule parsing and validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// Mark is not formatted as "HH:MM"
    InvalidFormat(String),
    /// Hour or minute outside the wall clock
    OutOfRange { hour: u32, minute: u32 },
    /// Fixed schedules need at least one mark
    Empty,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::InvalidFormat(s) => {
                write!(f, "invalid daily time '{}': expected HH:MM", s)
            }
            ScheduleError::OutOfRange { hour, minute } => {
                write!(f, "daily time {:02}:{:02} is outside 00:00-23:59", hour, minute)
            }
            ScheduleError::Empty => write!(f, "daily schedule must contain at least one time"),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Wall-clock mark within a day (seconds are always zero)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DailyTime {
    hour: u32,
    minute: u32,
}

impl DailyTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::OutOfRange { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    fn as_naive_time(&self) -> NaiveTime {
        // Range checked in `new`
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for DailyTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (hour, minute) = trimmed
            .split_once(':')
            .ok_or_else(|| ScheduleError::InvalidFormat(trimmed.to_string()))?;

        let hour = hour
            .parse::<u32>()
            .map_err(|_| ScheduleError::InvalidFormat(trimmed.to_string()))?;
        let minute = minute
            .parse::<u32>()
            .map_err(|_| ScheduleError::InvalidFormat(trimmed.to_string()))?;

        DailyTime::new(hour, minute)
    }
}

impl TryFrom<String> for DailyTime {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DailyTime> for String {
    fn from(value: DailyTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Ordered, de-duplicated, non-empty set of daily marks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DailyTime>", into = "Vec<DailyTime>")]
pub struct DailySchedule {
    times: Vec<DailyTime>,
}

impl DailySchedule {
    pub fn new(mut times: Vec<DailyTime>) -> Result<Self, ScheduleError> {
        if times.is_empty() {
            return Err(ScheduleError::Empty);
        }
        times.sort();
        times.dedup();
        Ok(Self { times })
    }

    /// Parse a list of "HH:MM" strings
    pub fn parse<S: AsRef<str>>(marks: &[S]) -> Result<Self, ScheduleError> {
        let times = marks
            .iter()
            .map(|m| m.as_ref().parse())
            .collect::<Result<Vec<DailyTime>, _>>()?;
        Self::new(times)
    }

    pub fn times(&self) -> &[DailyTime] {
        &self.times
    }

    fn first(&self) -> DailyTime {
        self.times[0]
    }
}

impl TryFrom<Vec<DailyTime>> for DailySchedule {
    type Error = ScheduleError;

    fn try_from(value: Vec<DailyTime>) -> Result<Self, Self::Error> {
        DailySchedule::new(value)
    }
}

impl From<DailySchedule> for Vec<DailyTime> {
    fn from(value: DailySchedule) -> Self {
        value.times
    }
}

/// Discriminant of [`SpawnPolicy`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PolicyCategory {
    FixedSchedule,
    DelayBased,
}

/// How an entity becomes eligible again
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpawnPolicy {
    /// Clock driven: eligible at every daily mark, whatever players do
    FixedSchedule { daily_times: DailySchedule },
    /// Action driven: eligible `respawn_delay` after the last recorded action
    DelayBased { respawn_delay: Duration },
}

impl SpawnPolicy {
    pub fn category(&self) -> PolicyCategory {
        match self {
            SpawnPolicy::FixedSchedule { .. } => PolicyCategory::FixedSchedule,
            SpawnPolicy::DelayBased { .. } => PolicyCategory::DelayBased,
        }
    }
}

/// Soonest mark at or after `now`.
///
/// Marks are laid on `now`'s calendar day in `now`'s time zone. When every
/// mark of the day has passed, the earliest mark of the following day is
/// returned. Day, month and year rollover come from chrono's calendar.
pub fn next_fixed_occurrence<Tz: TimeZone>(
    schedule: &DailySchedule,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    let later_today = schedule
        .times()
        .iter()
        .map(|mark| resolve_local(&tz, today.and_time(mark.as_naive_time())))
        .filter(|candidate| *candidate >= *now)
        .min();

    if let Some(next) = later_today {
        return next;
    }

    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    resolve_local(&tz, tomorrow.and_time(schedule.first().as_naive_time()))
}

/// [`next_fixed_occurrence`] for a UTC instant whose schedule lives in `zone`
pub fn next_fixed_in_zone(
    schedule: &DailySchedule,
    now: DateTime<Utc>,
    zone: &FixedOffset,
) -> DateTime<Utc> {
    next_fixed_occurrence(schedule, &now.with_timezone(zone)).with_timezone(&Utc)
}

/// `Some(last + delay)` once something happened, `None` ("eligible now") otherwise.
/// A sum past chrono's range is also `None`.
pub fn next_delay_occurrence(
    last_action_time: Option<DateTime<Utc>>,
    delay: Duration,
) -> Option<DateTime<Utc>> {
    last_action_time.and_then(|last| last.checked_add_signed(delay))
}

/// Map a local wall-clock time to an instant.
///
/// Ambiguous times (DST fall-back) take the earliest instant; times inside a
/// gap (DST spring-forward) move to the first minute that exists.
fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    if let Some(instant) = tz.from_local_datetime(&local).earliest() {
        return instant;
    }

    let mut probe = local;
    for _ in 0..(24 * 60) {
        probe += Duration::minutes(1);
        if let Some(instant) = tz.from_local_datetime(&probe).earliest() {
            return instant;
        }
    }

    tz.from_utc_datetime(&local)
}
