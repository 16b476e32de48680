use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default reservation length
pub const DEFAULT_RESERVATION_MINUTES: i64 = 30;

/// Longest configurable reservation (one day)
pub const MAX_RESERVATION_MINUTES: i64 = 24 * 60;

/// Reservation validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationError {
    /// Holder name is empty after trimming
    EmptyHolder,
    /// `now + duration` is outside the representable range
    OutOfRange,
}

impl fmt::Display for ReservationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationError::EmptyHolder => write!(f, "enter a nickname to reserve"),
            ReservationError::OutOfRange => write!(f, "reservation would end out of range"),
        }
    }
}

impl std::error::Error for ReservationError {}

/// A user's claim on the instance entry, valid until `expires_at`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub holder_name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

/// Result of a status query
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReservationStatus {
    Active {
        holder_name: String,
        remaining: Duration,
    },
    Expired,
    /// Nothing reserved
    Idle,
}

/// Create a reservation for `holder_name` lasting `duration` from `now`
pub fn reserve(
    holder_name: &str,
    now: DateTime<Utc>,
    duration: Duration,
) -> Result<Reservation, ReservationError> {
    let holder_name = holder_name.trim();
    if holder_name.is_empty() {
        return Err(ReservationError::EmptyHolder);
    }

    let expires_at = now
        .checked_add_signed(duration)
        .ok_or(ReservationError::OutOfRange)?;

    Ok(Reservation {
        holder_name: holder_name.to_string(),
        expires_at,
    })
}

/// Status of `reservation` at `now`; `Expired` once `expires_at <= now`
pub fn current_status(reservation: &Reservation, now: DateTime<Utc>) -> ReservationStatus {
    if reservation.expires_at <= now {
        return ReservationStatus::Expired;
    }

    ReservationStatus::Active {
        holder_name: reservation.holder_name.clone(),
        remaining: reservation.expires_at - now,
    }
}

/// Single reservation slot for a user session.
///
/// Every status read checks expiry and clears the slot once it has passed;
/// no timer is involved.
#[derive(Clone, Debug)]
pub struct ReservationTracker {
    duration: Duration,
    current: Option<Reservation>,
}

impl ReservationTracker {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            current: None,
        }
    }

    /// Resume from a persisted reservation (possibly already expired)
    pub fn with_reservation(duration: Duration, current: Option<Reservation>) -> Self {
        Self { duration, current }
    }

    /// Reserve (or re-reserve) for `holder_name`. Leaves the slot untouched on error.
    pub fn reserve(
        &mut self,
        holder_name: &str,
        now: DateTime<Utc>,
    ) -> Result<&Reservation, ReservationError> {
        let reservation = reserve(holder_name, now, self.duration)?;
        Ok(self.current.insert(reservation))
    }

    /// Status at `now`, clearing the slot if it expired
    pub fn status(&mut self, now: DateTime<Utc>) -> ReservationStatus {
        let Some(reservation) = &self.current else {
            return ReservationStatus::Idle;
        };

        let status = current_status(reservation, now);
        if status == ReservationStatus::Expired {
            self.current = None;
        }
        status
    }

    pub fn current(&self) -> Option<&Reservation> {
        self.current.as_ref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
