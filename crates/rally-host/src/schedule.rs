//! Court schedule — an owned booking table injected into the host
//!
//! A date maps to hourly slots between 08:00 and 20:00; a slot holds either
//! the free sentinel or the reservation holder's name. Booking validates the
//! whole span before writing anything, so a conflict never leaves a partial
//! reservation behind.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Slot value meaning "free". Kept as the literal the wire format uses.
const FREE: &str = "unknown";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";
const OPEN_HOUR: u32 = 8;
const CLOSE_HOUR: u32 = 20;

/// Result of an availability query.
#[derive(Debug, Serialize)]
pub struct ScheduleQuery {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_slots: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booked_slots: Option<BTreeMap<String, String>>,
}

/// Result of a booking attempt.
#[derive(Debug, Serialize)]
pub struct BookingOutcome {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
}

impl ScheduleQuery {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            available_slots: None,
            booked_slots: None,
        }
    }
}

impl BookingOutcome {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            booking_id: None,
        }
    }
}

/// In-memory pickleball court schedule. Owned by whoever constructs it and
/// passed into the host explicitly, so concurrent tests get isolated tables.
pub struct CourtSchedule {
    slots: BTreeMap<String, BTreeMap<String, String>>,
}

impl CourtSchedule {
    /// Seven days starting at `start`, every hourly slot free.
    pub fn for_week(start: NaiveDate) -> Self {
        let mut slots = BTreeMap::new();
        for day in 0..7 {
            let date = start + Duration::days(day);
            let daily: BTreeMap<String, String> = (OPEN_HOUR..=CLOSE_HOUR)
                .map(|hour| (format!("{hour:02}:00"), FREE.to_string()))
                .collect();
            slots.insert(date.format(DATE_FORMAT).to_string(), daily);
        }
        Self { slots }
    }

    /// Availability for one date.
    pub fn list(&self, date: &str) -> ScheduleQuery {
        if NaiveDate::parse_from_str(date, DATE_FORMAT).is_err() {
            return ScheduleQuery::error("Invalid date format. Please use YYYY-MM-DD.");
        }
        let Some(daily) = self.slots.get(date) else {
            return ScheduleQuery {
                status: "success".to_string(),
                message: format!("The court is not open on {date}."),
                available_slots: Some(Vec::new()),
                booked_slots: Some(BTreeMap::new()),
            };
        };

        let available: Vec<String> = daily
            .iter()
            .filter(|(_, holder)| holder.as_str() == FREE)
            .map(|(slot, _)| slot.clone())
            .collect();
        let booked: BTreeMap<String, String> = daily
            .iter()
            .filter(|(_, holder)| holder.as_str() != FREE)
            .map(|(slot, holder)| (slot.clone(), holder.clone()))
            .collect();

        ScheduleQuery {
            status: "success".to_string(),
            message: format!("Schedule for {date}."),
            available_slots: Some(available),
            booked_slots: Some(booked),
        }
    }

    /// Book every hourly slot in `[start, end)` for `reservation_name`.
    /// Fails atomically on the first conflict, naming the holder; nothing is
    /// written unless the whole span is free.
    pub fn book(
        &mut self,
        date: &str,
        start_time: &str,
        end_time: &str,
        reservation_name: &str,
    ) -> BookingOutcome {
        if NaiveDate::parse_from_str(date, DATE_FORMAT).is_err() {
            return BookingOutcome::error(
                "Invalid date or time format. Please use YYYY-MM-DD and HH:MM.",
            );
        }
        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(start_time, TIME_FORMAT),
            NaiveTime::parse_from_str(end_time, TIME_FORMAT),
        ) else {
            return BookingOutcome::error(
                "Invalid date or time format. Please use YYYY-MM-DD and HH:MM.",
            );
        };
        if start >= end {
            return BookingOutcome::error("Start time must be before end time.");
        }
        if reservation_name.trim().is_empty() {
            return BookingOutcome::error("Cannot book a court without a reservation name.");
        }
        if !self.slots.contains_key(date) {
            return BookingOutcome::error(format!("The court is not open on {date}."));
        }

        let mut required = Vec::new();
        let mut current = start;
        while current < end {
            required.push(current.format(TIME_FORMAT).to_string());
            current += Duration::hours(1);
        }

        // Validate the whole span before touching any slot.
        let daily = &self.slots[date];
        for slot in &required {
            match daily.get(slot) {
                Some(holder) if holder == FREE => {}
                Some(holder) => {
                    return BookingOutcome::error(format!(
                        "The time slot {slot} on {date} is already booked by {holder}."
                    ));
                }
                None => {
                    return BookingOutcome::error(format!(
                        "The time slot {slot} on {date} is outside court hours."
                    ));
                }
            }
        }

        if let Some(daily) = self.slots.get_mut(date) {
            for slot in &required {
                daily.insert(slot.clone(), reservation_name.to_string());
            }
        }

        let booking_id = Uuid::new_v4().to_string();
        info!("booked court on {date} {start_time}-{end_time} for {reservation_name} ({booking_id})");
        BookingOutcome {
            status: "success".to_string(),
            message: format!(
                "Success! The pickleball court has been booked for {reservation_name} \
                 from {start_time} to {end_time} on {date}. Booking ID: {booking_id}."
            ),
            booking_id: Some(booking_id),
        }
    }
}
