//! Trip search form state, remembered between launches.

use crate::db::Database;
use crate::models::Station;
use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Date format the booking backend expects.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Default gap between departure and return.
const RETURN_AFTER_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
        }
    }
}

impl Passengers {
    pub fn total(&self) -> u32 {
        self.adults.saturating_add(self.children)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TripType {
    #[default]
    OneWay,
    RoundTrip,
}

/// Which end of the trip a picked station fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    From,
    To,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub from_city: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub to_city: String,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub passengers: Passengers,
    #[serde(default)]
    pub departure_date: Option<String>,
    #[serde(default)]
    pub return_date: Option<String>,
    #[serde(default)]
    pub trip_type: TripType,
}

impl Default for SearchState {
    fn default() -> Self {
        Self::starting_on(Local::now().date_naive())
    }
}

impl SearchState {
    const KEY: &'static str = "search_state";

    /// A blank search departing on `today`, returning a week later.
    pub fn starting_on(today: NaiveDate) -> Self {
        let return_on = today
            .checked_add_days(Days::new(RETURN_AFTER_DAYS))
            .unwrap_or(today);
        Self {
            from: String::new(),
            from_city: String::new(),
            to: String::new(),
            to_city: String::new(),
            route: String::new(),
            passengers: Passengers::default(),
            departure_date: Some(format_date(today)),
            return_date: Some(format_date(return_on)),
            trip_type: TripType::OneWay,
        }
    }

    /// Load the saved search, or a fresh one if none is stored or it is unreadable.
    pub fn load(db: &Database) -> Self {
        if let Ok(Some(json)) = db.get_setting(Self::KEY) {
            match serde_json::from_str::<SearchState>(&json) {
                Ok(state) => return state,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse saved search, starting fresh");
                }
            }
        }
        Self::default()
    }

    pub fn save(&self, db: &Database) -> anyhow::Result<()> {
        let json = serde_json::to_string(self)?;
        db.set_setting(Self::KEY, &json)?;
        Ok(())
    }

    /// Back to a blank search with today's default dates.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn select_station(&mut self, direction: Direction, station: &Station) {
        match direction {
            Direction::From => {
                self.from = station.name.clone();
                self.from_city = station.city.clone();
            }
            Direction::To => {
                self.to = station.name.clone();
                self.to_city = station.city.clone();
            }
        }
    }

    /// Exchange origin and destination.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.from, &mut self.to);
        std::mem::swap(&mut self.from_city, &mut self.to_city);
    }

    /// At least one adult always travels.
    pub fn set_passengers(&mut self, passengers: Passengers) {
        self.passengers = Passengers {
            adults: passengers.adults.max(1),
            children: passengers.children,
        };
    }

    pub fn set_trip_type(&mut self, trip_type: TripType) {
        self.trip_type = trip_type;
    }

    pub fn set_departure_date(&mut self, date: Option<NaiveDate>) {
        self.departure_date = date.map(format_date);
    }

    pub fn set_return_date(&mut self, date: Option<NaiveDate>) {
        self.return_date = date.map(format_date);
    }

    pub fn departure(&self) -> Option<NaiveDate> {
        self.departure_date.as_deref().and_then(parse_date)
    }

    pub fn return_on(&self) -> Option<NaiveDate> {
        self.return_date.as_deref().and_then(parse_date)
    }

    /// Both ends chosen and a departure date set.
    pub fn is_ready(&self) -> bool {
        !self.from.is_empty() && !self.to.is_empty() && self.departure().is_some()
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}
