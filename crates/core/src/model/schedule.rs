use std::collections::BTreeMap;
use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::model::{TimeOfDay, parse_session_date};

/// Length applied to every newly scheduled session.
pub const DEFAULT_SESSION_MINUTES: u32 = 60;

/// Form fields that can carry a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScheduleField {
    Title,
    Description,
    Date,
    Time,
    MeetingLink,
}

impl ScheduleField {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleField::Title => "title",
            ScheduleField::Description => "description",
            ScheduleField::Date => "date",
            ScheduleField::Time => "time",
            ScheduleField::MeetingLink => "meetingLink",
        }
    }
}

/// Field-keyed validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<ScheduleField, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, field: ScheduleField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn insert(&mut self, field: ScheduleField, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn clear_field(&mut self, field: ScheduleField) {
        self.0.remove(&field);
    }

    /// Merges a fresh validation pass into errors already shown.
    ///
    /// Fields present in `newer` replace their previous message; every other
    /// existing message stays.
    pub fn absorb(&mut self, newer: FieldErrors) {
        self.0.extend(newer.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScheduleField, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {message}", field.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// Raw values collected from the scheduling form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDraft {
    pub title: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub meeting_link: String,
}

/// A draft that passed validation, with the end time already derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSession {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub meeting_link: Option<String>,
}

impl ValidatedSession {
    /// Human-readable label, e.g. `3/9/2024 at 14:30`.
    #[must_use]
    pub fn display(&self) -> String {
        format_next_session(self.date, self.start_time)
    }
}

#[must_use]
pub fn format_next_session(date: NaiveDate, time: TimeOfDay) -> String {
    format!("{} at {time}", date.format("%-m/%-d/%Y"))
}

/// Default start offered by a freshly opened form: one hour from now,
/// rounded up to the next half-hour mark.
#[must_use]
pub fn default_start_time(now: NaiveDateTime) -> TimeOfDay {
    let base = TimeOfDay::from_naive((now + Duration::hours(1)).time());
    match base.minute() {
        0 | 30 => base,
        m if m < 30 => base.plus_minutes(u32::from(30 - m)),
        m => base.plus_minutes(u32::from(60 - m)),
    }
}

impl SessionDraft {
    /// Form state used whenever the form opens for a new mentee: tomorrow's
    /// date and the default start time, everything else blank.
    #[must_use]
    pub fn with_defaults(now: NaiveDateTime) -> Self {
        let tomorrow = now.date() + Duration::days(1);
        Self {
            date: tomorrow.format("%Y-%m-%d").to_string(),
            time: default_start_time(now).to_string(),
            ..Self::default()
        }
    }

    /// Validate against the given local wall-clock instant.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(&self, now: NaiveDateTime) -> Result<ValidatedSession, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.insert(ScheduleField::Title, "Title is required");
        }
        let description = self.description.trim();
        if description.is_empty() {
            errors.insert(ScheduleField::Description, "Description is required");
        }

        let date = if self.date.trim().is_empty() {
            errors.insert(ScheduleField::Date, "Date is required");
            None
        } else {
            match parse_session_date(&self.date) {
                Some(date) if date < now.date() => {
                    errors.insert(ScheduleField::Date, "Date cannot be in the past");
                    None
                }
                Some(date) => Some(date),
                None => {
                    errors.insert(ScheduleField::Date, "Date is invalid");
                    None
                }
            }
        };

        let start_time = if self.time.trim().is_empty() {
            errors.insert(ScheduleField::Time, "Time is required");
            None
        } else if let Ok(time) = self.time.parse::<TimeOfDay>() {
            Some(time)
        } else {
            errors.insert(ScheduleField::Time, "Time must be in HH:MM format");
            None
        };

        if let (Some(date), Some(time)) = (date, start_time) {
            if time.on(date) <= now {
                errors.insert(ScheduleField::Time, "Session must start in the future");
            }
        }

        let link = self.meeting_link.trim();
        if !link.is_empty() && !link.starts_with("http") {
            errors.insert(
                ScheduleField::MeetingLink,
                "Meeting link must start with http",
            );
        }

        match (date, start_time) {
            (Some(date), Some(start_time)) if errors.is_empty() => Ok(ValidatedSession {
                title: title.to_owned(),
                description: description.to_owned(),
                date,
                start_time,
                end_time: start_time.plus_minutes(DEFAULT_SESSION_MINUTES),
                meeting_link: (!link.is_empty()).then(|| link.to_owned()),
            }),
            _ => Err(errors),
        }
    }
}
