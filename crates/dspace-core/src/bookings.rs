//! Booking requests and answer ratings, each an append-only JSON-lines file.

use crate::error::StoreError;
use crate::jsonl;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const BOOKINGS_FILE: &str = "bookings.jsonl";
pub const FEEDBACK_FILE: &str = "feedback.jsonl";

/// Fields a visitor submits from the booking form. All are required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub guests: String,
    #[serde(default)]
    pub event_type: String,
}

impl BookingRequest {
    /// Names of the fields left blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("phone", &self.phone),
            ("date", &self.date),
            ("guests", &self.guests),
            ("event_type", &self.event_type),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("missing fields: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub date: String,
    pub guests: String,
    pub event_type: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub timestamp_ms: i64,
    pub question: String,
    pub feedback: String,
}

pub struct BookingBook {
    path: PathBuf,
    lock: Mutex<()>,
}

impl BookingBook {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(BOOKINGS_FILE),
            lock: Mutex::new(()),
        }
    }

    /// Validates, stamps and appends.
    pub async fn add(&self, req: BookingRequest) -> Result<Booking, BookingError> {
        let missing = req.missing_fields();
        if !missing.is_empty() {
            return Err(BookingError::Missing(missing));
        }
        let booking = Booking {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            phone: req.phone.trim().to_string(),
            date: req.date.trim().to_string(),
            guests: req.guests.trim().to_string(),
            event_type: req.event_type.trim().to_string(),
            timestamp_ms: jsonl::now_ms(),
        };
        let _guard = self.lock.lock().await;
        jsonl::append(&self.path, &booking).await?;
        tracing::info!(target: "dspace::bookings", id = %booking.id, name = %booking.name, "booking saved");
        Ok(booking)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut all: Vec<Booking> = jsonl::read_all(&self.path).await?;
        all.reverse();
        Ok(all)
    }
}

pub struct FeedbackBox {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FeedbackBox {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(FEEDBACK_FILE),
            lock: Mutex::new(()),
        }
    }

    pub async fn add(&self, question: &str, feedback: &str) -> Result<Feedback, StoreError> {
        let entry = Feedback {
            timestamp_ms: jsonl::now_ms(),
            question: question.to_string(),
            feedback: feedback.to_string(),
        };
        let _guard = self.lock.lock().await;
        jsonl::append(&self.path, &entry).await?;
        tracing::debug!(target: "dspace::bookings", feedback = %entry.feedback, "feedback saved");
        Ok(entry)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<Feedback>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut all: Vec<Feedback> = jsonl::read_all(&self.path).await?;
        all.reverse();
        Ok(all)
    }
}
