//! Log records and the line codec
//!
//! Each log stream has its own record type. Records are built from a
//! [`Snapshot`] with defaults substituted for missing streams, so partial
//! data never blocks a write.
//!
//! # Line format
//! Comma-separated, fixed field order, one record per line. A field that
//! contains a comma, a double quote or a line break is wrapped in double
//! quotes with embedded quotes doubled.

use chrono::{DateTime, Utc};
use envsense_common::events::{EnvironmentCategory, LogStream};
use envsense_common::time::{format_timestamp, parse_timestamp, truncate_to_millis};

use crate::error::{Error, Result};
use crate::state::{AudioLabel, Latest, Snapshot};

/// Number of audio labels carried by a [`FusionRecord`]
pub const AUDIO_SLOTS: usize = 3;

/// Placeholder for a label stream with no value yet
pub const EMPTY_LABEL: &str = "";

// ---------------------------------------------------------------------------
// Line codec
// ---------------------------------------------------------------------------

/// Quote a field if it needs it
pub fn encode_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn encode_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| encode_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Split a line on unquoted commas, undoing quote-doubling
pub fn split_line(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if current.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut current)),
            (other, _) => current.push(other),
        }
    }

    if in_quotes {
        return Err(Error::Record(format!("unterminated quote in line: {}", line)));
    }
    fields.push(current);
    Ok(fields)
}

/// Split file content into records, keeping line breaks inside quoted fields
///
/// Blank records are dropped and a trailing `\r` is trimmed from each one.
pub fn split_records(content: &str) -> Vec<String> {
    let mut records = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in content.chars() {
        match c {
            '"' => {
                // A doubled quote toggles twice and leaves the state unchanged
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\n' if !in_quotes => {
                let record = std::mem::take(&mut current);
                let record = record.strip_suffix('\r').unwrap_or(&record);
                if !record.trim().is_empty() {
                    records.push(record.to_string());
                }
            }
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() {
        records.push(current);
    }
    records
}

// ---------------------------------------------------------------------------
// Record trait
// ---------------------------------------------------------------------------

/// A row in one of the log streams
pub trait LogRecord: Sized {
    /// Destination stream
    const STREAM: LogStream;

    /// Column names, written once as the file header
    fn header() -> Vec<&'static str>;

    fn to_fields(&self) -> Vec<String>;

    /// Rebuild a record from its fields; fails on a wrong field count
    fn from_fields(fields: &[String]) -> Result<Self>;

    fn check_field_count(fields: &[String]) -> Result<()> {
        let expected = Self::header().len();
        if fields.len() != expected {
            return Err(Error::Record(format!(
                "{} log line has {} fields, expected {}",
                Self::STREAM,
                fields.len(),
                expected
            )));
        }
        Ok(())
    }

    fn to_line(&self) -> String {
        encode_line(&self.to_fields())
    }

    fn parse_line(line: &str) -> Result<Self> {
        Self::from_fields(&split_line(line)?)
    }
}

fn parse_ts(field: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(field).ok_or_else(|| Error::Record(format!("bad timestamp: {}", field)))
}

fn parse_category(field: &str) -> Result<EnvironmentCategory> {
    EnvironmentCategory::from_name(field)
        .ok_or_else(|| Error::Record(format!("bad category: {}", field)))
}

fn parse_score(field: &str) -> Result<f32> {
    field
        .parse::<f32>()
        .map_err(|_| Error::Record(format!("bad score: {}", field)))
}

/// Category and confidence of the camera stream, Unknown/0 when absent or failed
fn automatic_of(snapshot: &Snapshot) -> (EnvironmentCategory, f32) {
    match &snapshot.camera {
        Latest::Value(obs) => (obs.category, obs.confidence),
        _ => (EnvironmentCategory::Unknown, 0.0),
    }
}

fn activity_of(snapshot: &Snapshot) -> (String, f32) {
    match &snapshot.activity {
        Latest::Value(reading) => (reading.label.clone(), reading.confidence),
        failed @ Latest::Failed(_) => (failed.error_placeholder().unwrap_or_default(), 0.0),
        Latest::Absent => (EMPTY_LABEL.to_string(), 0.0),
    }
}

fn audio_of(snapshot: &Snapshot) -> [AudioLabel; AUDIO_SLOTS] {
    let mut slots: [AudioLabel; AUDIO_SLOTS] =
        std::array::from_fn(|_| AudioLabel::new(EMPTY_LABEL, 0.0));
    match &snapshot.audio {
        Latest::Value(labels) => {
            for (slot, label) in slots.iter_mut().zip(labels.iter()) {
                *slot = label.clone();
            }
        }
        failed @ Latest::Failed(_) => {
            slots[0].label = failed.error_placeholder().unwrap_or_default();
        }
        Latest::Absent => {}
    }
    slots
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Automatic-only stream row
#[derive(Debug, Clone, PartialEq)]
pub struct AutomaticRecord {
    pub timestamp: DateTime<Utc>,
    pub category: EnvironmentCategory,
    pub confidence: f32,
}

impl AutomaticRecord {
    pub fn from_snapshot(snapshot: &Snapshot, timestamp: DateTime<Utc>) -> Self {
        let (category, confidence) = automatic_of(snapshot);
        Self {
            timestamp: truncate_to_millis(timestamp),
            category,
            confidence,
        }
    }
}

impl LogRecord for AutomaticRecord {
    const STREAM: LogStream = LogStream::Automatic;

    fn header() -> Vec<&'static str> {
        vec!["timestamp", "category", "confidence"]
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            format_timestamp(self.timestamp),
            self.category.to_string(),
            self.confidence.to_string(),
        ]
    }

    fn from_fields(fields: &[String]) -> Result<Self> {
        Self::check_field_count(fields)?;
        Ok(Self {
            timestamp: parse_ts(&fields[0])?,
            category: parse_category(&fields[1])?,
            confidence: parse_score(&fields[2])?,
        })
    }
}

/// Manual-only stream row
#[derive(Debug, Clone, PartialEq)]
pub struct ManualRecord {
    pub timestamp: DateTime<Utc>,
    /// Raw selection, empty when none
    pub manual_name: String,
    pub manual_category: EnvironmentCategory,
    pub activity_label: String,
    pub activity_confidence: f32,
}

impl ManualRecord {
    pub fn from_snapshot(snapshot: &Snapshot, timestamp: DateTime<Utc>) -> Self {
        let (activity_label, activity_confidence) = activity_of(snapshot);
        Self {
            timestamp: truncate_to_millis(timestamp),
            manual_name: snapshot.manual.raw_name.clone().unwrap_or_default(),
            manual_category: snapshot.manual.category.unwrap_or_default(),
            activity_label,
            activity_confidence,
        }
    }
}

impl LogRecord for ManualRecord {
    const STREAM: LogStream = LogStream::Manual;

    fn header() -> Vec<&'static str> {
        vec![
            "timestamp",
            "manual_name",
            "manual_category",
            "activity_label",
            "activity_confidence",
        ]
    }

    fn to_fields(&self) -> Vec<String> {
        vec![
            format_timestamp(self.timestamp),
            self.manual_name.clone(),
            self.manual_category.to_string(),
            self.activity_label.clone(),
            self.activity_confidence.to_string(),
        ]
    }

    fn from_fields(fields: &[String]) -> Result<Self> {
        Self::check_field_count(fields)?;
        Ok(Self {
            timestamp: parse_ts(&fields[0])?,
            manual_name: fields[1].clone(),
            manual_category: parse_category(&fields[2])?,
            activity_label: fields[3].clone(),
            activity_confidence: parse_score(&fields[4])?,
        })
    }
}

/// Combined stream row: every input at the sampling instant
#[derive(Debug, Clone, PartialEq)]
pub struct FusionRecord {
    pub timestamp: DateTime<Utc>,
    pub automatic_category: EnvironmentCategory,
    pub automatic_confidence: f32,
    pub activity_label: String,
    pub activity_confidence: f32,
    pub audio_top: [AudioLabel; AUDIO_SLOTS],
    pub manual_category: EnvironmentCategory,
}

impl FusionRecord {
    /// Assemble a record from a snapshot; never fails
    pub fn from_snapshot(snapshot: &Snapshot, timestamp: DateTime<Utc>) -> Self {
        let (automatic_category, automatic_confidence) = automatic_of(snapshot);
        let (activity_label, activity_confidence) = activity_of(snapshot);
        Self {
            timestamp: truncate_to_millis(timestamp),
            automatic_category,
            automatic_confidence,
            activity_label,
            activity_confidence,
            audio_top: audio_of(snapshot),
            manual_category: snapshot.manual.category.unwrap_or_default(),
        }
    }
}

impl LogRecord for FusionRecord {
    const STREAM: LogStream = LogStream::Combined;

    fn header() -> Vec<&'static str> {
        vec![
            "timestamp",
            "automatic_category",
            "automatic_confidence",
            "activity_label",
            "activity_confidence",
            "audio1_label",
            "audio1_score",
            "audio2_label",
            "audio2_score",
            "audio3_label",
            "audio3_score",
            "manual_category",
        ]
    }

    fn to_fields(&self) -> Vec<String> {
        let mut fields = vec![
            format_timestamp(self.timestamp),
            self.automatic_category.to_string(),
            self.automatic_confidence.to_string(),
            self.activity_label.clone(),
            self.activity_confidence.to_string(),
        ];
        for audio in &self.audio_top {
            fields.push(audio.label.clone());
            fields.push(audio.score.to_string());
        }
        fields.push(self.manual_category.to_string());
        fields
    }

    fn from_fields(fields: &[String]) -> Result<Self> {
        Self::check_field_count(fields)?;
        let mut audio_top: [AudioLabel; AUDIO_SLOTS] =
            std::array::from_fn(|_| AudioLabel::new(EMPTY_LABEL, 0.0));
        for (i, slot) in audio_top.iter_mut().enumerate() {
            let base = 5 + i * 2;
            *slot = AudioLabel::new(fields[base].clone(), parse_score(&fields[base + 1])?);
        }
        Ok(Self {
            timestamp: parse_ts(&fields[0])?,
            automatic_category: parse_category(&fields[1])?,
            automatic_confidence: parse_score(&fields[2])?,
            activity_label: fields[3].clone(),
            activity_confidence: parse_score(&fields[4])?,
            audio_top,
            manual_category: parse_category(&fields[11])?,
        })
    }
}
