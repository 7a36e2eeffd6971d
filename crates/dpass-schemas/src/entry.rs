use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Category, GateId, GateNo};

/// Opaque entry identifier assigned by the entry store.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One recipient's pass request, as written to the entry store.
///
/// Replaced wholesale on edit. Records read back from the store are not
/// trusted to be well formed: `category`/`gate` may be missing and
/// `pass_count` may be non-positive. Aggregation skips such records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassRecord {
    pub recipient_name: String,
    #[serde(default)]
    pub office_name: Option<String>,
    #[serde(default)]
    pub recipient_mobile: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub gate: Option<GateNo>,
    #[serde(default)]
    pub pass_count: i64,
    #[serde(default)]
    pub messenger_name: Option<String>,
    #[serde(default)]
    pub messenger_designation: Option<String>,
    #[serde(default)]
    pub messenger_mobile: Option<String>,
    /// Stamped by the writer on every create or replace.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PassRecord {
    /// Minimal well-formed record: recipient, gate and count.
    pub fn new(
        recipient_name: impl Into<String>,
        category: Category,
        gate: u16,
        pass_count: i64,
    ) -> Self {
        Self {
            recipient_name: recipient_name.into(),
            office_name: None,
            recipient_mobile: None,
            category: Some(category),
            gate: Some(GateNo(gate)),
            pass_count,
            messenger_name: None,
            messenger_designation: None,
            messenger_mobile: None,
            updated_at: None,
        }
    }

    pub fn with_office(mut self, office: impl Into<String>) -> Self {
        self.office_name = Some(office.into());
        self
    }

    pub fn with_recipient_mobile(mut self, mobile: impl Into<String>) -> Self {
        self.recipient_mobile = Some(mobile.into());
        self
    }

    pub fn with_messenger(
        mut self,
        name: impl Into<String>,
        designation: impl Into<String>,
        mobile: impl Into<String>,
    ) -> Self {
        self.messenger_name = Some(name.into());
        self.messenger_designation = Some(designation.into());
        self.messenger_mobile = Some(mobile.into());
        self
    }

    /// The full gate identifier, present only when both halves are.
    pub fn gate_id(&self) -> Option<GateId> {
        match (self.category, self.gate) {
            (Some(category), Some(gate)) => Some(GateId { category, gate }),
            _ => None,
        }
    }
}

/// A stored record together with its store-assigned id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassEntry {
    pub id: EntryId,
    #[serde(flatten)]
    pub record: PassRecord,
}

impl PassEntry {
    pub fn new(id: impl Into<String>, record: PassRecord) -> Self {
        Self {
            id: EntryId::new(id),
            record,
        }
    }

    pub fn gate_id(&self) -> Option<GateId> {
        self.record.gate_id()
    }

    pub fn pass_count(&self) -> i64 {
        self.record.pass_count
    }
}
