use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;

/// Timestamp carried by the appliance as microseconds since the Unix epoch
/// (`expirationMicros`, `lastUpdateMicros`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Micros(pub DateTime<Utc>);

impl Micros {
    /// Create a timestamp from microseconds since the epoch
    pub fn from_micros(micros: i64) -> Option<Self> {
        Utc.timestamp_micros(micros).single().map(Micros)
    }

    /// Microseconds since the epoch
    pub fn as_micros(&self) -> i64 {
        self.0.timestamp_micros()
    }
}

impl Deref for Micros {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DateTime<Utc>> for Micros {
    fn from(dt: DateTime<Utc>) -> Self {
        Micros(dt)
    }
}

impl From<Micros> for DateTime<Utc> {
    fn from(t: Micros) -> Self {
        t.0
    }
}

impl Serialize for Micros {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.as_micros())
    }
}

impl<'de> Deserialize<'de> for Micros {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Some endpoints quote large integers
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        let micros = match Raw::deserialize(deserializer)? {
            Raw::Int(v) => v,
            Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom)?,
        };
        Micros::from_micros(micros)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", micros)))
    }
}
