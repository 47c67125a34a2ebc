//! Session signature: a content fingerprint of an event's rule configuration.
//!
//! Two events that a driver would experience as "the same race" hash to the
//! same signature, whatever their ids, titles or the order their car classes
//! were entered in. Durations are bucketed so that 40 and 41 minute templates
//! collide. The policy layer uses this to throttle farming of templated
//! events.

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::domain::{Event, EventRules, SignatureStamp};

/// Bumped whenever the canonical encoding changes. Stored next to every
/// persisted hash so stale rows can be re-derived.
pub const SIGNATURE_VERSION: u32 = 1;

/// Coarse duration class used in the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationBucket {
    Short,
    Medium,
    Long,
    Endurance,
    Ultra,
}

impl DurationBucket {
    pub fn of(minutes: u32) -> Self {
        match minutes {
            0..15 => DurationBucket::Short,
            15..30 => DurationBucket::Medium,
            30..60 => DurationBucket::Long,
            60..120 => DurationBucket::Endurance,
            _ => DurationBucket::Ultra,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DurationBucket::Short => "short",
            DurationBucket::Medium => "medium",
            DurationBucket::Long => "long",
            DurationBucket::Endurance => "endurance",
            DurationBucket::Ultra => "ultra",
        }
    }
}

fn enum_label<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn canonical_fields(rules: &EventRules) -> BTreeMap<&'static str, Value> {
    let mut classes: Vec<String> = rules
        .car_classes
        .iter()
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    classes.sort();
    classes.dedup();

    let mut fields = BTreeMap::new();
    fields.insert("v", json!(SIGNATURE_VERSION));
    fields.insert("source", enum_label(&rules.source));
    fields.insert("format", enum_label(&rules.format));
    fields.insert("schedule", enum_label(&rules.schedule));
    fields.insert(
        "duration_bucket",
        json!(DurationBucket::of(rules.duration_minutes).as_str()),
    );
    fields.insert("class_count", json!(classes.len()));
    fields.insert("car_classes", json!(classes));
    fields.insert("damage", json!(rules.damage_enabled));
    fields.insert("penalties", json!(rules.penalties_enabled));
    fields.insert("fuel", json!(rules.fuel_consumption));
    fields.insert("tires", json!(rules.tire_wear));
    fields.insert("weather", json!(rules.dynamic_weather));
    fields.insert("night", json!(rules.night));
    fields.insert("team", json!(rules.team_event));
    fields.insert("official", json!(rules.official));
    fields.insert("track_type", enum_label(&rules.track_type));
    fields.insert("surface_type", enum_label(&rules.surface_type));
    fields
}

/// Canonical, order-independent encoding fed to the digest.
pub fn canonical_encoding(rules: &EventRules) -> String {
    canonical_fields(rules)
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// 64 hex character SHA-256 signature of the event's rule configuration.
pub fn signature(event: &Event) -> String {
    let digest = Sha256::digest(canonical_encoding(&event.rules).as_bytes());
    hex::encode(digest)
}

/// Signature plus provenance, ready to be stamped onto a completion.
pub fn stamp(event: &Event) -> SignatureStamp {
    SignatureStamp {
        event_id: event.id,
        signature: signature(event),
        version: SIGNATURE_VERSION,
    }
}
