pub mod option;

use serde::{Deserialize, Deserializer, Serializer};
use time::{
	OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
	macros::format_description,
};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	parse(&raw).map_err(serde::de::Error::custom)
}

/// RFC 3339, or an ISO 8601 local timestamp without offset, which is read as UTC.
///
/// Conversation exports often carry the offset-less form, e.g. `2024-03-01T12:00:00.123456`.
pub fn parse(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
	let raw = raw.trim();

	OffsetDateTime::parse(raw, &Rfc3339).or_else(|err| {
		PrimitiveDateTime::parse(
			raw,
			format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
		)
		.map(PrimitiveDateTime::assume_utc)
		.map_err(|_| err)
	})
}
