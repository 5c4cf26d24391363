use serde::{Deserialize as _, Deserializer, Serializer};
use time::OffsetDateTime;

pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match value {
		Some(value) => crate::time_serde::serialize(value, serializer),
		None => serializer.serialize_none(),
	}
}

/// Missing, null and blank timestamps are all `None`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = Option::<String>::deserialize(deserializer)?;

	match raw.as_deref().map(str::trim) {
		None | Some("") => Ok(None),
		Some(value) => crate::time_serde::parse(value).map(Some).map_err(serde::de::Error::custom),
	}
}
