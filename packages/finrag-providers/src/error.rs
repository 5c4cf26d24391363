pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	pub(crate) fn response(message: impl Into<String>) -> Self {
		Self::InvalidResponse { message: message.into() }
	}

	/// Upstream HTTP status, when the gateway answered at all.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Reqwest(err) => err.status().map(|status| status.as_u16()),
			_ => None,
		}
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Self::Reqwest(err) if err.is_timeout())
	}
}
