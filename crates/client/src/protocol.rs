//! Wire protocol for the prediction transport.
//!
//! The transport is duplex and named-event: requests go out as
//! `send_message`, responses come back as `receive_message`. Field names
//! follow the backend's legacy casing (`inputType`, `unique_Id`), pinned
//! here with serde renames so the rest of the crate can use Rust names.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ghostline_engine::{EditClass, PredictionResponse};

/// Outbound event name.
pub const SEND_EVENT: &str = "send_message";
/// Inbound event name.
pub const RECEIVE_EVENT: &str = "receive_message";

/// Static identity fields attached to every outbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentity {
	/// Application version reported to the backend.
	pub app_version: String,
	/// Authenticated user email, empty when signed out.
	pub user_email: String,
}

/// A prediction request, owned until a matching response arrives or a
/// newer request supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
	/// Fresh id for staleness checks.
	pub id: Uuid,
	/// Buffer text before the cursor.
	pub prefix: String,
	/// Buffer text after the cursor.
	pub suffix: String,
	/// Document language id.
	pub language: String,
	/// The edit classification that triggered this request.
	pub action: EditClass,
	/// Seconds since the Unix epoch at issue time.
	pub timestamp: u64,
}

impl PredictionRequest {
	/// Builds the wire message for this request.
	pub fn to_wire(&self, identity: &ClientIdentity) -> SendMessage {
		SendMessage {
			prefix: self.prefix.clone(),
			suffix: self.suffix.clone(),
			input_type: self.action.as_str().to_string(),
			uuid: self.id.to_string(),
			language: self.language.clone(),
			app_version: identity.app_version.clone(),
			user_email: identity.user_email.clone(),
			timestamp: self.timestamp,
		}
	}
}

/// Outbound `send_message` payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SendMessage {
	/// Text before the cursor.
	pub prefix: String,
	/// Text after the cursor.
	pub suffix: String,
	/// Edit classification.
	#[serde(rename = "inputType")]
	pub input_type: String,
	/// Request id.
	pub uuid: String,
	/// Document language id.
	pub language: String,
	/// Client application version.
	#[serde(rename = "appVersion")]
	pub app_version: String,
	/// Authenticated user email.
	#[serde(rename = "userEmail")]
	pub user_email: String,
	/// Seconds since the Unix epoch.
	pub timestamp: u64,
}

/// Inbound `receive_message` payload: either a completion or a rate-limit
/// signal. The two shapes share no fields, so untagged deserialization is
/// unambiguous.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReceiveMessage {
	/// The backend is rate limiting this client.
	RateLimit {
		/// Always true in this variant.
		#[serde(rename = "isRateLimit")]
		is_rate_limit: bool,
		/// Optional human-readable explanation.
		#[serde(rename = "rateLimitResponse", default)]
		rate_limit_response: Option<String>,
		/// Cooldown in seconds.
		#[serde(rename = "rateLimitTime")]
		rate_limit_time: u64,
	},
	/// A completion result.
	Completion {
		/// Primary suggestion.
		message: String,
		/// Alternative candidates.
		#[serde(default)]
		message_list: Vec<String>,
		/// Echoed request id.
		#[serde(rename = "unique_Id")]
		unique_id: String,
	},
}

impl ReceiveMessage {
	/// Converts the wire message into the engine's response type.
	///
	/// A malformed echoed id becomes `None` and is dropped by the
	/// staleness check downstream.
	pub fn into_response(self) -> PredictionResponse {
		match self {
			ReceiveMessage::RateLimit {
				rate_limit_time, ..
			} => PredictionResponse {
				id: None,
				message: String::new(),
				message_list: Vec::new(),
				rate_limit: Some(rate_limit_time),
			},
			ReceiveMessage::Completion {
				message,
				message_list,
				unique_id,
			} => PredictionResponse {
				id: Uuid::parse_str(&unique_id).ok(),
				message,
				message_list,
				rate_limit: None,
			},
		}
	}
}
