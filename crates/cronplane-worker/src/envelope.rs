use serde::Deserialize;

/// The opaque envelope carried by the durable queue. The worker only
/// requires `detail-type` and `detail`; everything else in the message is
/// ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub detail: serde_json::Value,
}
