use thiserror::Error;

use crate::models::domain::Item;

/// Errors raised while validating an inbound broker message.
///
/// Validation happens before the delivery is acknowledged, so a malformed
/// payload can be rejected to a dead-letter queue instead of being lost.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid item payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("item {0} has no location data")]
    MissingLocation(String),
}

/// Parse and validate one "item reported" message body.
///
/// Required fields are enforced by the `Item` schema; on top of that the
/// location must carry at least one part, since an item with no location at
/// all can never be scored.
pub fn parse_item_message(payload: &[u8]) -> Result<Item, MessageError> {
    let item: Item = serde_json::from_slice(payload)?;
    if item.location.is_empty() {
        return Err(MessageError::MissingLocation(item.id));
    }
    Ok(item)
}
