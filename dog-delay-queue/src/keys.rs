//! Store key namespace for one channel.
//!
//! These names are shared with every other engine speaking to the same
//! store, so they must not change.

/// Precomputed keys for a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelKeys {
    channel: String,
    pub message_id: String,
    pub messages: String,
    pub priority: String,
    pub delayed: String,
    pub reserved: String,
    pub attempts: String,
    pub moving_lock: String,
}

impl ChannelKeys {
    pub fn new(channel: impl Into<String>) -> Self {
        let channel = channel.into();
        Self {
            message_id: format!("{}.message_id", channel),
            messages: format!("{}.messages", channel),
            priority: format!("{}.priority", channel),
            delayed: format!("{}.delayed", channel),
            reserved: format!("{}.reserved", channel),
            attempts: format!("{}.attempts", channel),
            moving_lock: format!("{}.moving_lock", channel),
            channel,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Ready list of one lane
    pub fn waiting(&self, lane: &str) -> String {
        format!("{}.waiting.{}", self.channel, lane)
    }

    /// Prefix shared by every key of the channel
    pub fn prefix(&self) -> String {
        format!("{}.", self.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_stable() {
        let keys = ChannelKeys::new("mail");
        assert_eq!(keys.message_id, "mail.message_id");
        assert_eq!(keys.messages, "mail.messages");
        assert_eq!(keys.priority, "mail.priority");
        assert_eq!(keys.delayed, "mail.delayed");
        assert_eq!(keys.reserved, "mail.reserved");
        assert_eq!(keys.attempts, "mail.attempts");
        assert_eq!(keys.moving_lock, "mail.moving_lock");
        assert_eq!(keys.waiting("high"), "mail.waiting.high");
        assert_eq!(keys.prefix(), "mail.");
    }

    #[test]
    fn every_key_shares_the_prefix() {
        let keys = ChannelKeys::new("q");
        let prefix = keys.prefix();
        for key in [
            &keys.message_id,
            &keys.messages,
            &keys.priority,
            &keys.delayed,
            &keys.reserved,
            &keys.attempts,
            &keys.moving_lock,
        ] {
            assert!(key.starts_with(&prefix));
        }
        assert!(keys.waiting("low").starts_with(&prefix));
    }
}
