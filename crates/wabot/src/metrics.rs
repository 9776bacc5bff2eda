/// Event counters.
pub mod counters {
    /// Record one routed event with its tag label.
    pub fn events_routed_total(tag: &'static str) {
        metrics::counter!("wabot_events_routed_total", "tag" => tag).increment(1);
    }

    /// Increment the filtered control-envelope counter.
    pub fn envelopes_filtered_total() {
        metrics::counter!("wabot_envelopes_filtered_total").increment(1);
    }

    /// Record an event whose processing failed, with the given kind label.
    pub fn event_failures_total(kind: &'static str) {
        metrics::counter!("wabot_event_failures_total", "kind" => kind).increment(1);
    }

    /// Increment the session reopen counter.
    pub fn reconnects_total() {
        metrics::counter!("wabot_reconnects_total").increment(1);
    }

    /// Increment the startup announcement counter.
    pub fn announcements_sent_total() {
        metrics::counter!("wabot_announcements_sent_total").increment(1);
    }

    /// Record a status interaction with the given action label.
    pub fn status_interactions_total(action: &'static str) {
        metrics::counter!("wabot_status_interactions_total", "action" => action).increment(1);
    }

    /// Record an auto-reaction or auto-read on an ordinary message.
    pub fn message_interactions_total(action: &'static str) {
        metrics::counter!("wabot_message_interactions_total", "action" => action).increment(1);
    }
}
