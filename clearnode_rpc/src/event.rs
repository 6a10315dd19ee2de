//! Pure translation of relay event names, channel statuses and state intents
//! into the normalized execution vocabulary consumed by the surrounding
//! kernel. Nothing here fails: unrecognized input maps to a conservative
//! non-terminal `Unknown`.

use {
    crate::domain::{ChannelStatus, StateIntent},
    serde::{Deserialize, Serialize},
};

/// Normalized execution status of an intent or channel event.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    Unknown,
    ChannelOpening,
    ChannelActive,
    ChannelDisputed,
    ChannelUpdated,
    ChannelClosed,
    Quoted,
    Executing,
    Settling,
    Settled,
    Aborted,
    Expired,
}

impl ExecutionStatus {
    /// Whether the status ends the lifecycle of an intent.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Aborted | Self::Expired)
    }
}

/// A relay event translated into the normalized vocabulary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedEvent {
    pub status: ExecutionStatus,
    pub is_terminal: bool,
}

impl From<ExecutionStatus> for MappedEvent {
    fn from(status: ExecutionStatus) -> Self {
        Self {
            status,
            is_terminal: status.is_terminal(),
        }
    }
}

/// Maps a relay event name to its execution status.
pub fn map_event_name(name: &str) -> MappedEvent {
    let status = match name {
        "solver_quoted" | "quote_accepted" => ExecutionStatus::Quoted,
        "execution_started" | "routing_started" => ExecutionStatus::Executing,
        "settlement_submitted" => ExecutionStatus::Settling,
        "settled" | "settlement_finalized" => ExecutionStatus::Settled,
        "failed" | "canceled" => ExecutionStatus::Aborted,
        "expired" => ExecutionStatus::Expired,
        "created" | "joined" => ExecutionStatus::ChannelOpening,
        "opened" => ExecutionStatus::ChannelActive,
        "challenged" => ExecutionStatus::ChannelDisputed,
        "checkpointed" | "resized" => ExecutionStatus::ChannelUpdated,
        "closed" => ExecutionStatus::ChannelClosed,
        _ => ExecutionStatus::Unknown,
    };

    status.into()
}

/// Maps a raw channel status string to the normalized enum. Unknown statuses
/// map to [`ChannelStatus::Void`].
pub fn map_channel_status(raw: &str) -> ChannelStatus {
    raw.parse().unwrap_or(ChannelStatus::Void)
}

/// Maps a raw state-intent string to the normalized enum. Unknown intents map
/// to [`StateIntent::Operate`].
pub fn map_state_intent(raw: &str) -> StateIntent {
    raw.parse().unwrap_or(StateIntent::Operate)
}

#[cfg(test)]
mod tests {
    use {super::*, rand::Rng};

    #[test]
    fn event_name_mapping() {
        let expectations = [
            ("solver_quoted", ExecutionStatus::Quoted, false),
            ("quote_accepted", ExecutionStatus::Quoted, false),
            ("execution_started", ExecutionStatus::Executing, false),
            ("routing_started", ExecutionStatus::Executing, false),
            ("settlement_submitted", ExecutionStatus::Settling, false),
            ("settled", ExecutionStatus::Settled, true),
            ("settlement_finalized", ExecutionStatus::Settled, true),
            ("failed", ExecutionStatus::Aborted, true),
            ("canceled", ExecutionStatus::Aborted, true),
            ("expired", ExecutionStatus::Expired, true),
            ("created", ExecutionStatus::ChannelOpening, false),
            ("joined", ExecutionStatus::ChannelOpening, false),
            ("opened", ExecutionStatus::ChannelActive, false),
            ("challenged", ExecutionStatus::ChannelDisputed, false),
            ("checkpointed", ExecutionStatus::ChannelUpdated, false),
            ("resized", ExecutionStatus::ChannelUpdated, false),
            ("closed", ExecutionStatus::ChannelClosed, false),
        ];

        for (name, status, terminal) in expectations {
            let mapped = map_event_name(name);

            assert_eq!(mapped.status, status, "event {name}");
            assert_eq!(mapped.is_terminal, terminal, "event {name}");
        }
    }

    #[test]
    fn unknown_events_are_non_terminal() {
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let len = rng.gen_range(1..24);
            let name: String = (0..len)
                .map(|_| char::from(rng.gen_range(b'g'..=b'z')))
                .collect();

            let mapped = map_event_name(&name);

            assert_eq!(mapped.status, ExecutionStatus::Unknown);
            assert!(!mapped.is_terminal);
        }
    }

    #[test]
    fn channel_status_mapping() {
        assert_eq!(map_channel_status("active"), ChannelStatus::Active);
        assert_eq!(map_channel_status("ACTIVE"), ChannelStatus::Active);
        assert_eq!(map_channel_status("dispute"), ChannelStatus::Dispute);
        assert_eq!(map_channel_status("final"), ChannelStatus::Final);
        assert_eq!(map_channel_status("initial"), ChannelStatus::Initial);
        assert_eq!(map_channel_status("nonsense"), ChannelStatus::Void);
    }

    #[test]
    fn state_intent_mapping() {
        assert_eq!(map_state_intent("initialize"), StateIntent::Initialize);
        assert_eq!(map_state_intent("operate"), StateIntent::Operate);
        assert_eq!(map_state_intent("resize"), StateIntent::Resize);
        assert_eq!(map_state_intent("finalize"), StateIntent::Finalize);
        assert_eq!(map_state_intent("nonsense"), StateIntent::Operate);
    }

    #[test]
    fn terminal_statuses() {
        for status in [
            ExecutionStatus::Settled,
            ExecutionStatus::Aborted,
            ExecutionStatus::Expired,
        ] {
            assert!(status.is_terminal());
        }

        for status in [
            ExecutionStatus::Unknown,
            ExecutionStatus::Quoted,
            ExecutionStatus::Executing,
            ExecutionStatus::Settling,
            ExecutionStatus::ChannelOpening,
            ExecutionStatus::ChannelActive,
            ExecutionStatus::ChannelDisputed,
            ExecutionStatus::ChannelUpdated,
            ExecutionStatus::ChannelClosed,
        ] {
            assert!(!status.is_terminal());
        }
    }
}
