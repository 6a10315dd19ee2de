use {
    crate::new_type,
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};
pub use alloy_primitives::{hex, Address, B256, U256};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,

    #[error("Amount is not a base-10 unsigned integer: {0}")]
    Digits(String),

    #[error("Amount does not fit into 256 bits: {0}")]
    Overflow(String),
}

/// Structural problems of a [`Channel`] value.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InvalidChannel {
    #[error("Channel ID is empty")]
    EmptyId,

    #[error("Channel has no allocations")]
    NoAllocations,

    #[error("Channel token address is zero")]
    ZeroToken,

    #[error("Allocation amount is invalid: {0}")]
    Amount(#[from] AmountError),
}

new_type!(
    #[doc = "Opaque channel identifier assigned by the ClearNode."]
    #[as_ref(forward)]
    #[from(forward)]
    ChannelId: Arc<str>
);

new_type!(
    #[doc = "Identifier of a solver bidding on an intent."]
    #[as_ref(forward)]
    #[from(forward)]
    SolverId: Arc<str>
);

new_type!(
    #[doc = "Identifier of a submitted cross-chain intent."]
    #[as_ref(forward)]
    #[from(forward)]
    IntentId: Arc<str>
);

new_type!(
    #[doc = "Token amount as a base-10 decimal string."]
    #[doc = ""]
    #[doc = "Amounts cross the module boundary as strings so that every public"]
    #[doc = "value is losslessly JSON-encodable; [`Amount::parse`] recovers the"]
    #[doc = "arbitrary-precision integer."]
    #[as_ref(forward)]
    #[from(forward)]
    Amount: Arc<str>
);

impl Amount {
    pub fn zero() -> Self {
        Self(Arc::from("0"))
    }

    pub fn from_u256(value: U256) -> Self {
        Self(value.to_string().into())
    }

    pub fn parse(&self) -> Result<U256, AmountError> {
        let raw = self.0.as_ref();

        if raw.is_empty() {
            return Err(AmountError::Empty);
        }

        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Digits(raw.to_owned()));
        }

        U256::from_str_radix(raw, 10).map_err(|_| AmountError::Overflow(raw.to_owned()))
    }
}

/// Status of a channel as tracked on-chain and mirrored by the ClearNode.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ChannelStatus {
    Void,
    Initial,
    Active,
    Dispute,
    Final,
}

/// The purpose of a channel state update.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StateIntent {
    Initialize,
    Operate,
    Resize,
    Finalize,
}

/// A single balance entry of a channel state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    /// Address the funds are allocated to.
    pub destination: Address,

    /// Token the allocation is denominated in.
    pub token: Address,

    /// Allocated amount as a decimal string.
    pub amount: Amount,
}

/// An off-chain payment channel with on-chain collateral.
///
/// Values handed to callers always satisfy [`Channel::validate`]: a non-empty
/// id, at least one allocation and a non-zero token address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub channel_id: ChannelId,
    pub status: ChannelStatus,
    pub allocations: Vec<Allocation>,
    pub token: Address,
    pub chain_id: u64,

    /// Hash of the most recent on-chain transaction touching this channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

impl Channel {
    /// Checks the structural invariant every publicly visible channel upholds.
    pub fn validate(&self) -> Result<(), InvalidChannel> {
        if self.channel_id.as_ref().is_empty() {
            return Err(InvalidChannel::EmptyId);
        }

        if self.allocations.is_empty() {
            return Err(InvalidChannel::NoAllocations);
        }

        if self.token == Address::ZERO {
            return Err(InvalidChannel::ZeroToken);
        }

        for allocation in &self.allocations {
            allocation.amount.parse()?;
        }

        Ok(())
    }

    /// Sums the allocations owned by `destination`.
    pub fn allocation_of(&self, destination: Address) -> Result<U256, AmountError> {
        let mut total = U256::ZERO;

        for allocation in &self.allocations {
            if allocation.destination == destination {
                total = total.saturating_add(allocation.amount.parse()?);
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod test {
    use {super::*, rand::Rng};

    fn sample_channel(rng: &mut impl Rng) -> Channel {
        let token = Address::random();
        let allocations = (0..rng.gen_range(1..4usize))
            .map(|_| Allocation {
                destination: Address::random(),
                token,
                amount: Amount::from_u256(U256::from(rng.gen::<u128>())),
            })
            .collect();

        Channel {
            channel_id: format!("0x{:032x}", rng.gen::<u128>()).into(),
            status: *[
                ChannelStatus::Void,
                ChannelStatus::Initial,
                ChannelStatus::Active,
                ChannelStatus::Dispute,
                ChannelStatus::Final,
            ]
            .iter()
            .nth(rng.gen_range(0..5))
            .unwrap(),
            allocations,
            token,
            chain_id: rng.gen_range(1..100_000),
            tx_hash: rng.gen::<bool>().then(|| B256::random()),
        }
    }

    #[test]
    fn amount_parsing() {
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let value = U256::from(rng.gen::<u128>());
            let amount = Amount::from_u256(value);

            assert_eq!(amount.parse().unwrap(), value);
        }

        assert_eq!(Amount::from("").parse(), Err(AmountError::Empty));
        assert!(matches!(
            Amount::from("-5").parse(),
            Err(AmountError::Digits(_))
        ));
        assert!(matches!(
            Amount::from("1.5").parse(),
            Err(AmountError::Digits(_))
        ));
        assert!(matches!(
            Amount::from("0xff").parse(),
            Err(AmountError::Digits(_))
        ));
    }

    #[test]
    fn channel_structural_invariant() {
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            assert_eq!(sample_channel(&mut rng).validate(), Ok(()));
        }

        let valid = sample_channel(&mut rng);

        let empty_id = Channel {
            channel_id: "".into(),
            ..valid.clone()
        };
        assert_eq!(empty_id.validate(), Err(InvalidChannel::EmptyId));

        let no_allocations = Channel {
            allocations: vec![],
            ..valid.clone()
        };
        assert_eq!(no_allocations.validate(), Err(InvalidChannel::NoAllocations));

        let zero_token = Channel {
            token: Address::ZERO,
            ..valid
        };
        assert_eq!(zero_token.validate(), Err(InvalidChannel::ZeroToken));
    }

    #[test]
    fn channel_serde_round_trip() {
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let channel = sample_channel(&mut rng);
            let encoded = serde_json::to_string(&channel).unwrap();
            let decoded: Channel = serde_json::from_str(&encoded).unwrap();

            assert_eq!(channel, decoded);
        }
    }

    #[test]
    fn status_encoding() {
        assert_eq!(
            serde_json::to_string(&ChannelStatus::Dispute).unwrap(),
            r#""dispute""#
        );
        assert_eq!(
            serde_json::from_str::<ChannelStatus>(r#""final""#).unwrap(),
            ChannelStatus::Final
        );
        assert_eq!(
            serde_json::to_string(&StateIntent::Finalize).unwrap(),
            r#""finalize""#
        );
    }

    #[test]
    fn allocation_sums_per_destination() {
        let destination = Address::random();
        let token = Address::random();

        let channel = Channel {
            channel_id: "ch-1".into(),
            status: ChannelStatus::Active,
            allocations: vec![
                Allocation {
                    destination,
                    token,
                    amount: "100".into(),
                },
                Allocation {
                    destination: Address::random(),
                    token,
                    amount: "50".into(),
                },
                Allocation {
                    destination,
                    token,
                    amount: "7".into(),
                },
            ],
            token,
            chain_id: 1,
            tx_hash: None,
        };

        assert_eq!(channel.allocation_of(destination).unwrap(), U256::from(107));
        assert_eq!(
            channel.allocation_of(Address::ZERO).unwrap(),
            U256::ZERO
        );
    }
}
