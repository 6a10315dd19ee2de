use {
    super::{RelayUpdate, YellowProvider},
    crate::{
        error::{Fallback, FallbackReason},
        session::unix_now,
    },
    clearnode_rpc::{
        domain::{Channel, ChannelId, IntentId},
        intent::{ClearingResult, IntentParams, YellowQuote},
        rpc::{CreateChannel, Notification, SubmitIntent},
    },
    std::time::Duration,
    tokio::sync::broadcast,
};

impl YellowProvider {
    /// Executes a cross-chain intent end to end: finds or creates a channel
    /// for the source leg, routes the intent to solvers through it, and
    /// returns the normalized clearing result once the match settles.
    pub async fn execute_intent(&self, params: IntentParams) -> Result<ClearingResult, Fallback> {
        // Validation runs before any channel work.
        params.validate(unix_now()).map_err(Fallback::from)?;

        let source_chain = self.config.network_id(&params.source_chain).ok_or_else(|| {
            Fallback::new(
                FallbackReason::UnsupportedChain,
                format!("unknown source chain: {}", params.source_chain),
            )
        })?;

        self.config
            .network_id(&params.destination_chain)
            .ok_or_else(|| {
                Fallback::new(
                    FallbackReason::UnsupportedChain,
                    format!("unknown destination chain: {}", params.destination_chain),
                )
            })?;

        self.ready().await?;

        // Subscribe before submitting so no lifecycle update is missed.
        let mut updates = self.updates_tx.subscribe();

        let channel = self.route_channel(&params, source_chain).await?;

        let submitted = self
            .call(SubmitIntent {
                channel_id: channel.channel_id.clone(),
                intent: params.clone(),
            })
            .await?;

        let intent_id = submitted.intent_id;

        tracing::debug!(%intent_id, channel = %channel.channel_id, "intent submitted");

        let quote = self
            .await_quote(&mut updates, &intent_id, &channel.channel_id)
            .await?;

        self.await_clearing(
            &mut updates,
            &intent_id,
            &channel.channel_id,
            quote,
            params.deadline,
        )
        .await
    }

    async fn route_channel(
        &self,
        params: &IntentParams,
        chain_id: u64,
    ) -> Result<Channel, Fallback> {
        if let Some(channel) = self.channels.find_open(params.token_in, chain_id) {
            return Ok(channel);
        }

        let counterparty = self.session.clearnode_address().ok_or_else(|| {
            Fallback::new(
                FallbackReason::YellowAuthFailed,
                "no authenticated session to derive a counterparty from",
            )
        })?;

        self.create_channel(CreateChannel {
            chain_id,
            token: params.token_in,
            counterparty,
            initial_allocation: params.amount_in.clone(),
        })
        .await
    }

    /// Waits for a solver quote up to the configured quote timeout. A relay
    /// drop does not abort the wait: if the connection comes back before the
    /// timeout the wait resumes, and only a still-down relay at the deadline
    /// fails with YELLOW_UNAVAILABLE.
    async fn await_quote(
        &self,
        updates: &mut broadcast::Receiver<RelayUpdate>,
        intent_id: &IntentId,
        channel_id: &ChannelId,
    ) -> Result<YellowQuote, Fallback> {
        let deadline = tokio::time::Instant::now() + self.config.quote_timeout;
        let mut relay_down = false;

        loop {
            let update = match tokio::time::timeout_at(deadline, updates.recv()).await {
                Err(_) if relay_down => {
                    return Err(Fallback::new(
                        FallbackReason::YellowUnavailable,
                        "relay connection was lost and did not come back before the quote timeout",
                    ))
                }

                Err(_) => {
                    return Err(Fallback::new(
                        FallbackReason::NoSolverQuotes,
                        "no solver quote arrived within the quote timeout",
                    ))
                }

                Ok(update) => update,
            };

            match update {
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Fallback::new(
                        FallbackReason::YellowUnavailable,
                        "relay update stream closed",
                    ))
                }

                Err(broadcast::error::RecvError::Lagged(_)) => continue,

                Ok(RelayUpdate::Down) => relay_down = true,

                Ok(RelayUpdate::Connected) => relay_down = false,

                Ok(RelayUpdate::Notification(notification)) => {
                    if let Some(fallback) = intent_interruption(
                        &notification,
                        intent_id,
                        channel_id,
                        FallbackReason::NoSolverQuotes,
                    ) {
                        return Err(fallback);
                    }

                    if let Notification::SolverQuoted(update) = notification {
                        if &update.intent_id == intent_id {
                            return Ok(YellowQuote::from_update(update, unix_now()));
                        }
                    }
                }
            }
        }
    }

    /// Waits for the clearing confirmation up to the intent deadline. As in
    /// [`Self::await_quote`], a relay drop is survived as long as the
    /// connection is re-established before the deadline.
    async fn await_clearing(
        &self,
        updates: &mut broadcast::Receiver<RelayUpdate>,
        intent_id: &IntentId,
        channel_id: &ChannelId,
        quote: YellowQuote,
        deadline: u64,
    ) -> Result<ClearingResult, Fallback> {
        let mut relay_down = false;

        loop {
            let now = unix_now();

            if now >= deadline {
                return Err(deadline_fallback(relay_down));
            }

            let remaining = Duration::from_secs(deadline - now);

            let update = match tokio::time::timeout(remaining, updates.recv()).await {
                Err(_) => return Err(deadline_fallback(relay_down)),

                Ok(update) => update,
            };

            match update {
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Fallback::new(
                        FallbackReason::YellowUnavailable,
                        "relay update stream closed",
                    ))
                }

                Err(broadcast::error::RecvError::Lagged(_)) => continue,

                Ok(RelayUpdate::Down) => relay_down = true,

                Ok(RelayUpdate::Connected) => relay_down = false,

                Ok(RelayUpdate::Notification(notification)) => {
                    if let Some(fallback) = intent_interruption(
                        &notification,
                        intent_id,
                        channel_id,
                        FallbackReason::YellowTxFailed,
                    ) {
                        return Err(fallback);
                    }

                    if let Notification::Settled(update) = notification {
                        if &update.intent_id == intent_id {
                            return Ok(ClearingResult::from_settlement(
                                channel_id.clone(),
                                quote.clone(),
                                update,
                            ));
                        }
                    }
                }
            }
        }
    }
}

/// The failure reported when the intent deadline expires: YELLOW_TIMEOUT when
/// the relay was reachable, YELLOW_UNAVAILABLE when it was still down.
fn deadline_fallback(relay_down: bool) -> Fallback {
    if relay_down {
        Fallback::new(
            FallbackReason::YellowUnavailable,
            "relay connection was lost and did not come back before the intent deadline",
        )
    } else {
        Fallback::new(
            FallbackReason::YellowTimeout,
            "intent deadline passed before settlement",
        )
    }
}

/// Checks a notification for conditions that abort an in-flight intent: the
/// routing channel entering dispute, or a terminal failure for the intent
/// itself.
fn intent_interruption(
    notification: &Notification,
    intent_id: &IntentId,
    channel_id: &ChannelId,
    abort_reason: FallbackReason,
) -> Option<Fallback> {
    match notification {
        Notification::ChannelChallenged(channel) if &channel.channel_id == channel_id => {
            Some(Fallback::new(
                FallbackReason::YellowChannelDispute,
                "channel entered dispute while the intent was in flight",
            ))
        }

        Notification::IntentFailed(failure) if &failure.intent_id == intent_id => {
            Some(Fallback::new(
                abort_reason,
                failure
                    .reason
                    .clone()
                    .unwrap_or_else(|| "intent failed".to_owned()),
            ))
        }

        Notification::IntentExpired(failure) if &failure.intent_id == intent_id => {
            Some(Fallback::new(
                FallbackReason::YellowTimeout,
                failure
                    .reason
                    .clone()
                    .unwrap_or_else(|| "intent expired".to_owned()),
            ))
        }

        _ => None,
    }
}
