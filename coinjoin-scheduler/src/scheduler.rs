//! The phase loop (spec.md \S4.1).
//!
//! Grounded on `rusty-node/src/main.rs`'s `tokio::select!`-over-shutdown
//! pattern, generalized from "one global shutdown signal" to two
//! composed `CancellationToken`s: `run`'s caller-supplied token ends the
//! whole loop, while a per-phase token lets `advance_phase` cut a
//! single wait short without touching the other.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use coinjoin_core::anonymity::{calculate_anonymity_target, seed_input_registration_duration};
use coinjoin_core::denomination::{calculate_denomination_sat, ExchangeRateSource};
use coinjoin_core::error::Result;
use coinjoin_core::fee::{calculate_fees, FeeRateSource, Fees};
use coinjoin_core::round::RoundParams;
use coinjoin_core::{Config, CoreError, Phase, PhaseBroadcaster, PhaseEvent, RoundState};
use coinjoin_types::Amount;
use rand::rngs::OsRng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A token cancelled when either of two independent tokens is, for as
/// long as this guard is held. Used so the external calculator calls
/// in `enter_input_registration` are bounded by both the global
/// shutdown signal and the current phase's early-advance signal
/// (spec.md \S5: "both cancel sources are observable by all timed
/// waits"), without either token needing to be the other's parent.
struct MergedCancel {
    token: CancellationToken,
    watcher: tokio::task::JoinHandle<()>,
}

impl MergedCancel {
    fn new(a: &CancellationToken, b: &CancellationToken) -> Self {
        let token = CancellationToken::new();
        let guard = token.clone();
        let a = a.clone();
        let b = b.clone();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                _ = a.cancelled() => {}
                _ = b.cancelled() => {}
            }
            guard.cancel();
        });
        MergedCancel { token, watcher }
    }
}

impl Drop for MergedCancel {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Owns the shared round and drives it through the four phases,
/// forever, until cancelled. Request handlers (spec.md \S4.2) hold
/// their own `Arc<RoundState>` clone obtained from `round()` and never
/// touch this struct.
pub struct PhaseScheduler {
    config: Config,
    round: Arc<RoundState>,
    broadcaster: PhaseBroadcaster,
    fee_source: Arc<dyn FeeRateSource>,
    rate_source: Arc<dyn ExchangeRateSource>,
    phase_cancel: Mutex<CancellationToken>,
    previous_fees: Mutex<Option<Fees>>,
    previous_denomination_sat: Mutex<Option<u64>>,
}

impl PhaseScheduler {
    pub fn new(
        config: Config,
        broadcaster: PhaseBroadcaster,
        fee_source: Arc<dyn FeeRateSource>,
        rate_source: Arc<dyn ExchangeRateSource>,
    ) -> Self {
        PhaseScheduler {
            config,
            round: Arc::new(RoundState::new()),
            broadcaster,
            fee_source,
            rate_source,
            phase_cancel: Mutex::new(CancellationToken::new()),
            previous_fees: Mutex::new(None),
            previous_denomination_sat: Mutex::new(None),
        }
    }

    /// The shared round state. Clone this `Arc` into request handlers;
    /// every read and every registration call goes straight through it.
    pub fn round(&self) -> Arc<RoundState> {
        self.round.clone()
    }

    /// Cuts the current phase's wait short. Has no effect if called
    /// between phases (the token it would cancel has already been
    /// replaced).
    pub fn advance_phase(&self) {
        self.phase_cancel.lock().unwrap().cancel();
    }

    /// Runs rounds back-to-back until `cancel` fires. A round that
    /// errors out is logged as a `SchedulerFault` and the loop moves on
    /// to the next round rather than unwinding — spec.md \S7 treats any
    /// uncaught failure inside the loop this way.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("phase scheduler starting");
        while !cancel.is_cancelled() {
            if let Err(e) = self.run_round(&cancel).await {
                let fault = CoreError::SchedulerFault(e.to_string());
                error!("round {} aborted: {fault}", self.round.round_id());
                self.round.set_fallback(true);
            }
        }
        info!("phase scheduler stopped");
    }

    async fn run_round(&self, cancel: &CancellationToken) -> Result<()> {
        self.enter_input_registration(cancel).await?;
        if !self.enter_connection_confirmation(cancel).await? {
            return Ok(());
        }
        self.enter_output_registration(cancel).await;
        self.enter_signing(cancel).await;
        Ok(())
    }

    async fn enter_input_registration(&self, cancel: &CancellationToken) -> Result<()> {
        let fallback = self.round.fallback();
        let (previous_target, previous_duration) = if self.round.round_id() == 0 {
            (self.config.minimum_anonymity_set, seed_input_registration_duration(&self.config))
        } else {
            (self.round.anonymity_target(), self.round.input_registration_duration())
        };
        let anonymity_target = calculate_anonymity_target(&self.config, previous_target, previous_duration);

        let phase_cancel = self.start_phase_wait();
        let setup_cancel = MergedCancel::new(cancel, &phase_cancel);

        let previous_denomination = *self.previous_denomination_sat.lock().unwrap();
        let denomination_sat = calculate_denomination_sat(
            &self.config,
            self.rate_source.as_ref(),
            previous_denomination,
            setup_cancel.token.clone(),
        )
        .await?;
        *self.previous_denomination_sat.lock().unwrap() = Some(denomination_sat);

        let previous_fees = *self.previous_fees.lock().unwrap();
        let fees =
            calculate_fees(&self.config, self.fee_source.as_ref(), previous_fees, setup_cancel.token.clone()).await?;
        *self.previous_fees.lock().unwrap() = Some(fees);
        drop(setup_cancel);

        let params = RoundParams {
            denomination: Amount::from_sat(denomination_sat),
            fee_per_input: Amount::from_sat(fees.fee_per_input_sat),
            fee_per_output: Amount::from_sat(fees.fee_per_output_sat),
            anonymity_target,
        };

        let round_id = self.round.begin_round(params, fallback);
        self.round.set_accepting(true);
        self.publish(Phase::InputRegistration, round_id, "input registration open");
        info!(round_id, anonymity_target, denomination_sat, "entered InputRegistration");

        let start = Instant::now();
        self.wait_out_phase(cancel, Duration::from_secs(self.config.input_registration_phase_timeout_seconds))
            .await;
        if !fallback {
            self.round.set_input_registration_duration(start.elapsed());
        }
        Ok(())
    }

    /// Returns `true` if the round advances to `OutputRegistration`,
    /// `false` if it falls back to a fresh `InputRegistration`.
    async fn enter_connection_confirmation(&self, cancel: &CancellationToken) -> Result<bool> {
        // `accepting` stays false for this phase: spec.md \S8's invariant only
        // allows it true for InputRegistration, OutputRegistration, or a
        // populated Signing, and `confirm_connection` (round.rs) never checks
        // it anyway.
        self.round.set_phase(Phase::ConnectionConfirmation);
        self.publish(Phase::ConnectionConfirmation, self.round.round_id(), "connection confirmation open");
        info!(round_id = self.round.round_id(), "entered ConnectionConfirmation");

        self.wait_out_phase(cancel, Duration::from_secs(self.config.connection_confirmation_phase_timeout_seconds))
            .await;

        if self.round.all_a_confirmed() {
            Ok(true)
        } else {
            warn!(round_id = self.round.round_id(), "not every A-entry confirmed; falling back");
            self.round.set_fallback(true);
            Ok(false)
        }
    }

    /// Never falls back (spec.md \S4.1): whatever B-entries registered
    /// in the time given are what the coin-join gets built from.
    async fn enter_output_registration(&self, cancel: &CancellationToken) {
        self.round.set_phase(Phase::OutputRegistration);
        self.round.set_accepting(true);
        self.publish(Phase::OutputRegistration, self.round.round_id(), "output registration open");
        info!(round_id = self.round.round_id(), "entered OutputRegistration");

        self.wait_out_phase(cancel, Duration::from_secs(self.config.output_registration_phase_timeout_seconds))
            .await;
    }

    async fn enter_signing(&self, cancel: &CancellationToken) {
        self.round.set_phase(Phase::Signing);
        self.round.build_and_store_coin_join(&mut OsRng);
        self.round.set_accepting(true);
        self.publish(Phase::Signing, self.round.round_id(), "signing open");
        info!(round_id = self.round.round_id(), "entered Signing");

        self.wait_out_phase(cancel, Duration::from_secs(self.config.signing_phase_timeout_seconds)).await;

        if self.round.fully_signed() {
            self.round.set_fallback(false);
        } else {
            warn!(round_id = self.round.round_id(), "not every input signed; falling back");
            self.round.set_fallback(true);
        }
        // A round that leaves Signing clears the coin-join regardless of
        // outcome (spec.md \S3): the next InputRegistration starts clean.
        self.round.clear_coin_join();
    }

    /// Installs a fresh per-phase cancellation token and returns it so
    /// the external calculators can be aborted by the same signal that
    /// ends the phase's wait.
    fn start_phase_wait(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.phase_cancel.lock().unwrap() = token.clone();
        token
    }

    /// Sleeps for `timeout` unless the global `cancel` or the
    /// phase-local token (`advance_phase`) fires first.
    async fn wait_out_phase(&self, cancel: &CancellationToken, timeout: Duration) {
        let phase_cancel = self.start_phase_wait();
        tokio::select! {
            _ = sleep(timeout) => {}
            _ = phase_cancel.cancelled() => {}
            _ = cancel.cancelled() => {}
        }
    }

    fn publish(&self, phase: Phase, round_id: u64, message: &str) {
        self.broadcaster.publish(PhaseEvent {
            new_phase: phase.as_str().to_string(),
            message: format!("round {round_id}: {message}"),
        });
    }
}
