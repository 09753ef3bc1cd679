//! Wager settlement engine — placement, settlement, and withdrawal flows.
//!
//! The engine is the sole writer of wager and account state. Correctness
//! rests on two conditional writes: the ledger's debit gate (at most one
//! pending wager per account, never a negative balance) and the wager
//! store's pending-to-terminal transition (exactly one balance credit per
//! wager, no matter how many settlement triggers arrive).

pub mod outcome;
pub mod scheduler;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use crate::oracle::PriceOracle;
use crate::store::{AccountLedger, WagerStore, WithdrawalStore};
use crate::types::{
    Account, Direction, EngineEvent, NewWager, Settlement, Wager, WagerError, WagerStatus,
    WithdrawalRequest,
};

use outcome::OutcomeRules;
use scheduler::{ScheduleRequest, SettleWagers};

/// Engine policy knobs, assembled from configuration at startup.
#[derive(Debug, Clone)]
pub struct EngineRules {
    pub minimum_stake: i64,
    pub wager_duration: chrono::Duration,
    pub outcome: OutcomeRules,
    pub withdrawal_minimum: i64,
}

/// Orchestrates the wager lifecycle over the ledger, wager store,
/// withdrawal sub-ledger, oracle, and scheduler.
pub struct SettlementEngine {
    ledger: AccountLedger,
    wagers: WagerStore,
    withdrawals: WithdrawalStore,
    oracle: PriceOracle,
    rules: EngineRules,
    schedule_tx: mpsc::UnboundedSender<ScheduleRequest>,
    events: broadcast::Sender<EngineEvent>,
}

impl SettlementEngine {
    pub fn new(
        ledger: AccountLedger,
        wagers: WagerStore,
        withdrawals: WithdrawalStore,
        oracle: PriceOracle,
        rules: EngineRules,
        schedule_tx: mpsc::UnboundedSender<ScheduleRequest>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            ledger,
            wagers,
            withdrawals,
            oracle,
            rules,
            schedule_tx,
            events,
        }
    }

    /// Subscribe to placement, settlement, and withdrawal events. The
    /// chat layer renders these; each event carries everything needed
    /// so subscribers never re-query engine state.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Account snapshot for display, created on first contact.
    pub async fn account(&self, account_id: i64) -> Result<Account, WagerError> {
        self.ledger.get_or_create(account_id).await
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Place a wager: snapshot the entry price, debit the stake, persist
    /// the pending wager, and arm its settlement timer.
    pub async fn place_wager(
        &self,
        account_id: i64,
        instrument: &str,
        direction: Direction,
        stake: i64,
    ) -> Result<Wager, WagerError> {
        if stake < self.rules.minimum_stake {
            return Err(WagerError::StakeTooLow {
                stake,
                minimum: self.rules.minimum_stake,
            });
        }

        // Price first: an unreachable oracle must leave no trace.
        let quote = self.oracle.quote(instrument).await?;

        self.ledger.get_or_create(account_id).await?;
        let Some(account) = self.ledger.try_debit_and_lock(account_id, stake).await? else {
            // The gate rejects for exactly one of two reasons; re-read to
            // tell which.
            let current = self.ledger.get_or_create(account_id).await?;
            return Err(if current.active_wager {
                WagerError::WagerAlreadyActive(account_id)
            } else {
                WagerError::InsufficientBalance {
                    needed: stake,
                    available: current.balance,
                }
            });
        };

        let now = Utc::now();
        let new = NewWager {
            account_id,
            instrument: instrument.to_string(),
            direction,
            stake,
            entry_price: quote.price,
            placed_at: now,
            due_at: now + self.rules.wager_duration,
        };

        let wager = match self.wagers.create(&new).await {
            Ok(wager) => wager,
            Err(e) => {
                // Undo the debit so the account is not left short and locked.
                if let Err(refund) = self.ledger.credit_and_unlock(account_id, stake, false).await
                {
                    error!(
                        account_id,
                        stake,
                        error = %refund,
                        "Refund after failed wager insert also failed"
                    );
                }
                return Err(e);
            }
        };

        if self
            .schedule_tx
            .send(ScheduleRequest {
                wager_id: wager.id,
                due_at: wager.due_at,
            })
            .is_err()
        {
            // Scheduler gone; its sweep pass still settles the wager.
            warn!(wager_id = wager.id, "Schedule channel closed, deferring to sweep");
        }

        info!(
            account_id,
            wager_id = wager.id,
            instrument,
            direction = %direction,
            stake,
            entry_price = %wager.entry_price,
            balance = account.balance,
            "Wager placed"
        );

        let _ = self.events.send(EngineEvent::WagerPlaced {
            account_id,
            wager_id: wager.id,
            instrument: wager.instrument.clone(),
            direction,
            stake,
            entry_price: wager.entry_price,
            due_at: wager.due_at,
            balance_after: account.balance,
        });

        Ok(wager)
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Settle a wager. Safe to call any number of times: only the call
    /// that wins the pending-to-terminal transition credits the ledger,
    /// every other call reports the recorded outcome.
    pub async fn settle_wager(&self, wager_id: i64) -> Result<Settlement, WagerError> {
        let wager = self.wagers.require(wager_id).await?;

        if wager.is_settled() {
            let account = self.ledger.get_or_create(wager.account_id).await?;
            return Ok(recorded_settlement(&wager, account.balance));
        }

        let (status, exit_price, payout) = match self.oracle.quote(&wager.instrument).await {
            Ok(quote) => {
                let (status, payout) = self.rules.outcome.judge(
                    wager.direction,
                    wager.stake,
                    wager.entry_price,
                    quote.price,
                );
                (status, Some(quote.price), payout)
            }
            Err(e) => {
                // Refund in full rather than leave the account debited and
                // locked by an oracle outage.
                warn!(wager_id, error = %e, "Price unavailable at settlement, voiding");
                (WagerStatus::Voided, None, wager.stake)
            }
        };

        let Some(settled) = self
            .wagers
            .mark_settled(wager_id, status, exit_price, payout)
            .await?
        else {
            // A concurrent trigger won the transition and owns the credit.
            let current = self.wagers.require(wager_id).await?;
            let account = self.ledger.get_or_create(current.account_id).await?;
            return Ok(recorded_settlement(&current, account.balance));
        };

        let won = status == WagerStatus::Won;
        let account = self
            .ledger
            .credit_and_unlock(wager.account_id, payout, won)
            .await?;

        info!(
            account_id = wager.account_id,
            wager_id,
            status = %status,
            payout,
            balance = account.balance,
            "Wager settled"
        );

        let _ = self.events.send(EngineEvent::WagerSettled {
            account_id: wager.account_id,
            wager_id,
            status,
            entry_price: settled.entry_price,
            exit_price: settled.exit_price,
            payout,
            balance_after: account.balance,
        });

        Ok(Settlement {
            wager_id,
            account_id: wager.account_id,
            status,
            entry_price: settled.entry_price,
            exit_price: settled.exit_price,
            payout,
            balance_after: account.balance,
            newly_settled: true,
        })
    }

    // -----------------------------------------------------------------------
    // Wallet and withdrawal
    // -----------------------------------------------------------------------

    /// Register a payout wallet address.
    pub async fn set_wallet(&self, account_id: i64, address: &str) -> Result<Account, WagerError> {
        let account = self.ledger.set_wallet(account_id, address).await?;
        info!(account_id, "Wallet registered");
        Ok(account)
    }

    /// Zero the account's balance into a withdrawal request for manual
    /// operator review.
    pub async fn request_withdrawal(
        &self,
        account_id: i64,
    ) -> Result<WithdrawalRequest, WagerError> {
        let account = self.ledger.get_or_create(account_id).await?;
        let Some(wallet) = account.wallet_address.clone() else {
            return Err(WagerError::WalletNotSet(account_id));
        };
        if account.balance < self.rules.withdrawal_minimum {
            return Err(WagerError::BelowMinimum {
                available: account.balance,
                minimum: self.rules.withdrawal_minimum,
            });
        }

        let Some(amount) = self
            .ledger
            .zero_balance_for_withdrawal(account_id, self.rules.withdrawal_minimum)
            .await?
        else {
            // Lost a race with a concurrent request that drained it first.
            let current = self.ledger.get_or_create(account_id).await?;
            return Err(WagerError::BelowMinimum {
                available: current.balance,
                minimum: self.rules.withdrawal_minimum,
            });
        };

        let request = match self.withdrawals.create(account_id, &wallet, amount).await {
            Ok(request) => request,
            Err(e) => {
                // Put the zeroed points back so they are not stranded.
                if let Err(restore) = self.ledger.credit(account_id, amount).await {
                    error!(
                        account_id,
                        amount,
                        error = %restore,
                        "Balance restore after failed withdrawal insert also failed"
                    );
                }
                return Err(e);
            }
        };

        info!(
            account_id,
            request_id = request.id,
            reference = %request.reference,
            amount_points = amount,
            "Withdrawal requested"
        );

        let _ = self.events.send(EngineEvent::WithdrawalRequested {
            account_id,
            request_id: request.id,
            reference: request.reference.clone(),
            wallet_address: request.wallet_address.clone(),
            amount_points: amount,
        });

        Ok(request)
    }
}

#[async_trait]
impl SettleWagers for SettlementEngine {
    async fn settle(&self, wager_id: i64) -> anyhow::Result<()> {
        self.settle_wager(wager_id).await?;
        Ok(())
    }
}

fn recorded_settlement(wager: &Wager, balance_after: i64) -> Settlement {
    Settlement {
        wager_id: wager.id,
        account_id: wager.account_id,
        status: wager.status,
        entry_price: wager.entry_price,
        exit_price: wager.exit_price,
        payout: wager.payout,
        balance_after,
        newly_settled: false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::PriceSource;
    use crate::store::{testutil, WalletRules};
    use crate::types::Quote;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const WALLET: &str = "0x1234567890abcdef1234";

    /// Serves a scripted price sequence; the last entry repeats forever.
    struct SeqSource {
        script: Mutex<VecDeque<Result<Decimal, String>>>,
    }

    impl SeqSource {
        fn new(script: Vec<Result<Decimal, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait]
    impl PriceSource for SeqSource {
        async fn fetch(&self, instrument: &str) -> Result<Quote, WagerError> {
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            match next {
                Some(Ok(price)) => Ok(Quote {
                    instrument: instrument.to_string(),
                    price,
                    source: "seq".to_string(),
                    fetched_at: Utc::now(),
                }),
                Some(Err(reason)) => Err(WagerError::PriceUnavailable {
                    instrument: instrument.to_string(),
                    reason,
                }),
                None => Err(WagerError::PriceUnavailable {
                    instrument: instrument.to_string(),
                    reason: "script exhausted".to_string(),
                }),
            }
        }

        fn name(&self) -> &str {
            "seq"
        }
    }

    fn rules() -> EngineRules {
        EngineRules {
            minimum_stake: 10,
            wager_duration: chrono::Duration::seconds(60),
            outcome: OutcomeRules {
                win_multiplier_pct: 150,
                win_bonus: 0,
                refund_ties: false,
            },
            withdrawal_minimum: 500,
        }
    }

    async fn engine_with(
        script: Vec<Result<Decimal, String>>,
        rules: EngineRules,
    ) -> (SettlementEngine, mpsc::UnboundedReceiver<ScheduleRequest>) {
        let pool = testutil::open_temp().await;
        let ledger = AccountLedger::new(
            pool.clone(),
            1000,
            WalletRules {
                prefix: "0x".to_string(),
                min_len: 20,
            },
        );
        let wagers = WagerStore::new(pool.clone());
        let withdrawals = WithdrawalStore::new(pool);
        // Zero TTL so every quote consults the script.
        let oracle = PriceOracle::new(Arc::new(SeqSource::new(script)), 0);
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = SettlementEngine::new(ledger, wagers, withdrawals, oracle, rules, tx);
        (engine, rx)
    }

    async fn engine(script: Vec<Result<Decimal, String>>) -> (SettlementEngine, mpsc::UnboundedReceiver<ScheduleRequest>) {
        engine_with(script, rules()).await
    }

    // -- Placement tests --

    #[tokio::test]
    async fn test_place_wager() {
        let (engine, mut rx) = engine(vec![Ok(dec!(50000))]).await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();

        assert_eq!(wager.status, WagerStatus::Pending);
        assert_eq!(wager.entry_price, dec!(50000));
        assert_eq!(wager.stake, 100);
        assert!(wager.due_at > wager.placed_at);

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.balance, 900);
        assert!(account.active_wager);
        assert_eq!(account.total_wagers, 1);

        // The settlement timer was armed.
        let request = rx.recv().await.unwrap();
        assert_eq!(request.wager_id, wager.id);
    }

    #[tokio::test]
    async fn test_place_stake_too_low() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000))]).await;

        let result = engine.place_wager(1, "BTCUSDT", Direction::Up, 5).await;
        assert!(matches!(
            result,
            Err(WagerError::StakeTooLow { stake: 5, minimum: 10 })
        ));
    }

    #[tokio::test]
    async fn test_place_insufficient_balance() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000))]).await;

        let result = engine.place_wager(1, "BTCUSDT", Direction::Up, 5000).await;
        assert!(matches!(
            result,
            Err(WagerError::InsufficientBalance {
                needed: 5000,
                available: 1000,
            })
        ));

        // Nothing was debited.
        let account = engine.account(1).await.unwrap();
        assert_eq!(account.balance, 1000);
        assert_eq!(account.total_wagers, 0);
    }

    #[tokio::test]
    async fn test_place_second_wager_rejected() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000))]).await;

        engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();
        let second = engine.place_wager(1, "BTCUSDT", Direction::Down, 100).await;
        assert!(matches!(second, Err(WagerError::WagerAlreadyActive(1))));
    }

    #[tokio::test]
    async fn test_place_oracle_down_leaves_no_trace() {
        let (engine, _rx) = engine(vec![Err("connection refused".to_string())]).await;

        let result = engine.place_wager(1, "BTCUSDT", Direction::Up, 100).await;
        assert!(matches!(result, Err(WagerError::PriceUnavailable { .. })));

        // Failing before the ledger touch means not even an account row.
        assert!(engine.ledger.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_placements_one_succeeds() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000))]).await;
        engine.account(1).await.unwrap();

        let (a, b) = tokio::join!(
            engine.place_wager(1, "BTCUSDT", Direction::Up, 600),
            engine.place_wager(1, "BTCUSDT", Direction::Down, 600),
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.balance, 400);
        assert_eq!(account.total_wagers, 1);
    }

    // -- Settlement tests --

    #[tokio::test]
    async fn test_settle_win() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000)), Ok(dec!(51000))]).await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();
        let settlement = engine.settle_wager(wager.id).await.unwrap();

        assert!(settlement.newly_settled);
        assert_eq!(settlement.status, WagerStatus::Won);
        assert_eq!(settlement.exit_price, Some(dec!(51000)));
        assert_eq!(settlement.payout, 150);
        assert_eq!(settlement.balance_after, 1050);
        // Entry price untouched by settlement.
        assert_eq!(settlement.entry_price, dec!(50000));

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.total_wins, 1);
        assert!(!account.active_wager);
    }

    #[tokio::test]
    async fn test_settle_loss() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000)), Ok(dec!(49000))]).await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();
        let settlement = engine.settle_wager(wager.id).await.unwrap();

        assert_eq!(settlement.status, WagerStatus::Lost);
        assert_eq!(settlement.payout, 0);
        assert_eq!(settlement.balance_after, 900);

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.total_wins, 0);
        assert!(!account.active_wager);
    }

    #[tokio::test]
    async fn test_settle_down_win() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000)), Ok(dec!(49000))]).await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Down, 100)
            .await
            .unwrap();
        let settlement = engine.settle_wager(wager.id).await.unwrap();
        assert_eq!(settlement.status, WagerStatus::Won);
        assert_eq!(settlement.balance_after, 1050);
    }

    #[tokio::test]
    async fn test_settle_tie_loses_by_default() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000)), Ok(dec!(50000))]).await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();
        let settlement = engine.settle_wager(wager.id).await.unwrap();
        assert_eq!(settlement.status, WagerStatus::Lost);
        assert_eq!(settlement.balance_after, 900);
    }

    #[tokio::test]
    async fn test_settle_tie_draw_when_configured() {
        let mut tie_rules = rules();
        tie_rules.outcome.refund_ties = true;
        let (engine, _rx) =
            engine_with(vec![Ok(dec!(50000)), Ok(dec!(50000))], tie_rules).await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();
        let settlement = engine.settle_wager(wager.id).await.unwrap();

        assert_eq!(settlement.status, WagerStatus::Draw);
        assert_eq!(settlement.payout, 100);
        assert_eq!(settlement.balance_after, 1000);

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.total_wins, 0);
    }

    #[tokio::test]
    async fn test_settle_voided_on_oracle_outage() {
        let (engine, _rx) = engine(vec![
            Ok(dec!(50000)),
            Err("gateway timeout".to_string()),
        ])
        .await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();
        let settlement = engine.settle_wager(wager.id).await.unwrap();

        assert_eq!(settlement.status, WagerStatus::Voided);
        assert_eq!(settlement.payout, 100);
        assert!(settlement.exit_price.is_none());
        // Full refund, no counters moved, account unlocked.
        assert_eq!(settlement.balance_after, 1000);

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.total_wins, 0);
        assert!(!account.active_wager);
    }

    #[tokio::test]
    async fn test_settle_twice_credits_once() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000)), Ok(dec!(51000))]).await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();

        let first = engine.settle_wager(wager.id).await.unwrap();
        assert!(first.newly_settled);

        let second = engine.settle_wager(wager.id).await.unwrap();
        assert!(!second.newly_settled);
        assert_eq!(second.status, WagerStatus::Won);
        assert_eq!(second.balance_after, first.balance_after);

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.balance, 1050);
        assert_eq!(account.total_wins, 1);
    }

    #[tokio::test]
    async fn test_concurrent_settles_credit_once() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000)), Ok(dec!(51000))]).await;

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();

        let (a, b) = tokio::join!(engine.settle_wager(wager.id), engine.settle_wager(wager.id));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(
            [a.newly_settled, b.newly_settled]
                .iter()
                .filter(|n| **n)
                .count(),
            1
        );

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.balance, 1050);
        assert_eq!(account.total_wins, 1);
    }

    #[tokio::test]
    async fn test_settle_unknown_wager() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000))]).await;
        let result = engine.settle_wager(404).await;
        assert!(matches!(result, Err(WagerError::WagerNotFound(404))));
    }

    // -- Withdrawal tests --

    #[tokio::test]
    async fn test_request_withdrawal() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000))]).await;
        engine.set_wallet(1, WALLET).await.unwrap();

        let request = engine.request_withdrawal(1).await.unwrap();
        assert_eq!(request.amount_points, 1000);
        assert_eq!(request.wallet_address, WALLET);

        let account = engine.account(1).await.unwrap();
        assert_eq!(account.balance, 0);
    }

    #[tokio::test]
    async fn test_withdrawal_without_wallet() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000))]).await;
        engine.account(1).await.unwrap();

        let result = engine.request_withdrawal(1).await;
        assert!(matches!(result, Err(WagerError::WalletNotSet(1))));
    }

    #[tokio::test]
    async fn test_withdrawal_below_minimum() {
        let mut high_rules = rules();
        high_rules.withdrawal_minimum = 5000;
        let (engine, _rx) = engine_with(vec![Ok(dec!(50000))], high_rules).await;
        engine.set_wallet(1, WALLET).await.unwrap();

        let result = engine.request_withdrawal(1).await;
        assert!(matches!(
            result,
            Err(WagerError::BelowMinimum {
                available: 1000,
                minimum: 5000,
            })
        ));
    }

    #[tokio::test]
    async fn test_withdrawal_twice_second_below_minimum() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000))]).await;
        engine.set_wallet(1, WALLET).await.unwrap();

        engine.request_withdrawal(1).await.unwrap();
        let second = engine.request_withdrawal(1).await;
        assert!(matches!(second, Err(WagerError::BelowMinimum { .. })));
    }

    // -- Event tests --

    #[tokio::test]
    async fn test_events_emitted() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000)), Ok(dec!(51000))]).await;
        let mut events = engine.subscribe();

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();
        engine.settle_wager(wager.id).await.unwrap();

        match events.try_recv().unwrap() {
            EngineEvent::WagerPlaced { wager_id, stake, .. } => {
                assert_eq!(wager_id, wager.id);
                assert_eq!(stake, 100);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match events.try_recv().unwrap() {
            EngineEvent::WagerSettled { status, payout, .. } => {
                assert_eq!(status, WagerStatus::Won);
                assert_eq!(payout, 150);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_settle_emits_one_event() {
        let (engine, _rx) = engine(vec![Ok(dec!(50000)), Ok(dec!(51000))]).await;
        let mut events = engine.subscribe();

        let wager = engine
            .place_wager(1, "BTCUSDT", Direction::Up, 100)
            .await
            .unwrap();
        engine.settle_wager(wager.id).await.unwrap();
        engine.settle_wager(wager.id).await.unwrap();

        let mut settled_events = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, EngineEvent::WagerSettled { .. }) {
                settled_events += 1;
            }
        }
        assert_eq!(settled_events, 1);
    }
}
