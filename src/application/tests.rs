use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;
use solana_sdk::pubkey::Pubkey;
use std::sync::{Arc, OnceLock, Weak};

use super::flash_arbitrage::{EngineConfig, FlashArbitrageEngine, OperationOutcome};
use crate::domain::arbitrage::ArbitragePath;
use crate::domain::dex::{SwapVenue, VenueReserves};
use crate::domain::execution::OperationPhase;
use crate::domain::ledger::TokenLedger;
use crate::domain::lending::{CallbackContext, FlashLoanReceiver, LendingPool, LoanRequest};
use crate::infrastructure::{ConstantProductVenue, InMemoryTokenLedger, SimulatedLendingPool};
use crate::shared::errors::{ArbitrageError, ErrorKind};
use crate::shared::types::{Asset, AssetRegistry};

const UNIT: u64 = 1_000_000_000;

enum Behavior {
    Honest,
    /// Takes back 2% of what it paid out
    Skim,
    /// Tries to re-enter the engine before swapping
    Reenter,
    /// Hands back 1% of the input on top of the swap output
    Gift,
}

/// Constant-product venue with a scripted twist
struct ScriptedVenue {
    inner: ConstantProductVenue,
    ledger: Arc<InMemoryTokenLedger>,
    behavior: Behavior,
    engine: OnceLock<Weak<FlashArbitrageEngine>>,
    owner: Pubkey,
    pool: Pubkey,
    rejections: Mutex<Vec<ArbitrageError>>,
}

#[async_trait]
impl SwapVenue for ScriptedVenue {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn address(&self) -> Pubkey {
        self.inner.address()
    }

    fn fee_bps(&self) -> u32 {
        self.inner.fee_bps()
    }

    async fn get_reserves(&self, input_asset: &Pubkey, output_asset: &Pubkey) -> Result<VenueReserves, ArbitrageError> {
        self.inner.get_reserves(input_asset, output_asset).await
    }

    async fn swap(
        &self,
        trader: &Pubkey,
        input_asset: &Pubkey,
        output_asset: &Pubkey,
        input_amount: u64,
        minimum_output: u64,
    ) -> Result<u64, ArbitrageError> {
        if let Behavior::Reenter = self.behavior {
            if let Some(engine) = self.engine.get().and_then(Weak::upgrade) {
                let nested = engine.initiate_arbitrage(&self.owner, input_asset, UNIT).await;
                let callback = engine
                    .on_loan_received(
                        CallbackContext {
                            caller: self.pool,
                            asset: *input_asset,
                            amount_received: UNIT,
                            amount_owed: UNIT,
                        },
                        &[],
                    )
                    .await;
                let mut rejections = self.rejections.lock();
                rejections.extend(nested.err());
                rejections.extend(callback.err());
            }
        }

        let paid = self
            .inner
            .swap(trader, input_asset, output_asset, input_amount, minimum_output)
            .await?;
        match self.behavior {
            Behavior::Skim => {
                self.ledger
                    .transfer(output_asset, trader, &self.inner.address(), paid / 50)
                    .await?
            }
            Behavior::Gift => {
                self.ledger
                    .transfer(input_asset, &self.inner.address(), trader, input_amount / 100)
                    .await?
            }
            Behavior::Honest | Behavior::Reenter => {}
        }
        Ok(paid)
    }
}

/// Returns without ever calling back
struct SilentPool {
    address: Pubkey,
}

#[async_trait]
impl LendingPool for SilentPool {
    fn address(&self) -> Pubkey {
        self.address
    }

    async fn flash_loan(
        &self,
        _receiver: &dyn FlashLoanReceiver,
        _asset: &Pubkey,
        _amount: u64,
        _data: &[u8],
    ) -> Result<(), ArbitrageError> {
        Ok(())
    }
}

/// Lends one base unit less than requested and never undoes anything itself
struct ShortPayingPool {
    address: Pubkey,
    ledger: Arc<InMemoryTokenLedger>,
}

#[async_trait]
impl LendingPool for ShortPayingPool {
    fn address(&self) -> Pubkey {
        self.address
    }

    async fn flash_loan(
        &self,
        receiver: &dyn FlashLoanReceiver,
        asset: &Pubkey,
        amount: u64,
        data: &[u8],
    ) -> Result<(), ArbitrageError> {
        let lent = amount - 1;
        self.ledger
            .transfer(asset, &self.address, &receiver.receiver_address(), lent)
            .await?;
        receiver
            .on_loan_received(
                CallbackContext {
                    caller: self.address,
                    asset: *asset,
                    amount_received: lent,
                    amount_owed: lent + 3,
                },
                data,
            )
            .await
    }
}

/// Reports the full principal as lent but only transfers half of it
struct OverReportingPool {
    address: Pubkey,
    ledger: Arc<InMemoryTokenLedger>,
}

#[async_trait]
impl LendingPool for OverReportingPool {
    fn address(&self) -> Pubkey {
        self.address
    }

    async fn flash_loan(
        &self,
        receiver: &dyn FlashLoanReceiver,
        asset: &Pubkey,
        amount: u64,
        data: &[u8],
    ) -> Result<(), ArbitrageError> {
        self.ledger
            .transfer(asset, &self.address, &receiver.receiver_address(), amount / 2)
            .await?;
        receiver
            .on_loan_received(
                CallbackContext {
                    caller: self.address,
                    asset: *asset,
                    amount_received: amount,
                    amount_owed: amount + amount * 30 / 10_000,
                },
                data,
            )
            .await
    }
}

struct World {
    ledger: Arc<InMemoryTokenLedger>,
    owner: Pubkey,
    busd: Asset,
    crox: Asset,
    pool: Arc<SimulatedLendingPool>,
}

impl World {
    async fn new() -> Self {
        let ledger = Arc::new(InMemoryTokenLedger::new());
        let pool = Arc::new(SimulatedLendingPool::new(30, ledger.clone()));
        let busd = Asset::new(Pubkey::new_unique(), "BUSD", 9);
        let crox = Asset::new(Pubkey::new_unique(), "CROX", 9);
        ledger.mint(&busd.address, &pool.address(), 1_000 * UNIT).await.unwrap();
        Self {
            ledger,
            owner: Pubkey::new_unique(),
            busd,
            crox,
            pool,
        }
    }

    async fn venue(&self, name: &str, behavior: Behavior, busd: u64, crox: u64) -> Arc<ScriptedVenue> {
        let inner = ConstantProductVenue::new(name, 0, self.ledger.clone());
        self.ledger.mint(&self.busd.address, &inner.address(), busd).await.unwrap();
        self.ledger.mint(&self.crox.address, &inner.address(), crox).await.unwrap();
        Arc::new(ScriptedVenue {
            inner,
            ledger: self.ledger.clone(),
            behavior,
            engine: OnceLock::new(),
            owner: self.owner,
            pool: self.pool.address(),
            rejections: Mutex::new(Vec::new()),
        })
    }

    /// Venues priced so that 1 BUSD round-trips into 1.02 BUSD
    async fn profitable_venues(&self) -> [Arc<ScriptedVenue>; 2] {
        [
            self.venue("pancake", Behavior::Honest, 999 * UNIT, 2_000 * UNIT).await,
            self.venue("biswap", Behavior::Honest, 510 * UNIT, 998 * UNIT).await,
        ]
    }

    async fn engine(&self, pool: Arc<dyn LendingPool>, venues: [Arc<ScriptedVenue>; 2]) -> Arc<FlashArbitrageEngine> {
        let [first, second] = venues;
        let engine = Arc::new(
            FlashArbitrageEngine::new(
                EngineConfig {
                    address: Pubkey::new_unique(),
                    owner: self.owner,
                    slippage_bps: 100,
                },
                AssetRegistry::new(vec![self.busd.clone(), self.crox.clone()]),
                vec![ArbitragePath::new(self.busd.address, self.crox.address)],
                pool,
                [first.clone() as Arc<dyn SwapVenue>, second.clone() as Arc<dyn SwapVenue>],
                self.ledger.clone(),
            )
            .unwrap(),
        );
        for venue in [&first, &second] {
            let _ = venue.engine.set(Arc::downgrade(&engine));
        }
        self.ledger.mint(&self.busd.address, &engine.address(), 100 * UNIT).await.unwrap();
        engine
    }

    /// Every balance of every account involved, in a fixed order
    async fn holdings(&self, accounts: &[Pubkey]) -> Vec<u64> {
        let mut out = Vec::new();
        for account in accounts {
            for asset in [&self.busd.address, &self.crox.address] {
                out.push(self.ledger.balance_of(asset, account).await);
            }
        }
        out
    }
}

fn accounts(engine: &FlashArbitrageEngine, pool: Pubkey, venues: &[Arc<ScriptedVenue>]) -> Vec<Pubkey> {
    let mut accounts = vec![engine.address(), pool];
    accounts.extend(venues.iter().map(|v| v.address()));
    accounts
}

#[tokio::test]
async fn test_funded_balance_is_reported() {
    let world = World::new().await;
    let venues = world.profitable_venues().await;
    let engine = world.engine(world.pool.clone(), venues).await;

    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100 * UNIT);
    assert_eq!(engine.get_balance_of_token(&world.crox.address).await, 0);
    assert_eq!(engine.phase(), OperationPhase::Idle);
}

#[tokio::test]
async fn test_profitable_path_settles() {
    let world = World::new().await;
    let venues = world.profitable_venues().await;
    let engine = world.engine(world.pool.clone(), venues).await;

    let report = engine
        .initiate_arbitrage(&world.owner, &world.busd.address, UNIT)
        .await
        .unwrap();

    assert_eq!(report.fee, 3_000_000);
    assert_eq!(report.amount_owed, 1_003_000_000);
    assert_eq!(report.profit, 17_000_000);
    assert_eq!(report.legs[0].output_amount, 2 * UNIT);
    assert_eq!(report.legs[1].output_amount, 1_020_000_000);
    assert_eq!(report.engine_balances.get("BUSD"), 100_017_000_000);
    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100_017_000_000);
    assert_eq!(engine.get_balance_of_token(&world.crox.address).await, 0);
    // The pool got back exactly principal plus fee
    assert_eq!(
        world.ledger.balance_of(&world.busd.address, &world.pool.address()).await,
        1_000 * UNIT + 3_000_000
    );
    assert_eq!(engine.phase(), OperationPhase::Idle);
    assert_eq!(engine.settlement_history().len(), 1);
    assert_eq!(world.ledger.journal_len().await, 0);
    assert_eq!(world.ledger.open_checkpoints().await, 0);
}

#[tokio::test]
async fn test_unprofitable_path_rolls_back() {
    let world = World::new().await;
    let venues = [
        world.venue("pancake", Behavior::Honest, 999 * UNIT, 2_000 * UNIT).await,
        world.venue("biswap", Behavior::Honest, 499_500_000_000, 998 * UNIT).await,
    ];
    let engine = world.engine(world.pool.clone(), venues.clone()).await;
    let accounts = accounts(&engine, world.pool.address(), &venues);
    let before = world.holdings(&accounts).await;

    let err = engine
        .initiate_arbitrage(&world.owner, &world.busd.address, UNIT)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ArbitrageError::InsufficientProfit {
            realized: 999_000_000,
            owed: 1_003_000_000
        }
    );
    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100 * UNIT);
    assert_eq!(world.holdings(&accounts).await, before);
    assert!(engine.settlement_history().is_empty());
    assert_eq!(engine.phase(), OperationPhase::Idle);
    assert_eq!(world.ledger.open_checkpoints().await, 0);
}

#[tokio::test]
async fn test_engine_is_reusable_after_abort() {
    let world = World::new().await;
    let venues = [
        world.venue("pancake", Behavior::Honest, 999 * UNIT, 2_000 * UNIT).await,
        world.venue("biswap", Behavior::Honest, 499_500_000_000, 998 * UNIT).await,
    ];
    let second = venues[1].address();
    let engine = world.engine(world.pool.clone(), venues).await;

    let outcome = engine.run(&world.owner, &world.busd.address, UNIT).await;
    assert_eq!(outcome, OperationOutcome::Failure(ErrorKind::InsufficientProfit));

    world.ledger.mint(&world.busd.address, &second, 10_500_000_000).await.unwrap();
    let outcome = engine.run(&world.owner, &world.busd.address, UNIT).await;
    assert_eq!(outcome, OperationOutcome::Success { profit: 17_000_000 });
}

#[tokio::test]
async fn test_request_validation() {
    let world = World::new().await;
    let venues = world.profitable_venues().await;
    let engine = world.engine(world.pool.clone(), venues).await;

    let stranger = Pubkey::new_unique();
    let err = engine
        .initiate_arbitrage(&stranger, &world.busd.address, UNIT)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnauthorizedCaller);

    let err = engine
        .initiate_arbitrage(&world.owner, &world.busd.address, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    let err = engine
        .initiate_arbitrage(&world.owner, &Pubkey::new_unique(), UNIT)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    // Recognized, but no path starts from it
    let err = engine
        .initiate_arbitrage(&world.owner, &world.crox.address, UNIT)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100 * UNIT);
}

#[tokio::test]
async fn test_loan_beyond_pool_liquidity() {
    let world = World::new().await;
    let venues = world.profitable_venues().await;
    let engine = world.engine(world.pool.clone(), venues).await;

    let outcome = engine.run(&world.owner, &world.busd.address, 2_000 * UNIT).await;

    assert_eq!(outcome, OperationOutcome::Failure(ErrorKind::InsufficientLiquidity));
    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100 * UNIT);
}

#[tokio::test]
async fn test_reentry_from_venue_is_rejected() {
    let world = World::new().await;
    let venues = [
        world.venue("pancake", Behavior::Reenter, 999 * UNIT, 2_000 * UNIT).await,
        world.venue("biswap", Behavior::Honest, 510 * UNIT, 998 * UNIT).await,
    ];
    let engine = world.engine(world.pool.clone(), venues.clone()).await;

    let report = engine
        .initiate_arbitrage(&world.owner, &world.busd.address, UNIT)
        .await
        .unwrap();

    let rejections = venues[0].rejections.lock().clone();
    assert_eq!(
        rejections,
        vec![ArbitrageError::ReentrantOperation, ArbitrageError::ReentrantOperation]
    );
    // Nested attempts changed nothing; the outer operation settled normally
    assert_eq!(report.profit, 17_000_000);
    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100_017_000_000);
    assert_eq!(engine.settlement_history().len(), 1);
}

#[tokio::test]
async fn test_spoofed_callback_is_rejected() {
    let world = World::new().await;
    let venues = world.profitable_venues().await;
    let engine = world.engine(world.pool.clone(), venues).await;
    let data = LoanRequest {
        request_id: 1,
        asset: world.busd.address,
        principal: UNIT,
        initiator: world.owner,
    }
    .encode()
    .unwrap();

    let spoofed = CallbackContext {
        caller: Pubkey::new_unique(),
        asset: world.busd.address,
        amount_received: UNIT,
        amount_owed: UNIT,
    };
    let err = engine.on_loan_received(spoofed, &data).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnauthorizedCaller);

    // Right identity, but nothing was requested
    let unsolicited = CallbackContext {
        caller: world.pool.address(),
        asset: world.busd.address,
        amount_received: UNIT,
        amount_owed: UNIT,
    };
    let err = engine.on_loan_received(unsolicited, &data).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnauthorizedCaller);

    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100 * UNIT);
    assert_eq!(engine.phase(), OperationPhase::Idle);
}

#[tokio::test]
async fn test_pool_that_never_calls_back() {
    let world = World::new().await;
    let venues = world.profitable_venues().await;
    let pool = Arc::new(SilentPool {
        address: Pubkey::new_unique(),
    });
    let engine = world.engine(pool, venues).await;

    let outcome = engine.run(&world.owner, &world.busd.address, UNIT).await;

    assert_eq!(outcome, OperationOutcome::Failure(ErrorKind::TransferFailure));
    assert_eq!(engine.phase(), OperationPhase::Idle);
    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100 * UNIT);
}

#[tokio::test]
async fn test_short_loan_is_undone_by_engine() {
    let world = World::new().await;
    let venues = world.profitable_venues().await;
    let pool = Arc::new(ShortPayingPool {
        address: Pubkey::new_unique(),
        ledger: world.ledger.clone(),
    });
    world.ledger.mint(&world.busd.address, &pool.address, 1_000 * UNIT).await.unwrap();
    let pool_address = pool.address;
    let engine = world.engine(pool, venues).await;

    let outcome = engine.run(&world.owner, &world.busd.address, UNIT).await;

    assert_eq!(outcome, OperationOutcome::Failure(ErrorKind::TransferFailure));
    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100 * UNIT);
    assert_eq!(
        world.ledger.balance_of(&world.busd.address, &pool_address).await,
        1_000 * UNIT
    );
}

#[tokio::test]
async fn test_loan_smaller_than_reported_is_rejected() {
    let world = World::new().await;
    let venues = world.profitable_venues().await;
    let pool = Arc::new(OverReportingPool {
        address: Pubkey::new_unique(),
        ledger: world.ledger.clone(),
    });
    world.ledger.mint(&world.busd.address, &pool.address, 1_000 * UNIT).await.unwrap();
    let pool_address = pool.address;
    let engine = world.engine(pool, venues.clone()).await;
    let accounts = accounts(&engine, pool_address, &venues);
    let before = world.holdings(&accounts).await;

    let outcome = engine.run(&world.owner, &world.busd.address, UNIT).await;

    assert_eq!(outcome, OperationOutcome::Failure(ErrorKind::TransferFailure));
    assert_eq!(engine.get_balance_of_token(&world.busd.address).await, 100 * UNIT);
    assert_eq!(world.holdings(&accounts).await, before);
    assert!(engine.settlement_history().is_empty());
}

#[tokio::test]
async fn test_unaccounted_balance_change_aborts() {
    let world = World::new().await;
    let venues = [
        world.venue("pancake", Behavior::Gift, 999 * UNIT, 2_000 * UNIT).await,
        world.venue("biswap", Behavior::Honest, 510 * UNIT, 998 * UNIT).await,
    ];
    let engine = world.engine(world.pool.clone(), venues.clone()).await;
    let accounts = accounts(&engine, world.pool.address(), &venues);
    let before = world.holdings(&accounts).await;

    let err = engine
        .initiate_arbitrage(&world.owner, &world.busd.address, UNIT)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TransferFailure);
    assert_eq!(world.holdings(&accounts).await, before);
    assert!(engine.settlement_history().is_empty());
    assert_eq!(engine.phase(), OperationPhase::Idle);
}

#[tokio::test]
async fn test_drained_second_venue_rolls_back_first_leg() {
    let world = World::new().await;
    let venues = [
        world.venue("pancake", Behavior::Honest, 999 * UNIT, 2_000 * UNIT).await,
        world.venue("biswap", Behavior::Honest, 0, 998 * UNIT).await,
    ];
    let engine = world.engine(world.pool.clone(), venues.clone()).await;
    let accounts = accounts(&engine, world.pool.address(), &venues);
    let before = world.holdings(&accounts).await;

    let outcome = engine.run(&world.owner, &world.busd.address, UNIT).await;

    assert_eq!(outcome, OperationOutcome::Failure(ErrorKind::InsufficientLiquidity));
    assert_eq!(world.holdings(&accounts).await, before);
    assert_eq!(world.ledger.open_checkpoints().await, 0);
}

#[tokio::test]
async fn test_skimming_venue_trips_slippage_floor() {
    let world = World::new().await;
    let venues = [
        world.venue("pancake", Behavior::Honest, 999 * UNIT, 2_000 * UNIT).await,
        world.venue("biswap", Behavior::Skim, 510 * UNIT, 998 * UNIT).await,
    ];
    let engine = world.engine(world.pool.clone(), venues.clone()).await;
    let accounts = accounts(&engine, world.pool.address(), &venues);
    let before = world.holdings(&accounts).await;

    let err = engine
        .initiate_arbitrage(&world.owner, &world.busd.address, UNIT)
        .await
        .unwrap_err();

    assert!(matches!(err, ArbitrageError::SlippageExceeded { .. }));
    assert_eq!(world.holdings(&accounts).await, before);
    assert_eq!(world.ledger.journal_len().await, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_operation_is_atomic_and_solvent(
        second_busd in 300u64..800,
        tenths in 1u64..50,
        pool_fee_bps in 0u32..100,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (before, after, engine_before, engine_after, result) = rt.block_on(async {
            let world = World::new().await;
            let pool = Arc::new(SimulatedLendingPool::new(pool_fee_bps, world.ledger.clone()));
            world.ledger.mint(&world.busd.address, &pool.address(), 1_000 * UNIT).await.unwrap();
            let venues = [
                world.venue("pancake", Behavior::Honest, 999 * UNIT, 2_000 * UNIT).await,
                world.venue("biswap", Behavior::Honest, second_busd * UNIT, 998 * UNIT).await,
            ];
            let engine = world.engine(pool.clone(), venues.clone()).await;
            let accounts = accounts(&engine, pool.address(), &venues);

            let before = world.holdings(&accounts).await;
            let engine_before = engine.get_balance_of_token(&world.busd.address).await;
            let result = engine
                .initiate_arbitrage(&world.owner, &world.busd.address, tenths * UNIT / 10)
                .await;
            let after = world.holdings(&accounts).await;
            let engine_after = engine.get_balance_of_token(&world.busd.address).await;
            (before, after, engine_before, engine_after, result)
        });

        match result {
            Ok(report) => {
                prop_assert!(engine_after >= engine_before);
                prop_assert_eq!(engine_after - engine_before, report.profit);
            }
            Err(_) => prop_assert_eq!(after, before),
        }
    }
}
