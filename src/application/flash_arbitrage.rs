//! Flash-loan arbitrage engine: borrow, swap twice, verify, repay

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::arbitrage::{ArbitragePath, ProfitabilityGuard};
use crate::domain::dex::{ExecutedLeg, SwapLeg, SwapVenue, SwapVenueAdapter};
use crate::domain::execution::{
    OperationPhase, OperationState, RepaymentSettler, SettlementReport, VenueSnapshot,
};
use crate::domain::ledger::{AssetLedger, BalanceSnapshot, TokenLedger};
use crate::domain::lending::{CallbackContext, FlashLoanReceiver, LendingPool, LoanRequest};
use crate::math::calculate_min_out;
use crate::shared::errors::{AppError, ArbitrageError, ErrorKind};
use crate::shared::types::{Asset, AssetRegistry};
use crate::shared::utils::{format_amount, generate_id};

/// Identity and tolerances of an engine instance
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Account holding the engine's balances
    pub address: Pubkey,
    /// Only this caller may start an operation
    pub owner: Pubkey,
    /// Tolerance applied to each leg's quote to form its output floor
    pub slippage_bps: u32,
}

/// What the caller of an arbitrage operation observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationOutcome {
    Success { profit: u64 },
    Failure(ErrorKind),
}

impl From<&Result<SettlementReport, ArbitrageError>> for OperationOutcome {
    fn from(result: &Result<SettlementReport, ArbitrageError>) -> Self {
        match result {
            Ok(report) => OperationOutcome::Success { profit: report.profit },
            Err(e) => OperationOutcome::Failure(e.kind()),
        }
    }
}

/// Borrows from one lending pool and round-trips the loan through two venues.
///
/// A whole operation runs inside a single call to [`initiate_arbitrage`]:
/// the pool calls back into [`FlashLoanReceiver::on_loan_received`] before
/// its own call returns. Any failure reverts every ledger mutation made since
/// the operation started.
///
/// [`initiate_arbitrage`]: FlashArbitrageEngine::initiate_arbitrage
pub struct FlashArbitrageEngine {
    config: EngineConfig,
    assets: AssetRegistry,
    paths: HashMap<Pubkey, ArbitragePath>,
    pool: Arc<dyn LendingPool>,
    venues: [SwapVenueAdapter; 2],
    ledger: AssetLedger,
    state: OperationState,
    next_request_id: AtomicU64,
    staged: Mutex<Option<SettlementReport>>,
    history: Mutex<Vec<SettlementReport>>,
}

impl FlashArbitrageEngine {
    pub fn new(
        config: EngineConfig,
        assets: AssetRegistry,
        paths: Vec<ArbitragePath>,
        pool: Arc<dyn LendingPool>,
        venues: [Arc<dyn SwapVenue>; 2],
        ledger: Arc<dyn TokenLedger>,
    ) -> Result<Self, AppError> {
        let mut by_asset = HashMap::new();
        for path in paths {
            for asset in [&path.borrow_asset, &path.intermediate_asset] {
                if !assets.contains(asset) {
                    return Err(AppError::ConfigError(format!("path uses unrecognized asset {}", asset)));
                }
            }
            if path.borrow_asset == path.intermediate_asset {
                return Err(AppError::ConfigError("path must use two distinct assets".to_string()));
            }
            if path.first_venue > 1 || path.second_venue > 1 || path.first_venue == path.second_venue {
                return Err(AppError::ConfigError(
                    "path must use each of the two venues once".to_string(),
                ));
            }
            by_asset.insert(path.borrow_asset, path);
        }

        let view = AssetLedger::new(ledger, config.address);
        let [first, second] = venues;
        Ok(Self {
            venues: [
                SwapVenueAdapter::new(first, view.clone()),
                SwapVenueAdapter::new(second, view.clone()),
            ],
            ledger: view,
            config,
            assets,
            paths: by_asset,
            pool,
            state: OperationState::new(),
            next_request_id: AtomicU64::new(1),
            staged: Mutex::new(None),
            history: Mutex::new(Vec::new()),
        })
    }

    pub fn address(&self) -> Pubkey {
        self.config.address
    }

    pub fn owner(&self) -> Pubkey {
        self.config.owner
    }

    pub fn assets(&self) -> &AssetRegistry {
        &self.assets
    }

    pub fn phase(&self) -> OperationPhase {
        self.state.phase()
    }

    pub fn path_for(&self, asset: &Pubkey) -> Option<&ArbitragePath> {
        self.paths.get(asset)
    }

    pub async fn get_balance_of_token(&self, asset: &Pubkey) -> u64 {
        self.ledger.balance_of(asset).await
    }

    /// Balances of every recognized asset
    pub async fn balances(&self) -> BalanceSnapshot {
        self.ledger.snapshot(&self.assets).await
    }

    /// Reports of every settled operation, oldest first
    pub fn settlement_history(&self) -> Vec<SettlementReport> {
        self.history.lock().clone()
    }

    /// Borrow `principal` of `asset`, run its arbitrage path and repay.
    ///
    /// Either the whole chain settles and the surplus stays with the engine,
    /// or nothing observable changes.
    pub async fn initiate_arbitrage(
        &self,
        caller: &Pubkey,
        asset: &Pubkey,
        principal: u64,
    ) -> Result<SettlementReport, ArbitrageError> {
        if self.state.phase() != OperationPhase::Idle {
            warn!(%caller, "rejected nested arbitrage request");
            return Err(ArbitrageError::ReentrantOperation);
        }
        if *caller != self.config.owner {
            return Err(ArbitrageError::UnauthorizedCaller(format!(
                "{} is not the engine owner",
                caller
            )));
        }
        if principal == 0 {
            return Err(ArbitrageError::InvalidRequest("principal must be positive".to_string()));
        }
        let borrow_asset = self.assets.require(asset)?.clone();
        if !self.paths.contains_key(asset) {
            return Err(ArbitrageError::InvalidRequest(format!(
                "no arbitrage path for {}",
                borrow_asset.symbol
            )));
        }

        let request = LoanRequest {
            request_id: self.next_request_id.fetch_add(1, Ordering::SeqCst),
            asset: *asset,
            principal,
            initiator: *caller,
        };
        let data = request.encode()?;
        let guard = self.state.acquire(request.clone())?;

        info!(
            "🎯 Borrowing {} {} (request {})",
            format_amount(principal, borrow_asset.decimals),
            borrow_asset.symbol,
            request.request_id
        );

        let checkpoint = self.ledger.ledger().checkpoint().await;
        let opening_balance = self.ledger.balance_of(asset).await;
        self.state.record_opening_balance(opening_balance);

        let result = match self.pool.flash_loan(self, asset, principal, &data).await {
            Ok(()) if guard.phase() == OperationPhase::Repaid => self
                .staged
                .lock()
                .take()
                .ok_or_else(|| ArbitrageError::TransferFailure("settlement record missing".to_string())),
            Ok(()) => Err(ArbitrageError::TransferFailure(format!(
                "lending pool returned in phase {:?} without completing the callback",
                guard.phase()
            ))),
            Err(e) => Err(e),
        };
        let result = match result {
            Ok(report) => self
                .verify_surplus(asset, opening_balance, &report)
                .await
                .map(|()| report),
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                self.ledger.ledger().commit(checkpoint).await;
                info!(
                    "✅ Arbitrage settled: profit {} {}",
                    format_amount(report.profit, borrow_asset.decimals),
                    borrow_asset.symbol
                );
                self.history.lock().push(report.clone());
                drop(guard);
                Ok(report)
            }
            Err(e) => {
                self.ledger.ledger().revert(checkpoint).await;
                self.staged.lock().take();
                warn!("❌ Arbitrage aborted ({:?}): {}", e.kind(), e);
                drop(guard);
                Err(e)
            }
        }
    }

    /// [`initiate_arbitrage`](Self::initiate_arbitrage) reduced to its outcome
    pub async fn run(&self, caller: &Pubkey, asset: &Pubkey, principal: u64) -> OperationOutcome {
        OperationOutcome::from(&self.initiate_arbitrage(caller, asset, principal).await)
    }

    /// The engine must end up holding exactly its opening balance plus the
    /// reported profit
    async fn verify_surplus(
        &self,
        asset: &Pubkey,
        opening_balance: u64,
        report: &SettlementReport,
    ) -> Result<(), ArbitrageError> {
        let closing_balance = self.ledger.balance_of(asset).await;
        match closing_balance.checked_sub(opening_balance) {
            Some(gain) if gain == report.profit => Ok(()),
            _ => Err(ArbitrageError::TransferFailure(format!(
                "balance moved from {} to {} but profit of {} was reported",
                opening_balance, closing_balance, report.profit
            ))),
        }
    }

    /// Principal must have actually landed in the engine's ledger
    async fn verify_loan_arrived(&self, request: &LoanRequest) -> Result<(), ArbitrageError> {
        let opening_balance = self.state.opening_balance().ok_or_else(|| {
            ArbitrageError::TransferFailure("opening balance was not recorded".to_string())
        })?;
        let held = self.ledger.balance_of(&request.asset).await;
        match held.checked_sub(opening_balance) {
            Some(arrived) if arrived == request.principal => Ok(()),
            _ => Err(ArbitrageError::TransferFailure(format!(
                "expected {} to arrive on top of {}, ledger shows {}",
                request.principal, opening_balance, held
            ))),
        }
    }

    fn validate_callback(&self, ctx: &CallbackContext, data: &[u8]) -> Result<LoanRequest, ArbitrageError> {
        if ctx.caller != self.pool.address() {
            return Err(ArbitrageError::UnauthorizedCaller(format!(
                "callback from untrusted lender {}",
                ctx.caller
            )));
        }
        match self.state.phase() {
            OperationPhase::LoanRequested => {}
            OperationPhase::Idle => {
                return Err(ArbitrageError::UnauthorizedCaller("unsolicited callback".to_string()));
            }
            _ => return Err(ArbitrageError::ReentrantOperation),
        }

        let pending = self
            .state
            .pending()
            .ok_or_else(|| ArbitrageError::UnauthorizedCaller("no loan pending".to_string()))?;
        match LoanRequest::decode(data) {
            Some(decoded) if decoded == pending => {}
            _ => {
                return Err(ArbitrageError::UnauthorizedCaller(
                    "callback context does not match the pending loan".to_string(),
                ))
            }
        }

        if ctx.asset != pending.asset {
            return Err(ArbitrageError::TransferFailure(format!(
                "lent {} but {} was requested",
                ctx.asset, pending.asset
            )));
        }
        if ctx.amount_received != pending.principal {
            return Err(ArbitrageError::TransferFailure(format!(
                "received {} but {} was requested",
                ctx.amount_received, pending.principal
            )));
        }
        if ctx.amount_owed < ctx.amount_received {
            return Err(ArbitrageError::InvalidRequest(format!(
                "amount owed {} is below principal {}",
                ctx.amount_owed, ctx.amount_received
            )));
        }
        Ok(pending)
    }

    /// Quote a leg, derive its floor from the slippage tolerance and execute it
    async fn execute_leg(
        &self,
        venue: &SwapVenueAdapter,
        build: impl FnOnce(&str, u64) -> SwapLeg,
        input_asset: &Pubkey,
        output_asset: &Pubkey,
        input_amount: u64,
    ) -> Result<ExecutedLeg, ArbitrageError> {
        let quote = venue.quote(input_asset, output_asset, input_amount).await?;
        let minimum_output = calculate_min_out(quote, self.config.slippage_bps);
        debug!(venue = venue.venue_name(), quote, minimum_output, "leg quoted");
        venue.swap(build(venue.venue_name(), minimum_output)).await
    }

    async fn handle_loan(&self, ctx: CallbackContext, data: &[u8]) -> Result<(), ArbitrageError> {
        let request = self.validate_callback(&ctx, data)?;
        self.verify_loan_arrived(&request).await?;
        self.state
            .advance(OperationPhase::LoanRequested, OperationPhase::CallbackReceived)?;

        let path = self
            .paths
            .get(&request.asset)
            .ok_or_else(|| ArbitrageError::InvalidRequest("no arbitrage path".to_string()))?;
        let first_venue = &self.venues[path.first_venue];
        let second_venue = &self.venues[path.second_venue];

        let first = self
            .execute_leg(
                first_venue,
                |venue, minimum| path.first_leg(venue, ctx.amount_received, minimum),
                &path.borrow_asset,
                &path.intermediate_asset,
                ctx.amount_received,
            )
            .await?;
        self.state
            .advance(OperationPhase::CallbackReceived, OperationPhase::Swapped1)?;

        let second = self
            .execute_leg(
                second_venue,
                |venue, minimum| path.second_leg(venue, first.output_amount, minimum),
                &path.intermediate_asset,
                &path.borrow_asset,
                first.output_amount,
            )
            .await?;
        self.state
            .advance(OperationPhase::Swapped1, OperationPhase::Swapped2)?;

        let profit = ProfitabilityGuard::check(ctx.amount_owed, second.output_amount)?;
        self.state
            .advance(OperationPhase::Swapped2, OperationPhase::Verified)?;
        info!(
            realized = second.output_amount,
            owed = ctx.amount_owed,
            profit,
            "profitability verified"
        );

        RepaymentSettler::new(&self.ledger, ctx.caller)
            .settle(&ctx.asset, ctx.amount_owed)
            .await?;
        self.state
            .advance(OperationPhase::Verified, OperationPhase::Repaid)?;

        let report = self
            .build_report(&request, &ctx, path, vec![first, second], profit)
            .await;
        *self.staged.lock() = Some(report);
        Ok(())
    }

    async fn build_report(
        &self,
        request: &LoanRequest,
        ctx: &CallbackContext,
        path: &ArbitragePath,
        legs: Vec<ExecutedLeg>,
        profit: u64,
    ) -> SettlementReport {
        let mut venues = Vec::with_capacity(self.venues.len());
        for adapter in &self.venues {
            let venue = adapter.venue();
            let address = venue.address();
            let token_ledger = self.ledger.ledger();
            venues.push(VenueSnapshot {
                venue: venue.name().to_string(),
                borrow_asset_reserve: token_ledger.balance_of(&path.borrow_asset, &address).await,
                intermediate_asset_reserve: token_ledger
                    .balance_of(&path.intermediate_asset, &address)
                    .await,
            });
        }

        SettlementReport {
            operation_id: generate_id(),
            request_id: request.request_id,
            borrow_asset: self.symbol_of(&request.asset),
            principal: ctx.amount_received,
            fee: ctx.fee(),
            amount_owed: ctx.amount_owed,
            legs,
            profit,
            engine_balances: self.balances().await,
            venues,
            timestamp: chrono::Utc::now(),
        }
    }

    fn symbol_of(&self, asset: &Pubkey) -> String {
        self.assets
            .get(asset)
            .map(|a: &Asset| a.symbol.clone())
            .unwrap_or_else(|| asset.to_string())
    }
}

#[async_trait]
impl FlashLoanReceiver for FlashArbitrageEngine {
    fn receiver_address(&self) -> Pubkey {
        self.config.address
    }

    async fn on_loan_received(&self, context: CallbackContext, data: &[u8]) -> Result<(), ArbitrageError> {
        debug!(caller = %context.caller, amount = context.amount_received, "loan callback");
        self.handle_loan(context, data).await
    }
}
