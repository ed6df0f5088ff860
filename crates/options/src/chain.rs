use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::time::timeout;
use tracing::{debug, info};

use sentinel_core::{
    EngineError, Instrument, LadderConfig, OptionRight, QuotedContract, VenueAdapter,
};

/// Cached out-of-the-money contract ladder for one watch, grouped by expiry.
///
/// Every contract was chosen as a fixed strike ladder from `locked_reference`
/// at capture time. Within an expiry the contracts are kept nearest-strike
/// first, so ladder rank 0 is the closest OTM strike.
#[derive(Debug, Clone)]
pub struct ChainCache {
    right: OptionRight,
    locked_reference: Decimal,
    captured_at: DateTime<Utc>,
    expiries: BTreeMap<NaiveDate, Vec<QuotedContract>>,
    selected_expiry: Option<NaiveDate>,
}

impl ChainCache {
    /// Re-filter: fetch a new contract ladder centered on `reference` and
    /// build a cache around it. Replaces any previous cache wholesale.
    ///
    /// # Errors
    ///
    /// `AdapterTimeout`/`Adapter` when the chain query fails, and
    /// `DataUnavailable` when the venue returns no usable contracts. The
    /// caller keeps its previous cache in either case.
    pub async fn capture(
        adapter: &dyn VenueAdapter,
        instrument: &Instrument,
        reference: Decimal,
        right: OptionRight,
        ladder: &LadderConfig,
        deadline: Duration,
    ) -> Result<Self, EngineError> {
        let contracts = timeout(
            deadline,
            adapter.option_chain(instrument, reference, right, ladder.strikes, ladder.expiries),
        )
        .await
        .map_err(|_| EngineError::AdapterTimeout("option chain fetch"))?
        .map_err(EngineError::Adapter)?;

        if contracts.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "{}: no {right} contracts near {reference}",
                instrument.symbol
            )));
        }

        let mut expiries: BTreeMap<NaiveDate, Vec<QuotedContract>> = BTreeMap::new();
        for contract in contracts {
            expiries
                .entry(contract.expiry)
                .or_default()
                .push(QuotedContract::unquoted(contract));
        }
        for group in expiries.values_mut() {
            group.sort_by(|a, b| {
                let da = (a.contract.strike - reference).abs();
                let db = (b.contract.strike - reference).abs();
                da.cmp(&db)
            });
            group.truncate(ladder.strikes);
        }

        let selected_expiry = expiries.keys().next().copied();
        let total: usize = expiries.values().map(Vec::len).sum();
        info!(
            symbol = %instrument.symbol,
            %right,
            %reference,
            expiries = expiries.len(),
            contracts = total,
            "Captured option ladder"
        );

        let mut cache = Self {
            right,
            locked_reference: reference,
            captured_at: Utc::now(),
            expiries,
            selected_expiry,
        };

        // Initial quotes; a failure here leaves the ladder usable, unquoted.
        if let Err(e) = cache.refresh(adapter, None, deadline).await {
            debug!(error = %e, "Initial quote refresh failed; ladder kept unquoted");
        }
        Ok(cache)
    }

    /// Refresh: re-query quotes for the existing contract set, in place.
    /// Strikes and the locked reference are untouched. With `expiry` given,
    /// only that expiry's contracts are queried.
    ///
    /// Returns the number of contracts whose quotes were updated.
    ///
    /// # Errors
    ///
    /// `AdapterTimeout`/`Adapter` on a failed quote query; previous quote
    /// values stay in place (stale but available).
    pub async fn refresh(
        &mut self,
        adapter: &dyn VenueAdapter,
        expiry: Option<NaiveDate>,
        deadline: Duration,
    ) -> Result<usize, EngineError> {
        let ids: Vec<i64> = self
            .contracts_for(expiry)
            .map(|q| q.contract.contract_id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let quotes = timeout(deadline, adapter.option_quotes(&ids))
            .await
            .map_err(|_| EngineError::AdapterTimeout("option quote refresh"))?
            .map_err(EngineError::Adapter)?;

        let mut updated = 0;
        for quote in quotes {
            for group in self.expiries.values_mut() {
                if let Some(cached) = group
                    .iter_mut()
                    .find(|q| q.contract.contract_id == quote.contract_id)
                {
                    cached.bid = quote.bid.or(cached.bid);
                    cached.ask = quote.ask.or(cached.ask);
                    cached.last = quote.last.or(cached.last);
                    cached.volume = quote.volume;
                    updated += 1;
                }
            }
        }
        debug!(updated, "Refreshed option quotes");
        Ok(updated)
    }

    /// Switch the exposed expiry without destroying cached data for others.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when the expiry is not in the cache.
    pub fn select_expiry(&mut self, expiry: NaiveDate) -> Result<(), EngineError> {
        if !self.expiries.contains_key(&expiry) {
            return Err(EngineError::InvalidConfig(format!(
                "expiry {expiry} is not in the cached ladder"
            )));
        }
        self.selected_expiry = Some(expiry);
        Ok(())
    }

    /// Contracts of the selected expiry, nearest strike first. Only these are
    /// exposed for order construction.
    #[must_use]
    pub fn selected_contracts(&self) -> &[QuotedContract] {
        self.selected_expiry
            .and_then(|e| self.expiries.get(&e))
            .map_or(&[], Vec::as_slice)
    }

    /// The nth-nearest contract of the selected expiry.
    #[must_use]
    pub fn contract_at_rank(&self, rank: usize) -> Option<&QuotedContract> {
        self.selected_contracts().get(rank)
    }

    #[must_use]
    pub fn locked_reference(&self) -> Decimal {
        self.locked_reference
    }

    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    #[must_use]
    pub fn right(&self) -> OptionRight {
        self.right
    }

    #[must_use]
    pub fn selected_expiry(&self) -> Option<NaiveDate> {
        self.selected_expiry
    }

    /// Cached expiry dates, nearest first.
    #[must_use]
    pub fn expiry_dates(&self) -> Vec<NaiveDate> {
        self.expiries.keys().copied().collect()
    }

    /// All strikes currently cached, per expiry. Used to assert ladder
    /// stability across refreshes.
    #[must_use]
    pub fn strikes(&self) -> BTreeMap<NaiveDate, Vec<Decimal>> {
        self.expiries
            .iter()
            .map(|(e, group)| (*e, group.iter().map(|q| q.contract.strike).collect()))
            .collect()
    }

    fn contracts_for(&self, expiry: Option<NaiveDate>) -> impl Iterator<Item = &QuotedContract> {
        self.expiries
            .iter()
            .filter(move |(e, _)| expiry.map_or(true, |want| **e == want))
            .flat_map(|(_, group)| group.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use sentinel_core::{
        AccountSummary, ContractQuote, LegAck, LegOrder, OptionContract, OrderType, QuoteSnapshot,
        VenuePosition,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Canned venue: call strikes in $5 steps above the reference, two
    /// expiries, asks that change on every quote query.
    struct FakeVenue {
        quote_calls: AtomicU32,
    }

    impl FakeVenue {
        fn new() -> Self {
            Self {
                quote_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VenueAdapter for FakeVenue {
        async fn quote_snapshot(&self, _instrument: &Instrument) -> Result<QuoteSnapshot> {
            unimplemented!("not used by chain tests")
        }

        async fn historical_bars(
            &self,
            _instrument: &Instrument,
            _bars: usize,
        ) -> Result<Vec<Decimal>> {
            unimplemented!("not used by chain tests")
        }

        async fn option_chain(
            &self,
            instrument: &Instrument,
            reference: Decimal,
            right: OptionRight,
            strikes: usize,
            expiries: usize,
        ) -> Result<Vec<OptionContract>> {
            let base = (reference / dec!(5)).floor() * dec!(5);
            let mut out = Vec::new();
            for (e, expiry) in [
                NaiveDate::from_ymd_opt(2026, 9, 18).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            ]
            .into_iter()
            .enumerate()
            .take(expiries)
            {
                for i in 0..strikes {
                    let step = Decimal::from(i as i64 + 1) * dec!(5);
                    let strike = match right {
                        OptionRight::Call => base + step,
                        OptionRight::Put => base - step,
                    };
                    out.push(OptionContract {
                        contract_id: (e as i64 + 1) * 1000 + i as i64,
                        symbol: instrument.symbol.clone(),
                        expiry,
                        strike,
                        right,
                        multiplier: dec!(100),
                    });
                }
            }
            Ok(out)
        }

        async fn option_quotes(&self, contract_ids: &[i64]) -> Result<Vec<ContractQuote>> {
            let call = self.quote_calls.fetch_add(1, Ordering::SeqCst);
            Ok(contract_ids
                .iter()
                .map(|id| ContractQuote {
                    contract_id: *id,
                    bid: Some(dec!(2.00) + Decimal::from(call)),
                    ask: Some(dec!(2.50) + Decimal::from(call)),
                    last: Some(dec!(2.25) + Decimal::from(call)),
                    volume: 100,
                })
                .collect())
        }

        async fn submit_order(&self, _legs: &[LegOrder]) -> Result<Vec<LegAck>> {
            unimplemented!("not used by chain tests")
        }

        async fn cancel_order(&self, _order_id: &str) -> Result<()> {
            unimplemented!("not used by chain tests")
        }

        async fn close_position(
            &self,
            _contract_id: i64,
            _quantity: Decimal,
            _order_type: OrderType,
        ) -> Result<LegAck> {
            unimplemented!("not used by chain tests")
        }

        async fn account_summary(&self) -> Result<AccountSummary> {
            unimplemented!("not used by chain tests")
        }

        async fn positions(&self) -> Result<Vec<VenuePosition>> {
            unimplemented!("not used by chain tests")
        }
    }

    const DEADLINE: Duration = Duration::from_secs(1);

    async fn capture(venue: &FakeVenue, reference: Decimal) -> ChainCache {
        ChainCache::capture(
            venue,
            &Instrument::stock("SPY"),
            reference,
            OptionRight::Call,
            &LadderConfig::default(),
            DEADLINE,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn capture_locks_reference_and_groups_by_expiry() {
        let venue = FakeVenue::new();
        let cache = capture(&venue, dec!(600)).await;

        assert_eq!(cache.locked_reference(), dec!(600));
        assert_eq!(cache.expiry_dates().len(), 2);
        // Nearest expiry selected automatically.
        assert_eq!(
            cache.selected_expiry(),
            Some(NaiveDate::from_ymd_opt(2026, 9, 18).unwrap())
        );
        // Five strikes, nearest first.
        let strikes: Vec<Decimal> = cache
            .selected_contracts()
            .iter()
            .map(|q| q.contract.strike)
            .collect();
        assert_eq!(
            strikes,
            vec![dec!(605), dec!(610), dec!(615), dec!(620), dec!(625)]
        );
    }

    #[tokio::test]
    async fn refresh_never_moves_the_ladder() {
        let venue = FakeVenue::new();
        let mut cache = capture(&venue, dec!(600)).await;

        let reference_before = cache.locked_reference();
        let strikes_before = cache.strikes();
        let ask_before = cache.selected_contracts()[0].ask;

        let updated = cache.refresh(&venue, None, DEADLINE).await.unwrap();
        assert_eq!(updated, 10);

        assert_eq!(cache.locked_reference(), reference_before);
        assert_eq!(cache.strikes(), strikes_before);
        // Quotes moved in place.
        assert_ne!(cache.selected_contracts()[0].ask, ask_before);
    }

    #[tokio::test]
    async fn refilter_replaces_reference_and_strikes() {
        let venue = FakeVenue::new();
        let cache = capture(&venue, dec!(600)).await;
        let recaptured = capture(&venue, dec!(650)).await;

        assert_ne!(recaptured.locked_reference(), cache.locked_reference());
        assert_ne!(recaptured.strikes(), cache.strikes());
        assert_eq!(recaptured.selected_contracts()[0].contract.strike, dec!(655));
    }

    #[tokio::test]
    async fn per_expiry_refresh_touches_only_that_expiry() {
        let venue = FakeVenue::new();
        let mut cache = capture(&venue, dec!(600)).await;
        let far = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let far_ask_before = cache.expiries[&far][0].ask;

        let near = NaiveDate::from_ymd_opt(2026, 9, 18).unwrap();
        let updated = cache.refresh(&venue, Some(near), DEADLINE).await.unwrap();
        assert_eq!(updated, 5);
        assert_eq!(cache.expiries[&far][0].ask, far_ask_before);
    }

    #[tokio::test]
    async fn select_expiry_keeps_other_expiries_cached() {
        let venue = FakeVenue::new();
        let mut cache = capture(&venue, dec!(600)).await;
        let far = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        cache.select_expiry(far).unwrap();
        assert_eq!(cache.selected_expiry(), Some(far));
        assert_eq!(cache.selected_contracts().len(), 5);
        assert_eq!(cache.expiry_dates().len(), 2);

        let bogus = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        assert!(matches!(
            cache.select_expiry(bogus),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
