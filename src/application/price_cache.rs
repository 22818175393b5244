//! Reference Price Cache
//!
//! Single-slot TTL cache for the base asset's USD price.
//! - Younger than the TTL: served without a network call
//! - Expired: primary source, then secondary source
//! - Both sources down: last value served as stale, or an error on a cold cache

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::ports::{PriceFeed, PriceFeedError};

/// Default time-to-live of a fetched price
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(60);

/// Last successfully fetched price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePrice {
    pub value: Decimal,
    pub fetched_at: Instant,
}

impl ReferencePrice {
    pub fn new(value: Decimal) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Where a served price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Fetched by this call
    Fresh,
    /// Served from the slot within the TTL
    Cached,
    /// Past the TTL, served because every source failed
    Stale,
}

/// Price handed to the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceReading {
    pub value: Decimal,
    pub age: Duration,
    pub freshness: Freshness,
}

pub struct ReferencePriceCache {
    primary: Box<dyn PriceFeed>,
    secondary: Box<dyn PriceFeed>,
    ttl: Duration,
    slot: Option<ReferencePrice>,
}

impl ReferencePriceCache {
    /// Create a cache with the default 60s TTL
    pub fn new(primary: Box<dyn PriceFeed>, secondary: Box<dyn PriceFeed>) -> Self {
        Self {
            primary,
            secondary,
            ttl: DEFAULT_PRICE_TTL,
            slot: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Current slot content, regardless of age
    pub fn current(&self) -> Option<ReferencePrice> {
        self.slot
    }

    /// Best available price.
    ///
    /// Fails only when both sources fail and nothing was ever cached.
    pub async fn get_reference_price(&mut self) -> Result<PriceReading, PriceFeedError> {
        if let Some(cached) = self.slot.filter(|p| p.is_fresh(self.ttl)) {
            return Ok(PriceReading {
                value: cached.value,
                age: cached.age(),
                freshness: Freshness::Cached,
            });
        }

        match self.refresh().await {
            Ok(value) => Ok(PriceReading {
                value,
                age: Duration::ZERO,
                freshness: Freshness::Fresh,
            }),
            Err(e) => match self.slot {
                Some(stale) => {
                    tracing::warn!(
                        "Reference price refresh failed, serving stale ${} ({}s old): {}",
                        stale.value,
                        stale.age().as_secs(),
                        e
                    );
                    Ok(PriceReading {
                        value: stale.value,
                        age: stale.age(),
                        freshness: Freshness::Stale,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Fetch from the sources unconditionally and overwrite the slot.
    ///
    /// Propagates the combined failure when both sources fail; the slot is
    /// left untouched in that case.
    pub async fn refresh(&mut self) -> Result<Decimal, PriceFeedError> {
        let primary_error = match fetch_positive(self.primary.as_ref()).await {
            Ok(value) => return Ok(self.store(value)),
            Err(e) => e,
        };

        tracing::warn!(
            "Primary price source {} failed ({}), trying {}",
            self.primary.name(),
            primary_error,
            self.secondary.name()
        );

        match fetch_positive(self.secondary.as_ref()).await {
            Ok(value) => Ok(self.store(value)),
            Err(secondary_error) => Err(PriceFeedError::AllSourcesFailed {
                primary: primary_error.to_string(),
                secondary: secondary_error.to_string(),
            }),
        }
    }

    fn store(&mut self, value: Decimal) -> Decimal {
        self.slot = Some(ReferencePrice::new(value));
        value
    }
}

async fn fetch_positive(feed: &dyn PriceFeed) -> Result<Decimal, PriceFeedError> {
    let value = feed.fetch_usd_price().await?;
    if value <= Decimal::ZERO {
        return Err(PriceFeedError::NonPositive(value));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::price_feed::MockPriceFeed;
    use rust_decimal_macros::dec;

    fn feed(name: &'static str) -> MockPriceFeed {
        let mut mock = MockPriceFeed::new();
        mock.expect_name().return_const(name.to_string());
        mock
    }

    fn cache(primary: MockPriceFeed, secondary: MockPriceFeed) -> ReferencePriceCache {
        ReferencePriceCache::new(Box::new(primary), Box::new(secondary))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_then_cached_within_ttl() {
        let mut primary = feed("primary");
        primary
            .expect_fetch_usd_price()
            .times(1)
            .returning(|| Ok(dec!(125.40)));
        let mut secondary = feed("secondary");
        secondary.expect_fetch_usd_price().never();

        let mut cache = cache(primary, secondary);

        let first = cache.get_reference_price().await.unwrap();
        assert_eq!(first.value, dec!(125.40));
        assert_eq!(first.freshness, Freshness::Fresh);

        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.get_reference_price().await.unwrap();
        assert_eq!(second.value, dec!(125.40));
        assert_eq!(second.freshness, Freshness::Cached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetches_after_ttl() {
        let mut primary = feed("primary");
        let mut seq = mockall::Sequence::new();
        primary
            .expect_fetch_usd_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(dec!(100)));
        primary
            .expect_fetch_usd_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(dec!(110)));
        let secondary = feed("secondary");

        let mut cache = cache(primary, secondary);
        assert_eq!(cache.get_reference_price().await.unwrap().value, dec!(100));

        tokio::time::advance(Duration::from_secs(61)).await;
        let reading = cache.get_reference_price().await.unwrap();
        assert_eq!(reading.value, dec!(110));
        assert_eq!(reading.freshness, Freshness::Fresh);
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary() {
        let mut primary = feed("primary");
        primary
            .expect_fetch_usd_price()
            .times(1)
            .returning(|| Err(PriceFeedError::Parse("bad payload".into())));
        let mut secondary = feed("secondary");
        secondary
            .expect_fetch_usd_price()
            .times(1)
            .returning(|| Ok(dec!(124.9)));

        let mut cache = cache(primary, secondary);
        let reading = cache.get_reference_price().await.unwrap();

        assert_eq!(reading.value, dec!(124.9));
        assert_eq!(cache.current().unwrap().value, dec!(124.9));
    }

    #[tokio::test]
    async fn test_non_positive_primary_uses_secondary() {
        let mut primary = feed("primary");
        primary
            .expect_fetch_usd_price()
            .returning(|| Ok(Decimal::ZERO));
        let mut secondary = feed("secondary");
        secondary
            .expect_fetch_usd_price()
            .returning(|| Ok(dec!(1.5)));

        let mut cache = cache(primary, secondary);
        assert_eq!(cache.get_reference_price().await.unwrap().value, dec!(1.5));
    }

    #[tokio::test]
    async fn test_cold_cache_both_fail() {
        let mut primary = feed("primary");
        primary
            .expect_fetch_usd_price()
            .returning(|| Err(PriceFeedError::Status { status: 500, url: "p".into() }));
        let mut secondary = feed("secondary");
        secondary
            .expect_fetch_usd_price()
            .returning(|| Err(PriceFeedError::MissingAsset("monad".into())));

        let mut cache = cache(primary, secondary);
        let result = cache.get_reference_price().await;

        assert!(matches!(result, Err(PriceFeedError::AllSourcesFailed { .. })));
        assert!(cache.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_warm_cache_serves_stale() {
        let mut primary = feed("primary");
        let mut seq = mockall::Sequence::new();
        primary
            .expect_fetch_usd_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(dec!(125.40)));
        primary
            .expect_fetch_usd_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(PriceFeedError::Parse("timeout".into())));
        let mut secondary = feed("secondary");
        secondary
            .expect_fetch_usd_price()
            .returning(|| Err(PriceFeedError::Parse("timeout".into())));

        let mut cache = cache(primary, secondary);
        cache.get_reference_price().await.unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        let reading = cache.get_reference_price().await.unwrap();

        assert_eq!(reading.value, dec!(125.40));
        assert_eq!(reading.freshness, Freshness::Stale);
        assert!(reading.age >= Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_refresh_propagates_failure_even_when_warm() {
        let mut primary = feed("primary");
        let mut seq = mockall::Sequence::new();
        primary
            .expect_fetch_usd_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(dec!(3)));
        primary
            .expect_fetch_usd_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(PriceFeedError::Parse("down".into())));
        let mut secondary = feed("secondary");
        secondary
            .expect_fetch_usd_price()
            .returning(|| Err(PriceFeedError::Parse("down".into())));

        let mut cache = cache(primary, secondary);
        assert_eq!(cache.refresh().await.unwrap(), dec!(3));
        assert!(cache.refresh().await.is_err());
        assert_eq!(cache.current().unwrap().value, dec!(3));
    }
}
