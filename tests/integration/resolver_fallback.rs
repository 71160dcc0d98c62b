//! Anchor resolution across the full fallback chain.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use goldnav::config::AppConfig;
use goldnav::engine::resolver::ReferenceResolver;
use goldnav::feeds::BrokerSession;
use goldnav::types::{AnchorSet, Bar, ExchangeQuote, RefSource, Tick};

use crate::mock_feeds::{MockBroker, StaticHistory, StaticQuotes};

/// 27-Jan-2025 15:30 IST.
fn anchor_utc() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 27, 10, 0, 0).unwrap()
}

fn bar(minutes_from_anchor: i64, close: f64) -> Bar {
    Bar { time: anchor_utc() + Duration::minutes(minutes_from_anchor), close }
}

fn quote() -> StaticQuotes {
    StaticQuotes(ExchangeQuote {
        inav: "68.2543".into(),
        last_close: "₹ 68.45".into(),
        as_of: "27-Jan-2025 15:59:59".into(),
    })
}

fn resolve(
    quotes: &StaticQuotes,
    broker: &MockBroker,
    fx: &StaticHistory,
) -> AnchorSet {
    let cfg = AppConfig::default();
    let resolver = ReferenceResolver::new(
        quotes,
        broker,
        broker,
        fx,
        cfg.instrument.clone(),
        cfg.anchor.clone(),
    );
    tokio_test::block_on(resolver.resolve(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()))
}

#[test]
fn test_all_references_from_history() {
    let broker = MockBroker::new(Vec::new())
        .with_history(vec![bar(-2, 2700.0), bar(0, 2701.0), bar(2, 2702.0)]);
    let fx = StaticHistory::new(vec![bar(-1, 86.1), bar(3, 86.3)]);

    let anchor = resolve(&quote(), &broker, &fx);

    assert_eq!(anchor.ref_date(), NaiveDate::from_ymd_opt(2025, 1, 27).unwrap());
    assert_eq!(anchor.etf_ref(), 68.45);
    assert_eq!(anchor.nav_ref(), 68.2543);
    assert_eq!(anchor.gold_ref(), 2701.0);
    assert_eq!(anchor.gold_source(), RefSource::Historical);
    assert_eq!(anchor.fx_ref(), 86.1);
    assert_eq!(anchor.fx_source(), RefSource::Historical);
    assert!((anchor.premium_close() - (68.45 / 68.2543 - 1.0)).abs() < 1e-12);
}

#[test]
fn test_gold_after_anchor_only_falls_back_to_live_tick() {
    let tick = Tick { bid: 2710.0, ask: 2710.5, time: anchor_utc() };
    let broker = MockBroker::new(vec![tick]).with_history(vec![bar(1, 2720.0), bar(4, 2721.0)]);
    let fx = StaticHistory::new(vec![bar(4, 86.3)]);

    let anchor = resolve(&quote(), &broker, &fx);

    assert_eq!(anchor.gold_ref(), 2710.5);
    assert_eq!(anchor.gold_source(), RefSource::LiveTick);
    // FX takes the nearest sample even when it is after the anchor.
    assert_eq!(anchor.fx_ref(), 86.3);
}

#[test]
fn test_everything_down_uses_constants() {
    let broker = MockBroker::new(Vec::new());
    let fx = StaticHistory::failing();
    let quotes = StaticQuotes(ExchangeQuote {
        inav: "0".into(),
        last_close: "0".into(),
        as_of: "not a date".into(),
    });

    let anchor = resolve(&quotes, &broker, &fx);

    assert_eq!(anchor.ref_date(), NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
    assert_eq!(anchor.etf_ref(), 1.0);
    assert_eq!(anchor.premium_close(), 0.0);
    assert_eq!(anchor.gold_ref(), 2650.0);
    assert_eq!(anchor.gold_source(), RefSource::Constant);
    assert_eq!(anchor.fx_ref(), 84.5);
    assert_eq!(anchor.fx_source(), RefSource::Constant);
}

#[test]
fn test_broker_session_errors_are_fatal() {
    let offline = MockBroker::disconnected();
    let err = tokio_test::block_on(offline.connect()).unwrap_err();
    assert!(err.is_fatal());

    let online = MockBroker::new(Vec::new());
    assert!(tokio_test::block_on(online.connect()).is_ok());
    let err = tokio_test::block_on(online.select_symbol("XAGUSD")).unwrap_err();
    assert!(err.is_fatal());
}
