//! The live loop end to end: broker ticks in, snapshots out.

use chrono::{DateTime, NaiveDate};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use goldnav::display::DisplaySink;
use goldnav::engine::sampler::{run_live_loop, LiveSession, LoopSettings};
use goldnav::types::{AnchorSet, Tick};

use crate::mock_feeds::{CollectingSink, FixedFx, MockBroker};

fn anchor() -> AnchorSet {
    AnchorSet::new(100.0, 98.0, 2000.0, 84.0, NaiveDate::from_ymd_opt(2025, 1, 27).unwrap())
}

fn ticks(mids: &[f64]) -> Vec<Tick> {
    mids.iter()
        .enumerate()
        .map(|(i, m)| Tick {
            bid: m - 0.5,
            ask: m + 0.5,
            time: DateTime::from_timestamp(1_737_972_000 + i as i64, 0).unwrap(),
        })
        .collect()
}

fn settings() -> LoopSettings {
    LoopSettings {
        gold_symbol: "XAUUSD".into(),
        fx_pair: "USDINR=X".into(),
        fx_refresh: Duration::from_secs(30),
        ui_interval: Duration::from_millis(20),
        idle_backoff: Duration::from_millis(5),
        initial_fx_mid: 84.5,
    }
}

#[tokio::test]
async fn test_ticks_flow_to_sinks_and_session_closes() {
    let broker = Arc::new(MockBroker::new(ticks(&[2010.0, 2020.0, 2015.0, 2030.0, 2020.0])));
    let sink = CollectingSink::default();
    let sinks: Vec<Box<dyn DisplaySink>> = vec![Box::new(sink.clone())];

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = stop_tx.send(());
    });

    let (session, summary) = run_live_loop(
        broker.clone(),
        Arc::new(FixedFx(84.5)),
        &sinks,
        LiveSession::new(anchor()),
        settings(),
        async {
            let _ = stop_rx.await;
        },
    )
    .await;

    // The terminal keeps reporting the last tick; only new ones count.
    assert_eq!(summary.ticks, 5);
    assert_eq!(session.history().len(), 5);
    assert_eq!(broker.remaining(), 0);
    assert!(broker.tick_polls.load(Ordering::SeqCst) > 5);
    assert!(broker.shutdown_called.load(Ordering::SeqCst));

    let snapshots = sink.snapshots.lock().unwrap();
    assert!(!snapshots.is_empty());
    assert_eq!(summary.snapshots as usize, snapshots.len());
    // Idle UI ticks emit nothing, so far fewer snapshots than intervals.
    assert!(snapshots.len() <= 6);

    let last = snapshots.last().unwrap();
    assert_eq!(last.samples, 5);
    assert_eq!(last.gold_mid, 2020.0);
    assert_eq!(last.fx_mid, 84.5);
    assert!((last.gold_return - 0.01).abs() < 1e-12);
    assert!((last.synthetic_price - 101.601).abs() < 1e-3);
    assert_eq!(*sink.history_lens.lock().unwrap().last().unwrap(), 5);
}

#[tokio::test]
async fn test_immediate_shutdown_still_closes_broker() {
    let broker = Arc::new(MockBroker::new(ticks(&[2010.0])));
    let sinks: Vec<Box<dyn DisplaySink>> = vec![Box::new(CollectingSink::default())];

    let (_, summary) = run_live_loop(
        broker.clone(),
        Arc::new(FixedFx(84.5)),
        &sinks,
        LiveSession::new(anchor()),
        settings(),
        std::future::ready(()),
    )
    .await;

    assert_eq!(summary.ticks, 0);
    assert_eq!(summary.snapshots, 0);
    assert!(broker.shutdown_called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_quotes_sharing_a_second_all_reach_history() {
    let same_second = DateTime::from_timestamp(1_737_972_000, 0).unwrap();
    let quotes: Vec<Tick> = [2000.5, 2000.5, 2010.5, 2020.5, 2020.5]
        .iter()
        .map(|m| Tick { bid: m - 0.5, ask: m + 0.5, time: same_second })
        .collect();
    let broker = Arc::new(MockBroker::new(quotes));
    let sink = CollectingSink::default();
    let sinks: Vec<Box<dyn DisplaySink>> = vec![Box::new(sink.clone())];

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = stop_tx.send(());
    });

    let (session, summary) = run_live_loop(
        broker.clone(),
        Arc::new(FixedFx(84.5)),
        &sinks,
        LiveSession::new(anchor()),
        settings(),
        async {
            let _ = stop_rx.await;
        },
    )
    .await;

    // Identical consecutive quotes collapse; distinct ones are all kept.
    let gold: Vec<f64> = session.history().iter().map(|s| s.gold_price).collect();
    assert_eq!(gold, vec![2000.5, 2010.5, 2020.5]);
    assert_eq!(summary.ticks, 3);
    assert_eq!(sink.snapshots.lock().unwrap().last().unwrap().gold_mid, 2020.5);
}
