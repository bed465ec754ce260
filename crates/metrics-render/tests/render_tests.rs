use std::sync::Arc;
use std::time::Duration;

use metrics_render::{MeterMetrics, RenderCache};
use reading_store::ReadingStore;
use types::DeviceReading;

fn reading_with_voltage(voltage: f64) -> DeviceReading {
    DeviceReading {
        voltage,
        frequency: 49.98,
        ..DeviceReading::missing()
    }
}

#[test]
fn render_reports_labeled_device_samples() {
    let metrics = MeterMetrics::new().expect("metrics");
    let store = ReadingStore::new(["meter-1"]);
    store.set("meter-1", reading_with_voltage(238.1));

    let payload = metrics.render(&store.snapshot()).expect("render");
    let text = String::from_utf8(payload).expect("utf-8");

    assert!(text.contains("tuya_voltage{device_id=\"meter-1\"} 238.1"));
    assert!(text.contains("# HELP tuya_voltage Voltage in V."));
    assert!(text.contains("# TYPE tuya_voltage gauge"));
    // Fields the poller has not produced yet surface as NaN, not as absent.
    assert!(text.contains("tuya_current_a{device_id=\"meter-1\"} NaN"));
}

#[test]
fn empty_store_renders_a_well_formed_payload() {
    let metrics = MeterMetrics::new().expect("metrics");
    let store = ReadingStore::new(Vec::<String>::new());

    let payload = metrics.render(&store.snapshot()).expect("render");
    let text = String::from_utf8(payload).expect("utf-8");

    assert!(!text.contains("device_id"));
}

#[tokio::test(start_paused = true)]
async fn cache_serves_identical_bytes_within_the_ttl() {
    let metrics = MeterMetrics::new().expect("metrics");
    let store = ReadingStore::new(["meter-1"]);
    let cache = RenderCache::new(Duration::from_secs(5));
    store.set("meter-1", reading_with_voltage(238.1));

    let first = cache.payload(&metrics, &store).await.expect("render");

    // The store moves on, but the cache must not.
    store.set("meter-1", reading_with_voltage(240.0));
    tokio::time::advance(Duration::from_secs(2)).await;
    let second = cache.payload(&metrics, &store).await.expect("render");
    assert_eq!(first, second);

    tokio::time::advance(Duration::from_secs(4)).await;
    let third = cache.payload(&metrics, &store).await.expect("render");
    assert_ne!(first, third);
    let text = String::from_utf8(third).expect("utf-8");
    assert!(text.contains("tuya_voltage{device_id=\"meter-1\"} 240"));
}

#[tokio::test]
async fn concurrent_scrapes_agree_on_one_payload() {
    let metrics = Arc::new(MeterMetrics::new().expect("metrics"));
    let store = Arc::new(ReadingStore::new(["meter-1"]));
    let cache = Arc::new(RenderCache::new(Duration::from_secs(5)));
    store.set("meter-1", reading_with_voltage(238.1));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let metrics = Arc::clone(&metrics);
        let store = Arc::clone(&store);
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache.payload(&metrics, &store).await.expect("render")
        }));
    }

    let mut payloads = Vec::new();
    for handle in handles {
        payloads.push(handle.await.expect("join"));
    }

    let first = payloads[0].clone();
    assert!(payloads.iter().all(|payload| *payload == first));
}

#[tokio::test(start_paused = true)]
async fn stale_exposes_the_last_rendered_payload() {
    let metrics = MeterMetrics::new().expect("metrics");
    let store = ReadingStore::new(["meter-1"]);
    let cache = RenderCache::new(Duration::from_secs(5));

    assert!(cache.stale().await.is_none());

    let payload = cache.payload(&metrics, &store).await.expect("render");
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(cache.stale().await, Some(payload));
}
