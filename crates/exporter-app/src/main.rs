use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{info, warn};

use device_client::fake::{demo_points, FakeClient};
use exporter_app::config::ExporterConfig;
use exporter_app::http::{router, AppState};
use metrics_render::{MeterMetrics, RenderCache};
use poller_actor::{ActorConfig, PollerActor};
use reading_store::ReadingStore;
use types::{DeviceConfig, ProtocolVersion};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = parse_config_arg();
    let config = ExporterConfig::load_with_path(config_path).context("load config failed")?;
    config.validate().context("config validation failed")?;

    if !config.devices.is_empty() && !config.simulate {
        anyhow::bail!(
            "this build ships only the simulated device backend; \
             set simulate = true (or TUYA_SIMULATE=true), or wire a \
             production DeviceClient implementation"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let store = Arc::new(ReadingStore::new(
        config.devices.iter().map(|device| device.device_id.clone()),
    ));
    let metrics = Arc::new(MeterMetrics::new().context("metrics registry init failed")?);
    let cache = Arc::new(RenderCache::new(config.cache_ttl));

    let specs = build_poller_specs(&config, Arc::clone(&store), shutdown_rx.clone());
    let mut join_set = JoinSet::new();
    for spec in specs.values() {
        spawn_poller(spec.clone(), &mut join_set, Duration::from_millis(0));
    }

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("bind port {}", config.listen_port))?;
    info!(port = config.listen_port, "serving metrics endpoint");

    let app = router(AppState {
        store,
        metrics,
        cache,
    });
    let mut server_shutdown = shutdown_rx.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    notify_ready();

    let shutdown_signal = tokio::signal::ctrl_c();
    tokio::pin!(shutdown_signal);
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
                break;
            }
            maybe_result = join_set.join_next(), if !join_set.is_empty() => {
                if let Some(result) = maybe_result {
                    match result {
                        Ok(device_id) => {
                            warn!(device = %device_id, "poller exited unexpectedly");
                            if let Some(spec) = specs.get(&device_id) {
                                spawn_poller(
                                    spec.clone(),
                                    &mut join_set,
                                    Duration::from_millis(config.respawn_delay_ms),
                                );
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "poller task failed");
                        }
                    }
                }
            }
        }
    }

    server.await.context("server task join failed")??;

    join_set.abort_all();
    while let Some(result) = join_set.join_next().await {
        if let Err(err) = result {
            if !err.is_cancelled() {
                warn!(error = %err, "poller task join failed");
            }
        }
    }

    Ok(())
}

#[derive(Clone)]
struct PollerSpec {
    device: DeviceConfig,
    client: FakeClient,
    store: Arc<ReadingStore>,
    shutdown: watch::Receiver<bool>,
    poller_config: ActorConfig,
}

fn build_poller_specs(
    config: &ExporterConfig,
    store: Arc<ReadingStore>,
    shutdown: watch::Receiver<bool>,
) -> HashMap<String, PollerSpec> {
    let mut specs = HashMap::new();

    for device in &config.devices {
        // Simulated meters answer on 3.3.
        let client = FakeClient::accepting(ProtocolVersion::V3_3).with_points(demo_points());
        let spec = PollerSpec {
            device: device.clone(),
            client,
            store: Arc::clone(&store),
            shutdown: shutdown.clone(),
            poller_config: config.poller.clone(),
        };
        specs.insert(device.device_id.clone(), spec);
    }

    specs
}

fn spawn_poller(spec: PollerSpec, join_set: &mut JoinSet<String>, delay: Duration) {
    let device_id = spec.device.device_id.clone();
    join_set.spawn(async move {
        if delay > Duration::from_millis(0) {
            sleep(delay).await;
        }
        let actor = PollerActor::new(
            spec.device,
            spec.client,
            spec.store,
            spec.shutdown,
            spec.poller_config,
        );
        actor.run().await;
        device_id
    });
}

fn parse_config_arg() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn notify_ready() {
    if let Err(err) = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]) {
        warn!(error = %err, "systemd ready notify failed");
    }
}

#[cfg(not(target_os = "linux"))]
fn notify_ready() {}
