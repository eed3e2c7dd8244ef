use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use vehicle_core::can::{CanBus, LoopbackCanBus};
use vehicle_core::config::Config;
use vehicle_core::driver::runtime::VehicleRuntime;
use vehicle_core::events::{EventBus, InMemoryEventBus};
use vehicle_core::logging::{get_logger, init_logging};
use vehicle_core::metrics::{InMemoryMetricStore, MetricStore};
use vehicle_core::notify::{NoopNotificationService, NotificationService};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::load()?);
    config.validate()?;
    init_logging(&config.logging)?;

    let logger = get_logger("main");
    logger.info("vehicle-core starting up");

    let metrics: Arc<dyn MetricStore> = Arc::new(InMemoryMetricStore::new());
    let events: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new());
    let notify: Arc<dyn NotificationService> = Arc::new(NoopNotificationService);

    // The CAN-hardware driver is an out-of-scope external collaborator; this
    // loopback bus stands in for it until a real adapter (SocketCAN, a
    // vendor bridge, ...) is wired in behind the `CanBus` trait.
    let bus: Arc<dyn CanBus> = Arc::new(LoopbackCanBus::new());

    let (_commands_tx, commands_rx) = mpsc::unbounded_channel();

    let mut runtime = VehicleRuntime::new(
        config.clone(),
        metrics,
        events,
        notify,
        vec![bus],
        commands_rx,
    );

    #[cfg(feature = "web")]
    {
        let web_state = vehicle_core::web::AppState {
            config: config.clone(),
            commands: _commands_tx.clone(),
        };
        let web_config = config.clone();
        tokio::spawn(async move {
            if let Err(e) =
                vehicle_core::web::serve(web_state, &web_config.web.host, web_config.web.port)
                    .await
            {
                get_logger("web").error(&format!("web surface failed: {e}"));
            }
        });
    }

    match runtime.run().await {
        Ok(()) => {
            logger.info("vehicle runtime shutdown complete");
            Ok(())
        }
        Err(e) => {
            logger.error(&format!("vehicle runtime failed: {e}"));
            Err(anyhow::anyhow!("vehicle runtime error: {e}"))
        }
    }
}
