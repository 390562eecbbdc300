use super::Device;
use crate::core::shutdown::Shutdown;
use std::time::Duration;
use tracing::{debug, info};

pub const HANDSHAKE_INTERVAL: Duration = Duration::from_millis(500);

/// Blocks until the device answers the identifying query. Retries forever; only a
/// shutdown request ends the wait early, in which case `None` is returned.
pub async fn wait_for_device(device: &Device, shutdown: &Shutdown) -> Option<String> {
    info!("Waiting for device");
    loop {
        match device.identify().await {
            Ok(model) => {
                info!("Device found: {}", model);
                return Some(model);
            }
            Err(e) => debug!("device not ready: {}", e),
        }
        if !shutdown.sleep(HANDSHAKE_INTERVAL).await {
            return None;
        }
    }
}
