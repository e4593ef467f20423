//! Shared test utilities.

pub mod mock_ws;

use std::time::Duration;

/// Poll `condition` until it holds or five seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
