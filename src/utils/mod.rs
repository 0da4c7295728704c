//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod text;
pub mod url;

use std::time::Duration;

/// Sleep for a fixed throttle delay; zero is a no-op.
pub async fn pause(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}
