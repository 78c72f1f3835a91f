//! Application supervisor and monitoring
//!
//! Startup banner, uptime heartbeat and periodic health of the
//! interrupt-to-main-loop path.

use embassy_time::{Duration, Timer};

use crate::channels::{LINE_BLOCK, SIGNAL_QUEUE};
use crate::config;
use crate::interrupt::ExtiController;

/// Application supervisor responsible for monitoring and lifecycle management
pub struct AppSupervisor {
    uptime_seconds: u32,
    last_report: u32,
}

impl AppSupervisor {
    pub const fn new() -> Self {
        Self {
            uptime_seconds: 0,
            last_report: 0,
        }
    }

    /// Print application startup banner with the line and queue layout
    pub fn print_startup_banner(&self) {
        info!("========================================");
        info!("ExtSignal v{}", env!("CARGO_PKG_VERSION"));
        info!("Interrupt lines and stack event dispatch");
        info!("========================================");
        info!("Hardware: RP2040 (Raspberry Pi Pico)");
        info!(
            "Lines: {} in {} groups of {}",
            config::CHANNEL_COUNT,
            config::GROUP_COUNT,
            config::CHANNELS_PER_GROUP
        );
        info!(
            "Queues: {} notifications, {} stack records",
            config::SIGNAL_QUEUE_DEPTH,
            config::STACK_EVENT_QUEUE_DEPTH
        );
        info!(
            "Stack UART: {} baud, records up to {} bytes",
            config::STACK_UART_BAUDRATE,
            config::MAX_RECORD_PAYLOAD
        );
        info!("========================================");
    }

    /// Print successful initialization message
    pub fn print_init_success(&self) {
        info!("ExtSignal initialized successfully");
        info!("Waiting for stack events...");
    }

    /// Run the supervisor loop
    pub async fn run(&mut self) -> ! {
        info!("Application supervisor started");

        loop {
            Timer::after(Duration::from_secs(config::HEARTBEAT_PERIOD_SECS)).await;
            self.uptime_seconds += config::HEARTBEAT_PERIOD_SECS as u32;

            if self.uptime_seconds - self.last_report >= config::STATUS_REPORT_SECS {
                self.print_status();
                self.last_report = self.uptime_seconds;
            }
        }
    }

    /// Print current application status
    fn print_status(&self) {
        let minutes = self.uptime_seconds / 60;
        let hours = minutes / 60;
        let remaining_minutes = minutes % 60;

        if hours > 0 {
            info!("Status: Uptime {}h{}m", hours, remaining_minutes);
        } else {
            info!("Status: Uptime {}m", minutes);
        }

        info!(
            "Lines: enabled={:04x} pending={:04x}",
            LINE_BLOCK.enabled(),
            LINE_BLOCK.pending()
        );

        let merged = SIGNAL_QUEUE.merged();
        let dropped = SIGNAL_QUEUE.dropped();
        if dropped > 0 {
            warn!(
                "Notifications: {} merged, {} application signals dropped",
                merged, dropped
            );
        } else {
            info!("Notifications: {} merged on overflow", merged);
        }
    }
}

impl Default for AppSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[embassy_executor::task]
pub async fn supervisor_task(mut supervisor: AppSupervisor) -> ! {
    supervisor.run().await
}
