//! Tray backend without a desktop session.

use tracing::{debug, info};

use super::{TrayBackend, TrayError, TrayIo, TrayUpdate};

/// Logs indicator changes instead of drawing them.
#[derive(Debug, Default)]
pub struct HeadlessTray {
    last: Option<TrayUpdate>,
}

impl TrayBackend for HeadlessTray {
    fn name(&self) -> &str {
        "headless"
    }

    fn run(mut self: Box<Self>, mut io: TrayIo) -> Result<(), TrayError> {
        io.ready.ready();
        info!("Headless tray running");

        for update in io.updates.iter() {
            let tier_changed = self.last.as_ref().map(|l| l.tier) != Some(update.tier);
            if tier_changed {
                info!(tier = %update.tier, tooltip = %update.tooltip, "Indicator tier changed");
            } else {
                debug!(tooltip = %update.tooltip, "Indicator updated");
            }
            self.last = Some(update);
        }

        Ok(())
    }
}
