//! Windows notification-area icon built on `tray-icon`.
//!
//! The icon and its menu must be created and pumped on the same thread, so
//! everything here runs inside the tray thread's loop.

use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tempwatch_core::{IconTier, TrayGesture, MENU_ITEMS};
use tracing::{info, warn};
use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
};

use super::{glyph_rgba, TrayBackend, TrayError, TrayFlow, TrayIo};

const ICON_SIZE: u32 = 32;
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Default)]
pub struct NativeTray;

fn icon_for(tier: IconTier) -> Result<Icon, TrayError> {
    Icon::from_rgba(glyph_rgba(tier, ICON_SIZE), ICON_SIZE, ICON_SIZE)
        .map_err(|e| TrayError::Backend(e.to_string()))
}

fn build_menu() -> Result<Menu, TrayError> {
    let menu = Menu::new();
    for (index, command) in MENU_ITEMS.iter().enumerate() {
        if index + 1 == MENU_ITEMS.len() {
            menu.append(&PredefinedMenuItem::separator())
                .map_err(|e| TrayError::Init(e.to_string()))?;
        }
        let item = MenuItem::with_id(MenuId::new(command.menu_id()), command.label(), true, None);
        menu.append(&item)
            .map_err(|e| TrayError::Init(e.to_string()))?;
    }
    Ok(menu)
}

fn build_icon() -> Result<TrayIcon, TrayError> {
    TrayIconBuilder::new()
        .with_menu(Box::new(build_menu()?))
        .with_menu_on_left_click(false)
        .with_tooltip("No sensor data")
        .with_icon(icon_for(IconTier::Normal)?)
        .build()
        .map_err(|e| TrayError::Init(e.to_string()))
}

fn gesture_for(event: TrayIconEvent) -> Option<TrayGesture> {
    match event {
        TrayIconEvent::Click {
            button: MouseButton::Left,
            button_state: MouseButtonState::Up,
            ..
        } => Some(TrayGesture::PrimaryClick),
        TrayIconEvent::Click {
            button: MouseButton::Right,
            button_state: MouseButtonState::Up,
            ..
        } => Some(TrayGesture::SecondaryClick),
        TrayIconEvent::DoubleClick {
            button: MouseButton::Left,
            ..
        } => Some(TrayGesture::DoubleClick),
        _ => None,
    }
}

fn pump_messages() {
    // SAFETY: standard Win32 message pump on the thread that owns the icon window.
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

impl TrayBackend for NativeTray {
    fn name(&self) -> &str {
        "native"
    }

    fn run(self: Box<Self>, mut io: TrayIo) -> Result<(), TrayError> {
        let tray = match build_icon() {
            Ok(tray) => tray,
            Err(e) => {
                io.ready.failed(e.to_string());
                return Err(e);
            }
        };
        io.ready.ready();
        info!("Native tray icon created");

        let mut current = IconTier::Normal;
        let menu_events = MenuEvent::receiver();
        let icon_events = TrayIconEvent::receiver();

        loop {
            pump_messages();

            while let Ok(event) = icon_events.try_recv() {
                if let Some(gesture) = gesture_for(event) {
                    if io.sink.handle(&gesture) == TrayFlow::Exit {
                        return Ok(());
                    }
                }
            }

            while let Ok(event) = menu_events.try_recv() {
                let gesture = TrayGesture::MenuItem(event.id().0.clone());
                if io.sink.handle(&gesture) == TrayFlow::Exit {
                    return Ok(());
                }
            }

            match io.updates.recv_timeout(PUMP_INTERVAL) {
                Ok(update) => {
                    if update.tier != current {
                        match icon_for(update.tier).and_then(|icon| {
                            tray.set_icon(Some(icon))
                                .map_err(|e| TrayError::Backend(e.to_string()))
                        }) {
                            Ok(()) => current = update.tier,
                            Err(e) => warn!(error = %e, "Failed to update tray icon"),
                        }
                    }
                    if let Err(e) = tray.set_tooltip(Some(update.tooltip.as_str())) {
                        warn!(error = %e, "Failed to update tray tooltip");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }
}
