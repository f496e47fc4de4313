use std::sync::Arc;

use tokio::sync::watch;

/// Viewports narrower than this show the sidebar as an overlay.
pub const MOBILE_BREAKPOINT_PX: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidebarView {
    pub open: bool,
    pub mobile: bool,
}

/// Sidebar visibility shared by the components that show or toggle it.
///
/// Cloning hands out another handle to the same state; consumers receive a
/// handle explicitly instead of reaching for a global.
#[derive(Debug, Clone)]
pub struct SidebarState {
    tx: Arc<watch::Sender<SidebarView>>,
}

impl SidebarState {
    pub fn new(viewport_width: u32) -> Self {
        let (tx, _rx) = watch::channel(SidebarView {
            open: false,
            mobile: viewport_width < MOBILE_BREAKPOINT_PX,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn view(&self) -> SidebarView {
        *self.tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.view().open
    }

    pub fn subscribe(&self) -> watch::Receiver<SidebarView> {
        self.tx.subscribe()
    }

    pub fn toggle(&self) {
        self.tx.send_modify(|v| v.open = !v.open);
    }

    pub fn set_open(&self, open: bool) {
        self.tx.send_if_modified(|v| {
            let changed = v.open != open;
            v.open = open;
            changed
        });
    }

    /// Leaving the mobile layout closes the overlay.
    pub fn set_viewport_width(&self, width: u32) {
        let mobile = width < MOBILE_BREAKPOINT_PX;
        self.tx.send_if_modified(|v| {
            let before = *v;
            v.mobile = mobile;
            if !mobile {
                v.open = false;
            }
            *v != before
        });
    }

    /// Navigating to a chat closes the overlay on mobile.
    pub fn on_navigate(&self) {
        if self.view().mobile {
            self.set_open(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_is_shared_between_handles() {
        let header = SidebarState::new(400);
        let sidebar = header.clone();

        header.toggle();
        assert!(sidebar.is_open());
        sidebar.toggle();
        assert!(!header.is_open());
    }

    #[test]
    fn test_leaving_mobile_layout_closes() {
        let state = SidebarState::new(400);
        state.set_open(true);
        assert!(state.view().mobile);

        state.set_viewport_width(1024);
        assert_eq!(
            state.view(),
            SidebarView {
                open: false,
                mobile: false
            }
        );
    }

    #[test]
    fn test_navigation_closes_only_on_mobile() {
        let mobile = SidebarState::new(400);
        mobile.set_open(true);
        mobile.on_navigate();
        assert!(!mobile.is_open());

        let desktop = SidebarState::new(1280);
        desktop.set_open(true);
        desktop.on_navigate();
        assert!(desktop.is_open());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let state = SidebarState::new(400);
        let mut rx = state.subscribe();
        state.toggle();
        rx.changed().await.unwrap();
        assert!(rx.borrow().open);
    }
}
