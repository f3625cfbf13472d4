//! Dependent-feature toggles and the collaborator seams they call.
//!
//! The reconciler never talks to the platform directly. When an option
//! that drives a surface changes, it asks the session to recompute the
//! toggle state here and push differences to the [`FeatureHost`].

use async_trait::async_trait;

use crate::options::Options;

/// Outcome of a capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// The platform has not decided yet, typically before the first
    /// request prompt.
    Undetermined,
}

/// A set of host origins a capability covers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionSet {
    pub origins: Vec<String>,
}

/// Origins autolink needs before it may rewrite page content.
pub fn autolink_permissions() -> PermissionSet {
    PermissionSet {
        origins: vec!["http://*/*".to_string(), "https://*/*".to_string()],
    }
}

/// Probe, request, and surrender of host capabilities.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn probe(&self, set: &PermissionSet) -> PermissionState;
    async fn request(&self, set: &PermissionSet) -> bool;
    async fn remove(&self, set: &PermissionSet) -> bool;
}

/// A gate that grants everything, for embedding without a platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantAll;

#[async_trait]
impl PermissionGate for GrantAll {
    async fn probe(&self, _set: &PermissionSet) -> PermissionState {
        PermissionState::Granted
    }

    async fn request(&self, _set: &PermissionSet) -> bool {
        true
    }

    async fn remove(&self, _set: &PermissionSet) -> bool {
        true
    }
}

/// Surface callbacks invoked when a toggle flips. Implementations apply
/// the state to the platform; the defaults do nothing.
pub trait FeatureHost: Send {
    fn context_menu_visible(&self, _visible: bool) {}
    fn autolink_enabled(&self, _enabled: bool) {}
}

/// A host with no surfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHost;

impl FeatureHost for NoopHost {}

/// Current on/off state of the option-driven surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureToggles {
    pub context_menu: bool,
    pub autolink: bool,
}

/// Recomputes toggle state from options plus a permission probe.
///
/// Autolink needs both its option and a granted host capability; the
/// context menu is option-driven only.
pub async fn toggles(opts: &Options, gate: &dyn PermissionGate) -> FeatureToggles {
    let autolink = opts.auto_link
        && gate.probe(&autolink_permissions()).await == PermissionState::Granted;
    FeatureToggles {
        context_menu: opts.context_menu,
        autolink,
    }
}

/// Pushes toggles that differ from `old` to the host.
pub fn push_changes(host: &dyn FeatureHost, old: FeatureToggles, new: FeatureToggles) {
    if old.context_menu != new.context_menu {
        host.context_menu_visible(new.context_menu);
    }
    if old.autolink != new.autolink {
        host.autolink_enabled(new.autolink);
    }
}
