//! The closed set of known option names and their sync/refresh classes.

use serde::{Deserialize, Serialize};

/// One known option name.
///
/// The wire form (and storage key) of each name is [`OptionName::as_str`].
/// Unknown keys in stored data never parse into this enum and are dropped
/// during sanitize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionName {
    AutoLink,
    AutoLinkRewrite,
    ContextMenu,
    ContextMenuMatch,
    CustomResolver,
    CrAutolink,
    CrBubble,
    CrContext,
    CrHistory,
    CrOmnibox,
    DoiResolver,
    ShortdoiResolver,
    History,
    HistoryLength,
    HistoryFetchTitle,
    HistoryShowsave,
    HistoryShowtitles,
    HistorySortby,
    HistoryDoiQueue,
    OmniboxTab,
    QrBgcolor,
    QrFgcolor,
    QrBgtrans,
    QrBorder,
    QrImgtype,
    QrSize,
    QrTitle,
    RecordedDois,
    SyncData,
    StorageListenerDisabled,
}

/// Option names that once shipped and are purged from storage on startup.
pub const DEPRECATED_NAMES: &[&str] = &[
    "cr_always",
    "cr_bubble_last",
    "qr_message",
    "qr_message_text",
    "sync_reset",
];

impl OptionName {
    /// Every known name, in schema order.
    pub const ALL: [OptionName; 30] = [
        OptionName::AutoLink,
        OptionName::AutoLinkRewrite,
        OptionName::ContextMenu,
        OptionName::ContextMenuMatch,
        OptionName::CustomResolver,
        OptionName::CrAutolink,
        OptionName::CrBubble,
        OptionName::CrContext,
        OptionName::CrHistory,
        OptionName::CrOmnibox,
        OptionName::DoiResolver,
        OptionName::ShortdoiResolver,
        OptionName::History,
        OptionName::HistoryLength,
        OptionName::HistoryFetchTitle,
        OptionName::HistoryShowsave,
        OptionName::HistoryShowtitles,
        OptionName::HistorySortby,
        OptionName::HistoryDoiQueue,
        OptionName::OmniboxTab,
        OptionName::QrBgcolor,
        OptionName::QrFgcolor,
        OptionName::QrBgtrans,
        OptionName::QrBorder,
        OptionName::QrImgtype,
        OptionName::QrSize,
        OptionName::QrTitle,
        OptionName::RecordedDois,
        OptionName::SyncData,
        OptionName::StorageListenerDisabled,
    ];

    /// Storage key and wire form of this name.
    pub fn as_str(self) -> &'static str {
        match self {
            OptionName::AutoLink => "auto_link",
            OptionName::AutoLinkRewrite => "auto_link_rewrite",
            OptionName::ContextMenu => "context_menu",
            OptionName::ContextMenuMatch => "context_menu_match",
            OptionName::CustomResolver => "custom_resolver",
            OptionName::CrAutolink => "cr_autolink",
            OptionName::CrBubble => "cr_bubble",
            OptionName::CrContext => "cr_context",
            OptionName::CrHistory => "cr_history",
            OptionName::CrOmnibox => "cr_omnibox",
            OptionName::DoiResolver => "doi_resolver",
            OptionName::ShortdoiResolver => "shortdoi_resolver",
            OptionName::History => "history",
            OptionName::HistoryLength => "history_length",
            OptionName::HistoryFetchTitle => "history_fetch_title",
            OptionName::HistoryShowsave => "history_showsave",
            OptionName::HistoryShowtitles => "history_showtitles",
            OptionName::HistorySortby => "history_sortby",
            OptionName::HistoryDoiQueue => "history_doi_queue",
            OptionName::OmniboxTab => "omnibox_tab",
            OptionName::QrBgcolor => "qr_bgcolor",
            OptionName::QrFgcolor => "qr_fgcolor",
            OptionName::QrBgtrans => "qr_bgtrans",
            OptionName::QrBorder => "qr_border",
            OptionName::QrImgtype => "qr_imgtype",
            OptionName::QrSize => "qr_size",
            OptionName::QrTitle => "qr_title",
            OptionName::RecordedDois => "recorded_dois",
            OptionName::SyncData => "sync_data",
            OptionName::StorageListenerDisabled => "storage_listener_disabled",
        }
    }

    /// Parses a storage key into a known name; `None` for unknown keys.
    pub fn from_key(key: &str) -> Option<OptionName> {
        OptionName::ALL.iter().copied().find(|n| n.as_str() == key)
    }

    /// Whether this option is mirrored into the sync area when sync is on.
    ///
    /// Device-local state (history collection and queue, the sync switch
    /// itself, and the reconciler mute flag) never leaves the local area.
    /// `auto_link` stays local because its permission grant is per device.
    pub fn is_sync_eligible(self) -> bool {
        !matches!(
            self,
            OptionName::AutoLink
                | OptionName::HistoryDoiQueue
                | OptionName::RecordedDois
                | OptionName::SyncData
                | OptionName::StorageListenerDisabled
        )
    }

    /// Whether a change to this option must rebuild resolver-dependent
    /// surfaces even when only its value (not feature availability) moved.
    pub fn is_force_refresh(self) -> bool {
        matches!(
            self,
            OptionName::CustomResolver
                | OptionName::CrAutolink
                | OptionName::CrBubble
                | OptionName::CrContext
                | OptionName::CrHistory
                | OptionName::CrOmnibox
                | OptionName::DoiResolver
                | OptionName::ShortdoiResolver
        )
    }

    /// All names mirrored into the sync area.
    pub fn sync_eligible() -> Vec<OptionName> {
        OptionName::ALL
            .iter()
            .copied()
            .filter(|n| n.is_sync_eligible())
            .collect()
    }
}
