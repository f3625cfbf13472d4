//! Option schema: the full settings record, enums, and defaults.

/// Closed set of option names and their classifications.
pub mod names;
/// Sparse option patch and sanitize-on-read conversions.
pub mod patch;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::HistoryEntry;

/// Raw option bag as stored in an area: name to untrusted JSON value.
pub type RawEntries = HashMap<String, Value>;

/// Smallest accepted history cap.
pub const MIN_HISTORY_LENGTH: u32 = 1;
/// Largest accepted history cap.
pub const MAX_HISTORY_LENGTH: u32 = 5000;

/// Clamps a requested history cap into the accepted range.
pub fn clamp_history_length(len: u32) -> u32 {
    len.clamp(MIN_HISTORY_LENGTH, MAX_HISTORY_LENGTH)
}

/// Resolver selection for one feature surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverChoice {
    /// Use the user-configured custom resolver.
    Custom,
    /// Use the stock resolver.
    Default,
    /// Ask per invocation.
    Selectable,
}

/// History list ordering preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySort {
    /// Insertion order, newest last.
    Date,
    /// Alphabetical by title.
    Title,
    /// Saved entries first.
    Save,
    /// Alphabetical by DOI.
    Doi,
}

/// Where an omnibox resolution opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OmniboxTab {
    /// Reuse the active tab.
    CurrentTab,
    /// Open a focused new tab.
    NewForegroundTab,
    /// Open an unfocused new tab.
    NewBackgroundTab,
}

/// QR export image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrImageType {
    /// Raster output.
    Png,
    /// Vector output.
    Svg,
}

/// The full option record: one typed field per known option.
///
/// `Options::default()` is the defaults table, one concrete value for every
/// known name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Autolink DOIs found in page text.
    pub auto_link: bool,
    /// Rewrite existing DOI hyperlinks to the selected resolver.
    pub auto_link_rewrite: bool,
    /// Show the context menu item.
    pub context_menu: bool,
    /// Only offer the context menu when the selection looks like a DOI.
    pub context_menu_match: bool,
    /// Master switch for the custom resolver.
    pub custom_resolver: bool,
    /// Resolver selection used by autolink.
    pub cr_autolink: ResolverChoice,
    /// Resolver selection used by the popup bubble.
    pub cr_bubble: ResolverChoice,
    /// Resolver selection used by the context menu.
    pub cr_context: ResolverChoice,
    /// Resolver selection used by history links.
    pub cr_history: ResolverChoice,
    /// Resolver selection used by the omnibox.
    pub cr_omnibox: ResolverChoice,
    /// Custom resolver URL for full DOIs.
    pub doi_resolver: String,
    /// Custom resolver URL for ShortDOIs.
    pub shortdoi_resolver: String,
    /// Record resolved DOIs into the history log.
    pub history: bool,
    /// History cap, clamped into `1..=5000`.
    pub history_length: u32,
    /// Fetch missing titles for recorded DOIs.
    pub history_fetch_title: bool,
    /// Show the save column in the history view.
    pub history_showsave: bool,
    /// Show titles in the history view.
    pub history_showtitles: bool,
    /// History view ordering.
    pub history_sortby: HistorySort,
    /// DOIs awaiting asynchronous recording; survives process restarts.
    pub history_doi_queue: Vec<String>,
    /// Tab behavior for omnibox resolutions.
    pub omnibox_tab: OmniboxTab,
    /// QR background color.
    pub qr_bgcolor: String,
    /// QR foreground color.
    pub qr_fgcolor: String,
    /// Render the QR background transparent.
    pub qr_bgtrans: bool,
    /// QR quiet-zone width in modules.
    pub qr_border: u32,
    /// QR export format.
    pub qr_imgtype: QrImageType,
    /// QR edge length in pixels.
    pub qr_size: u32,
    /// Encode the fetched title alongside the DOI.
    pub qr_title: bool,
    /// The history collection itself.
    pub recorded_dois: Vec<HistoryEntry>,
    /// Mirror sync-eligible options into the sync area.
    pub sync_data: bool,
    /// Reentrancy flag: mutes the change reconciler while it writes.
    pub storage_listener_disabled: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auto_link: false,
            auto_link_rewrite: false,
            context_menu: true,
            context_menu_match: false,
            custom_resolver: false,
            cr_autolink: ResolverChoice::Default,
            cr_bubble: ResolverChoice::Default,
            cr_context: ResolverChoice::Default,
            cr_history: ResolverChoice::Default,
            cr_omnibox: ResolverChoice::Default,
            doi_resolver: "https://doi.org/".to_string(),
            shortdoi_resolver: "https://doi.org/".to_string(),
            history: false,
            history_length: 50,
            history_fetch_title: false,
            history_showsave: false,
            history_showtitles: false,
            history_sortby: HistorySort::Date,
            history_doi_queue: Vec::new(),
            omnibox_tab: OmniboxTab::CurrentTab,
            qr_bgcolor: "#ffffff".to_string(),
            qr_fgcolor: "#000000".to_string(),
            qr_bgtrans: false,
            qr_border: 0,
            qr_imgtype: QrImageType::Png,
            qr_size: 300,
            qr_title: false,
            recorded_dois: Vec::new(),
            sync_data: false,
            storage_listener_disabled: false,
        }
    }
}

impl Options {
    /// Serializes every field into a raw bag keyed by option name.
    pub fn to_raw(&self) -> RawEntries {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => RawEntries::new(),
        }
    }
}
