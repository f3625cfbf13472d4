//! Sparse option patch: the unit of every read, write, and change event.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::options::names::OptionName;
use crate::options::{
    HistorySort, OmniboxTab, Options, QrImageType, RawEntries, ResolverChoice,
    clamp_history_length,
};
use crate::types::HistoryEntry;

/// A subset of option values; unset fields mean "not mentioned".
///
/// Patches are produced by [`OptionsPatch::from_raw`], which is the single
/// sanitize point: unknown names, mistyped values, and out-of-range numbers
/// are dropped there and nowhere else. A field that survives `from_raw` is
/// well typed by construction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OptionsPatch {
    /// Optional replacement for the autolink toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_link: Option<bool>,
    /// Optional replacement for the hyperlink-rewrite toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_link_rewrite: Option<bool>,
    /// Optional replacement for the context menu toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_menu: Option<bool>,
    /// Optional replacement for the selection-match gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_menu_match: Option<bool>,
    /// Optional replacement for the custom resolver switch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_resolver: Option<bool>,
    /// Optional replacement for the autolink resolver selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr_autolink: Option<ResolverChoice>,
    /// Optional replacement for the bubble resolver selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr_bubble: Option<ResolverChoice>,
    /// Optional replacement for the context menu resolver selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr_context: Option<ResolverChoice>,
    /// Optional replacement for the history resolver selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr_history: Option<ResolverChoice>,
    /// Optional replacement for the omnibox resolver selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cr_omnibox: Option<ResolverChoice>,
    /// Optional replacement for the DOI resolver URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi_resolver: Option<String>,
    /// Optional replacement for the ShortDOI resolver URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortdoi_resolver: Option<String>,
    /// Optional replacement for the history toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<bool>,
    /// Optional replacement for the history cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,
    /// Optional replacement for the title-fetch toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_fetch_title: Option<bool>,
    /// Optional replacement for the save-column toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_showsave: Option<bool>,
    /// Optional replacement for the title-display toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_showtitles: Option<bool>,
    /// Optional replacement for the history ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_sortby: Option<HistorySort>,
    /// Optional replacement for the pending DOI queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_doi_queue: Option<Vec<String>>,
    /// Optional replacement for the omnibox tab behavior.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omnibox_tab: Option<OmniboxTab>,
    /// Optional replacement for the QR background color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_bgcolor: Option<String>,
    /// Optional replacement for the QR foreground color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_fgcolor: Option<String>,
    /// Optional replacement for the QR transparency toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_bgtrans: Option<bool>,
    /// Optional replacement for the QR quiet-zone width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_border: Option<u32>,
    /// Optional replacement for the QR export format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_imgtype: Option<QrImageType>,
    /// Optional replacement for the QR edge length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_size: Option<u32>,
    /// Optional replacement for the QR title-encoding toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_title: Option<bool>,
    /// Optional replacement for the history collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_dois: Option<Vec<HistoryEntry>>,
    /// Optional replacement for the sync toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_data: Option<bool>,
    /// Optional replacement for the reentrancy flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_listener_disabled: Option<bool>,
}

fn field<T: DeserializeOwned>(map: &RawEntries, name: OptionName) -> Option<T> {
    map.get(name.as_str())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn string_list(map: &RawEntries, name: OptionName) -> Option<Vec<String>> {
    let raw: Vec<Value> = field(map, name)?;
    Some(
        raw.into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
    )
}

fn entry_list(map: &RawEntries) -> Option<Vec<HistoryEntry>> {
    let raw: Vec<Value> = field(map, OptionName::RecordedDois)?;
    Some(
        raw.into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
    )
}

impl OptionsPatch {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Sanitizes a raw bag into a typed patch.
    ///
    /// Unknown names are ignored. A value that fails its field's type is
    /// dropped, except lists, which are filtered element by element, and
    /// `history_length`, which is clamped into range rather than rejected.
    pub fn from_raw(map: &RawEntries) -> Self {
        Self {
            auto_link: field(map, OptionName::AutoLink),
            auto_link_rewrite: field(map, OptionName::AutoLinkRewrite),
            context_menu: field(map, OptionName::ContextMenu),
            context_menu_match: field(map, OptionName::ContextMenuMatch),
            custom_resolver: field(map, OptionName::CustomResolver),
            cr_autolink: field(map, OptionName::CrAutolink),
            cr_bubble: field(map, OptionName::CrBubble),
            cr_context: field(map, OptionName::CrContext),
            cr_history: field(map, OptionName::CrHistory),
            cr_omnibox: field(map, OptionName::CrOmnibox),
            doi_resolver: field(map, OptionName::DoiResolver),
            shortdoi_resolver: field(map, OptionName::ShortdoiResolver),
            history: field(map, OptionName::History),
            history_length: field::<u32>(map, OptionName::HistoryLength)
                .map(clamp_history_length),
            history_fetch_title: field(map, OptionName::HistoryFetchTitle),
            history_showsave: field(map, OptionName::HistoryShowsave),
            history_showtitles: field(map, OptionName::HistoryShowtitles),
            history_sortby: field(map, OptionName::HistorySortby),
            history_doi_queue: string_list(map, OptionName::HistoryDoiQueue),
            omnibox_tab: field(map, OptionName::OmniboxTab),
            qr_bgcolor: field(map, OptionName::QrBgcolor),
            qr_fgcolor: field(map, OptionName::QrFgcolor),
            qr_bgtrans: field(map, OptionName::QrBgtrans),
            qr_border: field(map, OptionName::QrBorder),
            qr_imgtype: field(map, OptionName::QrImgtype),
            qr_size: field(map, OptionName::QrSize),
            qr_title: field(map, OptionName::QrTitle),
            recorded_dois: entry_list(map),
            sync_data: field(map, OptionName::SyncData),
            storage_listener_disabled: field(map, OptionName::StorageListenerDisabled),
        }
    }

    /// Captures a full record as a patch with every field set.
    pub fn from_options(opts: &Options) -> Self {
        Self::from_raw(&opts.to_raw())
    }

    /// Serializes set fields into a raw bag; unset fields are absent.
    pub fn to_raw(&self) -> RawEntries {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => RawEntries::new(),
        }
    }

    /// Names mentioned by this patch, in schema order.
    pub fn names(&self) -> Vec<OptionName> {
        let raw = self.to_raw();
        OptionName::ALL
            .iter()
            .copied()
            .filter(|n| raw.contains_key(n.as_str()))
            .collect()
    }

    /// Restricts the patch to sync-eligible names.
    pub fn sync_subset(&self) -> Self {
        let mut raw = self.to_raw();
        raw.retain(|k, _| matches!(OptionName::from_key(k), Some(n) if n.is_sync_eligible()));
        Self::from_raw(&raw)
    }

    /// Whether any mentioned name is in the force-refresh class.
    pub fn forces_refresh(&self) -> bool {
        self.names().iter().any(|n| n.is_force_refresh())
    }

    /// Writes every set field onto `opts`, leaving the rest untouched.
    pub fn apply_to(&self, opts: &mut Options) {
        if let Some(v) = self.auto_link {
            opts.auto_link = v;
        }
        if let Some(v) = self.auto_link_rewrite {
            opts.auto_link_rewrite = v;
        }
        if let Some(v) = self.context_menu {
            opts.context_menu = v;
        }
        if let Some(v) = self.context_menu_match {
            opts.context_menu_match = v;
        }
        if let Some(v) = self.custom_resolver {
            opts.custom_resolver = v;
        }
        if let Some(v) = self.cr_autolink {
            opts.cr_autolink = v;
        }
        if let Some(v) = self.cr_bubble {
            opts.cr_bubble = v;
        }
        if let Some(v) = self.cr_context {
            opts.cr_context = v;
        }
        if let Some(v) = self.cr_history {
            opts.cr_history = v;
        }
        if let Some(v) = self.cr_omnibox {
            opts.cr_omnibox = v;
        }
        if let Some(v) = &self.doi_resolver {
            opts.doi_resolver = v.clone();
        }
        if let Some(v) = &self.shortdoi_resolver {
            opts.shortdoi_resolver = v.clone();
        }
        if let Some(v) = self.history {
            opts.history = v;
        }
        if let Some(v) = self.history_length {
            opts.history_length = v;
        }
        if let Some(v) = self.history_fetch_title {
            opts.history_fetch_title = v;
        }
        if let Some(v) = self.history_showsave {
            opts.history_showsave = v;
        }
        if let Some(v) = self.history_showtitles {
            opts.history_showtitles = v;
        }
        if let Some(v) = self.history_sortby {
            opts.history_sortby = v;
        }
        if let Some(v) = &self.history_doi_queue {
            opts.history_doi_queue = v.clone();
        }
        if let Some(v) = self.omnibox_tab {
            opts.omnibox_tab = v;
        }
        if let Some(v) = &self.qr_bgcolor {
            opts.qr_bgcolor = v.clone();
        }
        if let Some(v) = &self.qr_fgcolor {
            opts.qr_fgcolor = v.clone();
        }
        if let Some(v) = self.qr_bgtrans {
            opts.qr_bgtrans = v;
        }
        if let Some(v) = self.qr_border {
            opts.qr_border = v;
        }
        if let Some(v) = self.qr_imgtype {
            opts.qr_imgtype = v;
        }
        if let Some(v) = self.qr_size {
            opts.qr_size = v;
        }
        if let Some(v) = self.qr_title {
            opts.qr_title = v;
        }
        if let Some(v) = &self.recorded_dois {
            opts.recorded_dois = v.clone();
        }
        if let Some(v) = self.sync_data {
            opts.sync_data = v;
        }
        if let Some(v) = self.storage_listener_disabled {
            opts.storage_listener_disabled = v;
        }
    }
}
