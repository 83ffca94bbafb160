//! Tracking pixels.
//!
//! A pixel URL is fired once per page view from a small inline script. Every
//! emission gets a fresh cache-buster value so intermediaries never collapse
//! two impressions into one request.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use rand::Rng;
use serde::Deserialize;
use sponsorship_api_types::ViewerParams;
use time::OffsetDateTime;
use tracing::{debug, warn};
use url::form_urlencoded::byte_serialize;

use crate::presentation::views::{PixelScriptTemplate, render_fragment, script_json};

pub const DFP_PIXEL_BASE: &str = "http://pubads.g.doubleclick.net/gampad/ad";
pub const DEFAULT_CACHE_BUSTER_PARAM: &str = "c";

/// DFP settings for one content kind (a content type or taxonomy name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PixelUnit {
    pub unit: String,
    pub size: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PixelConfig {
    pub network: String,
    pub units: BTreeMap<String, PixelUnit>,
    /// Query parameter that carries the cache-buster.
    pub param: String,
    /// Fire for viewers who are logged in to the host.
    pub fire_for_logged_in: bool,
    /// Replacement URL for every pixel, for development environments.
    pub override_url: Option<String>,
}

impl Default for PixelConfig {
    fn default() -> Self {
        Self {
            network: String::new(),
            units: BTreeMap::new(),
            param: DEFAULT_CACHE_BUSTER_PARAM.to_string(),
            fire_for_logged_in: false,
            override_url: None,
        }
    }
}

/// Who is looking at the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewer {
    pub admin: bool,
    pub preview: bool,
    pub logged_in: bool,
}

impl From<ViewerParams> for Viewer {
    fn from(params: ViewerParams) -> Self {
        Self {
            admin: params.admin,
            preview: params.preview,
            logged_in: params.logged_in,
        }
    }
}

/// Source of cache-buster values: wall-clock milliseconds followed by three
/// random digits, never repeating within the process.
#[derive(Debug, Default)]
pub struct CacheBuster {
    last: AtomicU64,
}

impl CacheBuster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_value(&self) -> u64 {
        let millis = u64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000)
            .unwrap_or_default();
        let candidate = millis
            .saturating_mul(1000)
            .saturating_add(rand::rng().random_range(0..1000));
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(candidate.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        candidate.max(previous.saturating_add(1))
    }

    /// `url` with `param` set to a fresh value: replaced where present,
    /// appended otherwise. The rest of the URL is left byte-for-byte intact.
    pub fn bust(&self, url: &str, param: &str) -> String {
        set_query_param(url, param, &self.next_value().to_string())
    }
}

fn set_query_param(url: &str, param: &str, value: &str) -> String {
    let (without_fragment, fragment) = match url.find('#') {
        Some(index) => url.split_at(index),
        None => (url, ""),
    };
    let (path, query) = match without_fragment.find('?') {
        Some(index) => (&without_fragment[..index], Some(&without_fragment[index + 1..])),
        None => (without_fragment, None),
    };

    let mut pairs: Vec<String> = Vec::new();
    let mut replaced = false;
    for pair in query.into_iter().flat_map(|query| query.split('&')) {
        if pair.is_empty() {
            continue;
        }
        let name = pair.split_once('=').map_or(pair, |(name, _)| name);
        if name == param {
            if !replaced {
                pairs.push(format!("{param}={value}"));
                replaced = true;
            }
        } else {
            pairs.push(pair.to_string());
        }
    }
    if !replaced {
        pairs.push(format!("{param}={value}"));
    }

    format!("{path}?{}{fragment}", pairs.join("&"))
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

pub struct TrackingPixel {
    config: PixelConfig,
    buster: CacheBuster,
}

impl TrackingPixel {
    pub fn new(config: PixelConfig) -> Self {
        Self {
            config,
            buster: CacheBuster::new(),
        }
    }

    pub fn config(&self) -> &PixelConfig {
        &self.config
    }

    pub fn cache_buster(&self) -> &CacheBuster {
        &self.buster
    }

    /// The DFP pixel URL for an item or term of `kind`. Any missing setting
    /// yields `None`.
    pub fn dfp_url(&self, kind: &str, id: i64) -> Option<String> {
        let unit = self.config.units.get(kind)?;
        let value = id.to_string();
        if self.config.network.is_empty()
            || unit.unit.is_empty()
            || unit.size.is_empty()
            || unit.key.is_empty()
            || id == 0
        {
            return None;
        }
        // The key-value pair is encoded twice: once per side, once as a whole.
        let key_value = encode(&format!("{}={}", encode(&unit.key), encode(&value)));
        Some(format!(
            "{DFP_PIXEL_BASE}?iu=/{}/{}&c=123&sz={}&t={}",
            self.config.network, unit.unit, unit.size, key_value
        ))
    }

    pub fn should_fire(&self, viewer: Viewer) -> bool {
        if viewer.admin || viewer.preview {
            return false;
        }
        !viewer.logged_in || self.config.fire_for_logged_in
    }

    /// Final URL to fire for `pixel_url`, or `None` when nothing should fire.
    pub fn resolve(&self, pixel_url: Option<&str>, viewer: Viewer) -> Option<String> {
        let url = self
            .config
            .override_url
            .as_deref()
            .or(pixel_url)
            .map(str::trim)
            .filter(|url| !url.is_empty())?;
        if !self.should_fire(viewer) {
            debug!(
                target = "sponsorship::pixel",
                admin = viewer.admin,
                preview = viewer.preview,
                logged_in = viewer.logged_in,
                "Suppressed tracking pixel"
            );
            return None;
        }
        Some(self.buster.bust(url, &self.config.param))
    }

    /// Inline script that fires the pixel, or `None` when nothing should fire.
    pub fn render(&self, pixel_url: Option<&str>, viewer: Viewer) -> Option<String> {
        let url = self.resolve(pixel_url, viewer)?;
        let template = PixelScriptTemplate {
            url_json: script_json(&url),
        };
        match render_fragment(&template) {
            Ok(markup) => {
                counter!("sponsorship_pixel_render_total").increment(1);
                Some(markup)
            }
            Err(err) => {
                warn!(
                    target = "sponsorship::pixel",
                    error = %err,
                    "Failed to render tracking pixel"
                );
                None
            }
        }
    }

    /// `content` followed by the pixel script, when one should fire.
    pub fn append_to_content(&self, content: &str, pixel_url: Option<&str>, viewer: Viewer) -> String {
        match self.render(pixel_url, viewer) {
            Some(script) => format!("{content}\n{script}"),
            None => content.to_string(),
        }
    }
}
