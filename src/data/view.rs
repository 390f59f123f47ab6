//! Views: one visualizable quantity built from one or three brain data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::braindata::{BrainData, DataKind};
use crate::error::CortexError;

/// Priority given to views that don't set one. Lower sorts first.
pub const DEFAULT_PRIORITY: i64 = 1000;

/// The closed set of view variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Volume,
    Vertex,
    RgbVolume,
    RgbVertex,
}

impl ViewKind {
    /// Type tag written to the package.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Volume => "volume",
            ViewKind::Vertex => "vertex",
            ViewKind::RgbVolume => "rgb_volume",
            ViewKind::RgbVertex => "rgb_vertex",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "volume" => Some(ViewKind::Volume),
            "vertex" => Some(ViewKind::Vertex),
            "rgb_volume" => Some(ViewKind::RgbVolume),
            "rgb_vertex" => Some(ViewKind::RgbVertex),
            _ => None,
        }
    }

    /// Number of brain data channels this kind holds.
    pub fn channels(&self) -> usize {
        if self.is_rgb() {
            3
        } else {
            1
        }
    }

    pub fn is_rgb(&self) -> bool {
        matches!(self, ViewKind::RgbVolume | ViewKind::RgbVertex)
    }

    fn is_volume(&self) -> bool {
        matches!(self, ViewKind::Volume | ViewKind::RgbVolume)
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display settings carried with a view.
///
/// Keys this crate doesn't know about are kept in `extra` so they survive a
/// load/save cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayAttrs {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Colormap name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmap: Option<String>,

    /// Lower color limit. JSON has no NaN or infinity, so a non-finite
    /// limit is written as `null` and reads back as `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmin: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmax: Option<f64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A named, ordered bundle of brain data shown together.
///
/// All channels share one subject and, for volumes, one transform.
#[derive(Clone, Debug)]
pub struct View {
    kind: ViewKind,
    channels: Vec<BrainData>,
    priority: i64,
    display: DisplayAttrs,
}

impl View {
    /// Wraps a single brain data as a scalar view.
    pub fn new(data: BrainData) -> Self {
        let kind = if data.is_volume() {
            ViewKind::Volume
        } else {
            ViewKind::Vertex
        };
        Self {
            kind,
            channels: vec![data],
            priority: DEFAULT_PRIORITY,
            display: DisplayAttrs::default(),
        }
    }

    /// Builds an RGB composite from three channels.
    ///
    /// # Errors
    /// Returns [`CortexError::MixedView`] if the channels disagree on subject,
    /// data kind or transform.
    pub fn rgb(red: BrainData, green: BrainData, blue: BrainData) -> Result<Self, CortexError> {
        let kind = if red.is_volume() {
            ViewKind::RgbVolume
        } else {
            ViewKind::RgbVertex
        };
        Self::from_channels(kind, vec![red, green, blue])
    }

    /// Builds a view of the given kind, checking channel count and consistency.
    pub fn from_channels(kind: ViewKind, channels: Vec<BrainData>) -> Result<Self, CortexError> {
        if channels.len() != kind.channels() {
            return Err(CortexError::MixedView(format!(
                "{} view needs {} channel(s), got {}",
                kind,
                kind.channels(),
                channels.len()
            )));
        }

        let first = &channels[0];
        for other in &channels[1..] {
            if other.subject() != first.subject() {
                return Err(CortexError::MixedView(format!(
                    "subjects '{}' and '{}' in one view",
                    first.subject(),
                    other.subject()
                )));
            }
            if other.kind() != first.kind() {
                return Err(CortexError::MixedView(format!(
                    "{} and {} in one view",
                    describe_kind(first.kind()),
                    describe_kind(other.kind())
                )));
            }
        }
        if kind.is_volume() != first.is_volume() {
            return Err(CortexError::MixedView(format!(
                "{} view cannot hold {}",
                kind,
                describe_kind(first.kind())
            )));
        }

        Ok(Self {
            kind,
            channels,
            priority: DEFAULT_PRIORITY,
            display: DisplayAttrs::default(),
        })
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.display.description = description.into();
        self
    }

    pub fn with_cmap(mut self, cmap: impl Into<String>) -> Self {
        self.display.cmap = Some(cmap.into());
        self
    }

    /// Sets the color limits. Non-finite limits are left unset.
    pub fn with_range(mut self, vmin: f64, vmax: f64) -> Self {
        self.display.vmin = Some(vmin).filter(|v| v.is_finite());
        self.display.vmax = Some(vmax).filter(|v| v.is_finite());
        self
    }

    pub fn with_display(mut self, display: DisplayAttrs) -> Self {
        self.display = display;
        self
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn priority(&self) -> i64 {
        self.priority
    }

    pub fn display(&self) -> &DisplayAttrs {
        &self.display
    }

    /// Channels in order (red, green, blue for RGB views).
    pub fn channels(&self) -> &[BrainData] {
        &self.channels
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BrainData> {
        self.channels.iter()
    }

    pub fn subject(&self) -> &str {
        self.channels[0].subject()
    }

    pub fn xfmname(&self) -> Option<&str> {
        self.channels[0].xfmname()
    }
}

impl<'a> IntoIterator for &'a View {
    type Item = &'a BrainData;
    type IntoIter = std::slice::Iter<'a, BrainData>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.iter()
    }
}

fn describe_kind(kind: &DataKind) -> String {
    match kind {
        DataKind::Volume { xfmname } => format!("volume data (xfm '{}')", xfmname),
        DataKind::Vertex => "vertex data".to_string(),
    }
}
