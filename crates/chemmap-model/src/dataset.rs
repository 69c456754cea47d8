// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub const LABEL_MAX_LEN: usize = 256;

/// Replaces the characters that upset image and cache file naming.
#[must_use]
pub fn sanitize_base_name(name: &str) -> String {
    name.replace([' ', '.', ','], "_")
}

/// Sanitized file stem of a dataset source; names every per-dataset artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct DatasetBaseName(String);

impl DatasetBaseName {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = sanitize_base_name(input.trim());
        if s.is_empty() {
            return Err(ValidationError(
                "dataset base name must not be empty".to_string(),
            ));
        }
        if s.contains(['/', '\\']) {
            return Err(ValidationError(format!(
                "dataset base name must not contain path separators: {s}"
            )));
        }
        Ok(Self(s))
    }

    pub fn from_source(path: &Path) -> Result<Self, ValidationError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                ValidationError(format!(
                    "dataset source has no usable file name: {}",
                    path.display()
                ))
            })?;
        Self::parse(stem)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DatasetBaseName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("red", (255, 0, 0)),
    ("green", (0, 128, 0)),
    ("blue", (0, 0, 255)),
    ("yellow", (255, 255, 0)),
    ("orange", (255, 165, 0)),
    ("purple", (128, 0, 128)),
    ("pink", (255, 192, 203)),
    ("brown", (165, 42, 42)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
    ("cyan", (0, 255, 255)),
    ("magenta", (255, 0, 255)),
    ("navy", (0, 0, 128)),
    ("teal", (0, 128, 128)),
    ("olive", (128, 128, 0)),
    ("maroon", (128, 0, 0)),
    ("lime", (0, 255, 0)),
    ("gold", (255, 215, 0)),
    ("crimson", (220, 20, 60)),
    ("darkblue", (0, 0, 139)),
    ("darkgreen", (0, 100, 0)),
    ("darkred", (139, 0, 0)),
    ("darkorange", (255, 140, 0)),
    ("royalblue", (65, 105, 225)),
    ("steelblue", (70, 130, 180)),
    ("skyblue", (135, 206, 235)),
    ("forestgreen", (34, 139, 34)),
    ("seagreen", (46, 139, 87)),
    ("tomato", (255, 99, 71)),
    ("coral", (255, 127, 80)),
    ("salmon", (250, 128, 114)),
    ("violet", (238, 130, 238)),
    ("indigo", (75, 0, 130)),
    ("turquoise", (64, 224, 208)),
];

/// Marker color as given on the command line plus its resolved RGB value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayColor {
    raw: String,
    rgb: (u8, u8, u8),
}

impl DisplayColor {
    /// Accepts `#rrggbb`, `#rgb`, `rgb(r, g, b)` or a CSS color name.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let raw = input.trim();
        let rgb = parse_rgb(raw)
            .ok_or_else(|| ValidationError(format!("unsupported color: {input:?}")))?;
        Ok(Self {
            raw: raw.to_string(),
            rgb,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn rgb(&self) -> (u8, u8, u8) {
        self.rgb
    }
}

fn parse_rgb(raw: &str) -> Option<(u8, u8, u8)> {
    if let Some(hex) = raw.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        return match hex.len() {
            6 => Some((
                u8::from_str_radix(&hex[0..2], 16).ok()?,
                u8::from_str_radix(&hex[2..4], 16).ok()?,
                u8::from_str_radix(&hex[4..6], 16).ok()?,
            )),
            3 => {
                let digit = |i: usize| {
                    u8::from_str_radix(&hex[i..=i], 16)
                        .ok()
                        .map(|v| v * 17)
                };
                Some((digit(0)?, digit(1)?, digit(2)?))
            }
            _ => None,
        };
    }
    let lower = raw.to_ascii_lowercase();
    if let Some(inner) = lower
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return None;
        }
        return Some((
            parts[0].parse().ok()?,
            parts[1].parse().ok()?,
            parts[2].parse().ok()?,
        ));
    }
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, rgb)| *rgb)
}

impl Display for DisplayColor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// One input library: where to read it and how to show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub source: PathBuf,
    pub label: String,
    pub color: DisplayColor,
    pub base_name: DatasetBaseName,
}

impl DatasetSpec {
    pub fn new(source: PathBuf, label: &str, color: &str) -> Result<Self, ValidationError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ValidationError("dataset label must not be empty".to_string()));
        }
        if label.len() > LABEL_MAX_LEN {
            return Err(ValidationError(format!(
                "dataset label exceeds max length {LABEL_MAX_LEN}"
            )));
        }
        let base_name = DatasetBaseName::from_source(&source)?;
        Ok(Self {
            source,
            label: label.to_string(),
            color: DisplayColor::parse(color)?,
            base_name,
        })
    }
}

/// The ordered dataset list of one run. Labels and colors travel with their
/// dataset, so the three input lists cannot drift apart after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDatasets(Vec<DatasetSpec>);

impl RunDatasets {
    pub fn from_lists(
        sources: Vec<PathBuf>,
        labels: Vec<String>,
        colors: Vec<String>,
    ) -> Result<Self, ValidationError> {
        if sources.len() != labels.len() || sources.len() != colors.len() {
            return Err(ValidationError(format!(
                "Mismatch: {} datasets, {} legends, {} colors",
                sources.len(),
                labels.len(),
                colors.len()
            )));
        }
        let specs = sources
            .into_iter()
            .zip(labels)
            .zip(colors)
            .map(|((source, label), color)| DatasetSpec::new(source, &label, &color))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(specs)
    }

    pub fn new(specs: Vec<DatasetSpec>) -> Result<Self, ValidationError> {
        if specs.is_empty() {
            return Err(ValidationError("at least one dataset is required".to_string()));
        }
        let mut seen = BTreeSet::new();
        for spec in &specs {
            if !seen.insert(spec.base_name.clone()) {
                return Err(ValidationError(format!(
                    "duplicate dataset base name {} ({}); cached artifacts would collide",
                    spec.base_name,
                    spec.source.display()
                )));
            }
        }
        Ok(Self(specs))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[DatasetSpec] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DatasetSpec> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a RunDatasets {
    type Item = &'a DatasetSpec;
    type IntoIter = std::slice::Iter<'a, DatasetSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_replaces_spaces_dots_and_commas() {
        let name = DatasetBaseName::from_source(Path::new("/data/ChEMBL 33.v2,clean.csv"))
            .expect("base name");
        assert_eq!(name.as_str(), "ChEMBL_33_v2_clean");
    }

    #[test]
    fn color_parsing_accepts_hex_rgb_and_names() {
        assert_eq!(DisplayColor::parse("#ff8000").expect("hex").rgb(), (255, 128, 0));
        assert_eq!(DisplayColor::parse("#0f0").expect("short hex").rgb(), (0, 255, 0));
        assert_eq!(
            DisplayColor::parse("rgb(1, 2, 3)").expect("rgb").rgb(),
            (1, 2, 3)
        );
        assert_eq!(DisplayColor::parse("Blue").expect("name").rgb(), (0, 0, 255));
        assert!(DisplayColor::parse("not-a-color").is_err());
        assert!(DisplayColor::parse("#12345").is_err());
    }
}
