//! Configured dimensions and the subgraph resolver.

use super::subgraph::{is_key_token, DimensionCoordinate, Subgraph};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One legal value of a dimension together with its fallback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionPreset {
    /// Value selected by this preset.
    pub value: String,
    /// Values consulted in order when content is missing; starts with `value`.
    pub fallback: Vec<String>,
}

impl DimensionPreset {
    pub fn new(
        value: impl Into<String>,
        fallback: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            value: value.into(),
            fallback: fallback.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named axis of content variation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    /// Primary value; the default subgraph selects it.
    pub default_value: String,
    /// Legal values in declaration order.
    pub presets: Vec<DimensionPreset>,
}

impl Dimension {
    fn preset(&self, value: &str) -> Option<&DimensionPreset> {
        self.presets.iter().find(|preset| preset.value == value)
    }
}

/// Errors for dimension definitions that cannot form a dimension space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionConfigError {
    EmptyName,
    DuplicateDimension(String),
    NoPresets(String),
    DuplicatePreset {
        dimension: String,
        value: String,
    },
    UnknownDefault {
        dimension: String,
        value: String,
    },
    UnknownFallback {
        dimension: String,
        preset: String,
        value: String,
    },
    /// Name contains `;` or `=`, which delimit subgraph keys.
    InvalidName(String),
    /// Preset value is empty or contains `;` or `=`.
    InvalidValue {
        dimension: String,
        value: String,
    },
}

impl Display for DimensionConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "dimension name must not be blank"),
            Self::DuplicateDimension(name) => write!(f, "dimension `{name}` is declared twice"),
            Self::NoPresets(name) => write!(f, "dimension `{name}` has no presets"),
            Self::DuplicatePreset { dimension, value } => {
                write!(f, "dimension `{dimension}` declares preset `{value}` twice")
            }
            Self::UnknownDefault { dimension, value } => write!(
                f,
                "dimension `{dimension}` default `{value}` is not one of its presets"
            ),
            Self::UnknownFallback {
                dimension,
                preset,
                value,
            } => write!(
                f,
                "dimension `{dimension}` preset `{preset}` falls back to unknown value `{value}`"
            ),
            Self::InvalidName(name) => {
                write!(f, "dimension name `{name}` must not contain `;` or `=`")
            }
            Self::InvalidValue { dimension, value } => write!(
                f,
                "dimension `{dimension}` value `{value}` must be non-empty without `;` or `=`"
            ),
        }
    }
}

impl Error for DimensionConfigError {}

/// Validated set of dimensions.
///
/// # Invariants
/// - Dimension names are unique and non-blank.
/// - Every default and every fallback entry names a declared preset.
/// - Every preset fallback list starts with the preset value itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionSpace {
    dimensions: Vec<Dimension>,
}

impl DimensionSpace {
    /// Validates dimension definitions.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, DimensionConfigError> {
        let mut names = BTreeSet::new();
        let mut normalized = Vec::with_capacity(dimensions.len());

        for mut dimension in dimensions {
            dimension.name = dimension.name.trim().to_string();
            if dimension.name.is_empty() {
                return Err(DimensionConfigError::EmptyName);
            }
            if !is_key_token(&dimension.name) {
                return Err(DimensionConfigError::InvalidName(dimension.name));
            }
            if !names.insert(dimension.name.clone()) {
                return Err(DimensionConfigError::DuplicateDimension(dimension.name));
            }
            if dimension.presets.is_empty() {
                return Err(DimensionConfigError::NoPresets(dimension.name));
            }

            let mut values = BTreeSet::new();
            for preset in &dimension.presets {
                if !is_key_token(&preset.value) {
                    return Err(DimensionConfigError::InvalidValue {
                        dimension: dimension.name.clone(),
                        value: preset.value.clone(),
                    });
                }
                if !values.insert(preset.value.as_str()) {
                    return Err(DimensionConfigError::DuplicatePreset {
                        dimension: dimension.name.clone(),
                        value: preset.value.clone(),
                    });
                }
            }
            if !values.contains(dimension.default_value.as_str()) {
                return Err(DimensionConfigError::UnknownDefault {
                    dimension: dimension.name.clone(),
                    value: dimension.default_value.clone(),
                });
            }
            for preset in &dimension.presets {
                if let Some(unknown) = preset
                    .fallback
                    .iter()
                    .find(|value| !values.contains(value.as_str()))
                {
                    return Err(DimensionConfigError::UnknownFallback {
                        dimension: dimension.name.clone(),
                        preset: preset.value.clone(),
                        value: unknown.clone(),
                    });
                }
            }

            for preset in &mut dimension.presets {
                if preset.fallback.first() != Some(&preset.value) {
                    preset.fallback.retain(|value| value != &preset.value);
                    preset.fallback.insert(0, preset.value.clone());
                }
            }
            normalized.push(dimension);
        }

        Ok(Self {
            dimensions: normalized,
        })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Subgraph with every dimension at its default value.
    pub fn default_subgraph(&self) -> Subgraph {
        Subgraph::new(
            self.dimensions
                .iter()
                .map(|dimension| (dimension.name.clone(), dimension.default_value.clone()))
                .collect(),
        )
    }

    pub fn is_default(&self, subgraph: &Subgraph) -> bool {
        *subgraph == self.default_subgraph()
    }

    /// Resolves partial dimension hints into one subgraph.
    ///
    /// Dimensions absent from `hints` take their default value. Returns `None`
    /// for an unknown dimension, an unknown value, or two conflicting hints for
    /// the same dimension.
    pub fn resolve_subgraph<'a>(
        &self,
        hints: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Option<Subgraph> {
        let mut coordinate = self.default_subgraph().coordinate().clone();
        let mut constrained = BTreeSet::new();

        for (name, value) in hints {
            let dimension = self.dimension(name)?;
            dimension.preset(value)?;
            if !constrained.insert(name) && coordinate.get(name).map(String::as_str) != Some(value)
            {
                return None;
            }
            coordinate.insert(dimension.name.clone(), value.to_string());
        }

        Some(Subgraph::new(coordinate))
    }

    /// Full dimension-name to value mapping of a subgraph from this space.
    ///
    /// Returns `None` when the subgraph does not belong to this space.
    pub fn coordinate_of(&self, subgraph: &Subgraph) -> Option<DimensionCoordinate> {
        if subgraph.coordinate().len() != self.dimensions.len() {
            return None;
        }
        for dimension in &self.dimensions {
            let value = subgraph.value(&dimension.name)?;
            dimension.preset(value)?;
        }
        Some(subgraph.coordinate().clone())
    }

    /// Per-dimension fallback values of a subgraph, most specific first.
    pub fn fallback_values(&self, subgraph: &Subgraph) -> Option<BTreeMap<String, Vec<String>>> {
        let mut values = BTreeMap::new();
        for dimension in &self.dimensions {
            let preset = dimension.preset(subgraph.value(&dimension.name)?)?;
            values.insert(dimension.name.clone(), preset.fallback.clone());
        }
        Some(values)
    }

    /// Subgraphs consulted when resolving content visible from `subgraph`,
    /// most specific first. The first dimension varies slowest.
    pub fn fallback_chain(&self, subgraph: &Subgraph) -> Vec<Subgraph> {
        let Some(values) = self.fallback_values(subgraph) else {
            return Vec::new();
        };

        let mut chain = vec![DimensionCoordinate::new()];
        for dimension in &self.dimensions {
            let fallback = &values[&dimension.name];
            chain = chain
                .into_iter()
                .flat_map(|prefix| {
                    fallback.iter().map(move |value| {
                        let mut next = prefix.clone();
                        next.insert(dimension.name.clone(), value.clone());
                        next
                    })
                })
                .collect();
        }
        chain.into_iter().map(Subgraph::new).collect()
    }

    fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions
            .iter()
            .find(|dimension| dimension.name == name)
    }
}
