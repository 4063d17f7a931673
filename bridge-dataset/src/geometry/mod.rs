//! Component geometry derivation.
//!
//! Expands a [`BridgeConfig`] into one [`ComponentExtent`] per structural
//! element, in the bridge frame described in `constants::coordinate_system`.
//! The extents are the contract shared with the CAD collaborator (every mesh
//! vertex of a component lies inside its extent) and with the segmentation
//! engine (which attributes scan points by containment).

mod deck;
mod substructure;

use crate::bounds::Bounds;
use crate::error::{BridgeError, Result};
use crate::params::{BridgeConfig, PierLayout, PierSection, Topology};
use constants::class::ComponentKind;
use serde::{Deserialize, Serialize};
use substructure::{BridgeEnd, Part};

/// Cap beam on top of a multi-column or hammer-head pier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PierCap {
    /// Along the bridge axis.
    pub length: f64,
    /// Across the bridge axis.
    pub width: f64,
    pub depth: f64,
}

/// Shape metadata the CAD collaborator needs beyond the bounding volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentShape {
    BoxGirder {
        cell_count: u32,
        depth: f64,
        top_width: f64,
        bottom_width: f64,
        wall_thickness: f64,
        /// Longitudinal range of each span segment.
        segments: Vec<[f64; 2]>,
    },
    BeamSlab {
        beam_count: u32,
        beam_spacing: f64,
        beam_width: f64,
        beam_depth: f64,
        slab_thickness: f64,
        segments: Vec<[f64; 2]>,
    },
    Pier {
        layout: PierLayout,
        section: PierSection,
        section_size: f64,
        station: f64,
        column_offsets: Vec<f64>,
        column_height: f64,
        cap: Option<PierCap>,
    },
    /// Solid cuboid filling its extent.
    Solid,
}

/// Bounding volume and metadata of one structural element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentExtent {
    /// Position in derivation order; stable for a given configuration.
    pub id: usize,
    pub kind: ComponentKind,
    /// Unique name, also the stem of the component's mesh file.
    pub name: String,
    pub bounds: Bounds,
    pub shape: ComponentShape,
}

/// All component extents of one bridge, with a read-only reference to the
/// configuration they were derived from.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeComponents<'a> {
    pub config: &'a BridgeConfig,
    pub extents: Vec<ComponentExtent>,
}

impl BridgeComponents<'_> {
    pub fn count(&self, kind: ComponentKind) -> usize {
        self.extents.iter().filter(|e| e.kind == kind).count()
    }

    pub fn of_kind(&self, kind: ComponentKind) -> impl Iterator<Item = &ComponentExtent> {
        self.extents.iter().filter(move |e| e.kind == kind)
    }

    /// Union of all extents, including abutments beyond the deck ends.
    pub fn bounds(&self) -> Bounds {
        self.extents
            .iter()
            .fold(Bounds::new(), |acc, e| acc.merge(&e.bounds))
    }
}

/// Owned form of [`BridgeComponents`] as persisted in `components.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentManifest {
    pub config: BridgeConfig,
    pub extents: Vec<ComponentExtent>,
}

impl From<&BridgeComponents<'_>> for ComponentManifest {
    fn from(components: &BridgeComponents<'_>) -> Self {
        Self {
            config: components.config.clone(),
            extents: components.extents.clone(),
        }
    }
}

/// Component pairs allowed to share volume where they are structurally joined.
pub fn is_documented_joint(a: ComponentKind, b: ComponentKind) -> bool {
    use ComponentKind::*;
    matches!(
        (a, b),
        (Pier, Deck) | (Deck, Pier) | (ApproachSlab, WingWall) | (WingWall, ApproachSlab)
    )
}

/// Expand a configuration into its component extents.
pub fn derive(config: &BridgeConfig) -> BridgeComponents<'_> {
    let (deck_bounds, deck_shape) = match config.topology() {
        Topology::BoxGirder { cell_count } => deck::box_girder(config, cell_count),
        Topology::BeamSlab { beam_count } => deck::beam_slab(config, beam_count),
    };

    let mut parts = vec![Part {
        kind: ComponentKind::Deck,
        name: "deck".to_string(),
        bounds: deck_bounds,
        shape: deck_shape,
    }];
    parts.extend(substructure::piers(config));
    parts.extend(substructure::railings(config));
    parts.extend(substructure::abutment(config, BridgeEnd::Start));
    parts.extend(substructure::abutment(config, BridgeEnd::End));

    let extents = parts
        .into_iter()
        .enumerate()
        .map(|(id, part)| ComponentExtent {
            id,
            kind: part.kind,
            name: part.name,
            bounds: part.bounds,
            shape: part.shape,
        })
        .collect();

    BridgeComponents { config, extents }
}

/// Check completeness, extent validity and non-joint overlaps.
pub fn validate(components: &BridgeComponents<'_>, overlap_tolerance: f64) -> Result<()> {
    let expected = [
        (ComponentKind::Deck, 1),
        (
            ComponentKind::Pier,
            components.config.span_count().saturating_sub(1) as usize,
        ),
        (ComponentKind::Railing, 2),
        (ComponentKind::ApproachSlab, 2),
        (ComponentKind::BackWall, 2),
        (ComponentKind::WingWall, 4),
    ];
    for (kind, count) in expected {
        let found = components.count(kind);
        if found != count {
            return Err(BridgeError::DegenerateGeometry(format!(
                "expected {count} {kind} component(s), found {found}"
            )));
        }
    }

    if let Some(extent) = components.extents.iter().find(|e| !e.bounds.is_valid()) {
        return Err(BridgeError::DegenerateGeometry(format!(
            "{} has an empty or inverted extent {:?}",
            extent.name, extent.bounds
        )));
    }

    for (i, a) in components.extents.iter().enumerate() {
        for b in &components.extents[i + 1..] {
            if is_documented_joint(a.kind, b.kind) {
                continue;
            }
            let shared = a.bounds.intersection_volume(&b.bounds);
            if shared > overlap_tolerance {
                return Err(BridgeError::DegenerateGeometry(format!(
                    "{} and {} overlap by {shared:.4} m³",
                    a.name, b.name
                )));
            }
        }
    }

    Ok(())
}
