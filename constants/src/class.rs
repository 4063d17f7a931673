/// Structural component classes shared by the generator, the scene files and the labeled output
use serde::{Deserialize, Serialize};

/// Label written for points that fall inside no component extent.
/// Such points are dropped from labeled output, the code only appears in reports.
pub const UNASSIGNED_CLASS: u8 = 0;

/// Structural element kind attached to every component extent and labeled point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Deck,
    Pier,
    Railing,
    ApproachSlab,
    BackWall,
    WingWall,
}

impl ComponentKind {
    /// All kinds in label-code order.
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Deck,
        ComponentKind::Pier,
        ComponentKind::Railing,
        ComponentKind::ApproachSlab,
        ComponentKind::BackWall,
        ComponentKind::WingWall,
    ];

    /// Label code used in XYZ and LAS classification output
    pub fn class_id(self) -> u8 {
        match self {
            ComponentKind::Deck => 1,
            ComponentKind::Pier => 2,
            ComponentKind::Railing => 3,
            ComponentKind::ApproachSlab => 4,
            ComponentKind::BackWall => 5,
            ComponentKind::WingWall => 6,
        }
    }

    pub fn from_class_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.class_id() == id)
    }

    /// Snake-case name, also used for per-component file names
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Deck => "deck",
            ComponentKind::Pier => "pier",
            ComponentKind::Railing => "railing",
            ComponentKind::ApproachSlab => "approach_slab",
            ComponentKind::BackWall => "back_wall",
            ComponentKind::WingWall => "wing_wall",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Label code and display name written to segmentation reports.
pub struct ClassInfo {
    pub id: u8,
    pub name: &'static str,
}

pub const CLASS_MAP: &[ClassInfo] = &[
    ClassInfo {
        id: UNASSIGNED_CLASS,
        name: "unassigned",
    },
    ClassInfo {
        id: 1,
        name: "deck",
    },
    ClassInfo {
        id: 2,
        name: "pier",
    },
    ClassInfo {
        id: 3,
        name: "railing",
    },
    ClassInfo {
        id: 4,
        name: "approach slab",
    },
    ClassInfo {
        id: 5,
        name: "back wall",
    },
    ClassInfo {
        id: 6,
        name: "wing wall",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_round_trip_and_are_named() {
        for kind in ComponentKind::ALL {
            assert_eq!(ComponentKind::from_class_id(kind.class_id()), Some(kind));
            let info = CLASS_MAP.iter().find(|c| c.id == kind.class_id()).unwrap();
            assert_eq!(info.name.replace(' ', "_"), kind.name());
        }
        assert_eq!(ComponentKind::from_class_id(UNASSIGNED_CLASS), None);
    }
}
