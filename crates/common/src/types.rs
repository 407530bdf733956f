use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable key of a world entity, assigned by the upstream transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable view of an entity as last received: where it is and how far
/// its visibility reaches.
///
/// A newer snapshot for the same id replaces this one wholesale; snapshots
/// are never patched in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    #[serde(with = "xyz")]
    pub position: Vec3,
    pub range: f32,
}

impl EntitySnapshot {
    pub fn new(id: u64, position: Vec3, range: f32) -> Self {
        Self {
            id: EntityId(id),
            position,
            range,
        }
    }

    /// Finite position and a finite, non-negative range.
    pub fn is_well_formed(&self) -> bool {
        self.position.is_finite() && self.range.is_finite() && self.range >= 0.0
    }

    /// 3-D Euclidean distance from `point` to this entity.
    pub fn distance_to(&self, point: Vec3) -> f32 {
        self.position.distance(point)
    }

    /// Whether `point` lies inside the visibility sphere. The boundary counts
    /// as inside.
    pub fn reaches(&self, point: Vec3) -> bool {
        self.distance_to(point) <= self.range
    }
}

/// Serde adapter that writes a [`Vec3`] as `{ "x": .., "y": .., "z": .. }`
/// instead of glam's default array form.
pub mod xyz {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Xyz {
        x: f32,
        y: f32,
        z: f32,
    }

    impl From<Vec3> for Xyz {
        fn from(v: Vec3) -> Self {
            Self {
                x: v.x,
                y: v.y,
                z: v.z,
            }
        }
    }

    impl From<Xyz> for Vec3 {
        fn from(p: Xyz) -> Self {
            Vec3::new(p.x, p.y, p.z)
        }
    }

    pub fn serialize<S: Serializer>(value: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
        Xyz::from(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
        Xyz::deserialize(deserializer).map(Vec3::from)
    }

    /// Same encoding for optional vectors.
    pub mod option {
        use super::Xyz;
        use glam::Vec3;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Vec3>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.map(Xyz::from).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec3>, D::Error> {
            Ok(Option::<Xyz>::deserialize(deserializer)?.map(Vec3::from))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_position_as_object() {
        let snap = EntitySnapshot::new(1, Vec3::new(1.0, 2.0, 3.0), 50.0);
        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["position"]["x"], 1.0);
        assert_eq!(json["position"]["z"], 3.0);
        assert_eq!(json["range"], 50.0);
    }

    #[test]
    fn snapshot_parses_from_wire_form() {
        let snap: EntitySnapshot = serde_json::from_str(
            r#"{"id":7,"position":{"x":-20,"y":0.5,"z":0},"range":12}"#,
        )
        .unwrap();
        assert_eq!(snap.id, EntityId(7));
        assert_eq!(snap.position, Vec3::new(-20.0, 0.5, 0.0));
        assert_eq!(snap.range, 12.0);
    }

    #[test]
    fn missing_range_is_rejected() {
        let parsed = serde_json::from_str::<EntitySnapshot>(
            r#"{"id":7,"position":{"x":1,"y":2,"z":3}}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn boundary_distance_reaches() {
        let snap = EntitySnapshot::new(1, Vec3::ZERO, 5.0);
        assert!(snap.reaches(Vec3::new(3.0, 0.0, 4.0)));
        assert!(!snap.reaches(Vec3::new(3.0, 0.0, 4.1)));
    }

    #[test]
    fn malformed_snapshots_are_detected() {
        assert!(EntitySnapshot::new(1, Vec3::ZERO, 0.0).is_well_formed());
        assert!(!EntitySnapshot::new(1, Vec3::ZERO, -1.0).is_well_formed());
        assert!(!EntitySnapshot::new(1, Vec3::ZERO, f32::NAN).is_well_formed());
        assert!(!EntitySnapshot::new(1, Vec3::new(f32::INFINITY, 0.0, 0.0), 1.0).is_well_formed());
    }

    #[test]
    fn entity_id_display() {
        assert_eq!(EntityId(42).to_string(), "#42");
    }
}
