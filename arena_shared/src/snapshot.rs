//! Inbound server snapshots.
//!
//! Each server message is one transport frame: a 4-byte prefix (ignored)
//! followed by a JSON document, one byte per character. Two dialects of the
//! document are in circulation:
//!
//! - **flat**: whole lists (`users`, `bullets`) plus `outter`, `time`, `end`.
//!   Bullets have no removal message; anything missing from the latest
//!   `bullets` list is gone.
//! - **delta**: explicit `Add` / `Move` / `ReMove` sections, a `Bullets`
//!   object with the same three sub-sections, an `Obstacles` object with
//!   `Add` / `Del`, plus `Time` and `End`.
//!
//! A message may carry sections of both; [`Snapshot::parts`] then holds the
//! flat part first.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::Error as _, Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::{
    error::ProtocolError,
    ids::{BulletId, ObstacleId, PlayerId},
    math::Vec2,
};

/// Length of the header in front of every inbound JSON document.
pub const INBOUND_PREFIX_LEN: usize = 4;

const FLAT_KEYS: [&str; 5] = ["users", "outter", "bullets", "time", "end"];
const DELTA_KEYS: [&str; 7] = ["Move", "Add", "ReMove", "Bullets", "Obstacles", "Time", "End"];

/// `{"X": .., "Y": ..}` where the wire `Y` is the world z axis.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
pub struct WirePoint {
    #[serde(rename = "X", default)]
    pub x: f32,
    #[serde(rename = "Y", default)]
    pub y: f32,
}

impl From<WirePoint> for Vec2 {
    fn from(p: WirePoint) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// A player as listed in `users`, `Move` or `Add`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerEntry {
    #[serde(rename = "Id")]
    pub id: PlayerId,
    #[serde(rename = "X", default)]
    pub x: f32,
    #[serde(rename = "Y", default)]
    pub y: f32,
    #[serde(rename = "Hp", default)]
    pub hp: Option<i32>,
    #[serde(rename = "Ag", default)]
    pub facing: Option<f32>,
}

impl PlayerEntry {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A bullet. Flat snapshots nest the position under `Pos`; delta ones may
/// put `X`/`Y` at the top level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulletEntry {
    #[serde(rename = "Id")]
    pub id: BulletId,
    #[serde(rename = "Pos", default)]
    pub nested: Option<WirePoint>,
    #[serde(rename = "X", default)]
    pub x: f32,
    #[serde(rename = "Y", default)]
    pub y: f32,
}

impl BulletEntry {
    pub fn position(&self) -> Vec2 {
        match self.nested {
            Some(p) => p.into(),
            None => Vec2::new(self.x, self.y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObstacleEntry {
    #[serde(rename = "Id")]
    pub id: ObstacleId,
    #[serde(rename = "X", default)]
    pub x: f32,
    #[serde(rename = "Y", default)]
    pub y: f32,
    #[serde(rename = "Size", default = "default_obstacle_size")]
    pub size: f32,
}

fn default_obstacle_size() -> f32 {
    1.0
}

impl ObstacleEntry {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Removal lists carry either bare ids or `{"Id": n}` objects.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum IdRef {
    Bare(u32),
    Tagged {
        #[serde(rename = "Id")]
        id: u32,
    },
}

impl IdRef {
    fn get(self) -> u32 {
        match self {
            IdRef::Bare(id) | IdRef::Tagged { id } => id,
        }
    }
}

fn ids<T>(refs: Vec<IdRef>, wrap: fn(u32) -> T) -> Vec<T> {
    refs.into_iter().map(|r| wrap(r.get())).collect()
}

/// Distinguishes "field absent" (`None`) from "field present", including an
/// explicit `null`.
fn present<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(d).map(Some)
}

#[derive(Debug, Default, Deserialize)]
struct BulletDeltaWire {
    #[serde(rename = "Add", default)]
    add: Option<Vec<BulletEntry>>,
    #[serde(rename = "Move", default)]
    moved: Option<Vec<BulletEntry>>,
    #[serde(rename = "ReMove", default)]
    remove: Option<Vec<IdRef>>,
}

#[derive(Debug, Default, Deserialize)]
struct ObstacleDeltaWire {
    #[serde(rename = "Add", default)]
    add: Option<Vec<ObstacleEntry>>,
    #[serde(rename = "Del", default)]
    del: Option<Vec<IdRef>>,
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotWire {
    // flat
    #[serde(default)]
    users: Option<Vec<PlayerEntry>>,
    #[serde(default)]
    outter: Option<Vec<IdRef>>,
    #[serde(default, deserialize_with = "present")]
    bullets: Option<Option<Vec<BulletEntry>>>,
    #[serde(default)]
    time: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    end: Option<Value>,

    // delta
    #[serde(rename = "Move", default)]
    moved: Option<Vec<PlayerEntry>>,
    #[serde(rename = "Add", default)]
    added: Option<Vec<PlayerEntry>>,
    #[serde(rename = "ReMove", default)]
    removed: Option<Vec<IdRef>>,
    #[serde(rename = "Bullets", default)]
    bullets_delta: Option<BulletDeltaWire>,
    #[serde(rename = "Obstacles", default)]
    obstacles: Option<ObstacleDeltaWire>,
    #[serde(rename = "Time", default)]
    time_delta: Option<f64>,
    #[serde(rename = "End", default, deserialize_with = "present")]
    end_delta: Option<Value>,
}

/// The flat dialect's sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatSnapshot {
    pub users: Option<Vec<PlayerEntry>>,
    pub outter: Option<Vec<PlayerId>>,
    /// `Some(vec![])` for both an empty list and an explicit `null`.
    pub bullets: Option<Vec<BulletEntry>>,
    pub time: Option<u32>,
    pub end: bool,
}

/// Bullet sub-sections of the delta dialect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulletDelta {
    pub add: Vec<BulletEntry>,
    pub moved: Vec<BulletEntry>,
    pub remove: Vec<BulletId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObstacleDelta {
    pub add: Vec<ObstacleEntry>,
    pub del: Vec<ObstacleId>,
}

/// The delta dialect's sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaSnapshot {
    pub added: Vec<PlayerEntry>,
    pub moved: Vec<PlayerEntry>,
    pub removed: Vec<PlayerId>,
    pub bullets: Option<BulletDelta>,
    pub obstacles: Option<ObstacleDelta>,
    pub time: Option<u32>,
    pub end: bool,
}

impl DeltaSnapshot {
    /// Every player position in the message, `Add` before `Move`.
    pub fn players(&self) -> impl Iterator<Item = &PlayerEntry> {
        self.added.iter().chain(self.moved.iter())
    }
}

/// One dialect's view of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotPart {
    Flat(FlatSnapshot),
    Delta(DeltaSnapshot),
}

/// A decoded server message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Flat part (if any) first, then delta part (if any).
    pub parts: Vec<SnapshotPart>,
    /// Top-level fields neither dialect knows. Kept for logging only.
    pub ignored: Vec<String>,
}

fn seconds(v: f64) -> u32 {
    if v.is_finite() && v > 0.0 {
        v.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

impl Snapshot {
    /// Decodes a raw transport frame: strips the prefix, maps bytes to
    /// characters, parses the JSON.
    pub fn parse(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < INBOUND_PREFIX_LEN {
            return Err(ProtocolError::ShortFrame {
                len: frame.len(),
                need: INBOUND_PREFIX_LEN,
            });
        }
        let text: String = frame[INBOUND_PREFIX_LEN..]
            .iter()
            .map(|&b| char::from(b))
            .collect();
        Self::from_json_str(&text)
    }

    /// Parses the JSON document of a message (no prefix).
    pub fn from_json_str(s: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(s)?;
        let Value::Object(map) = value else {
            return Err(serde_json::Error::custom("snapshot must be a JSON object").into());
        };
        Self::from_map(map)
    }

    fn from_map(map: Map<String, Value>) -> Result<Self, ProtocolError> {
        let has_flat = FLAT_KEYS.iter().any(|k| map.contains_key(*k));
        let has_delta = DELTA_KEYS.iter().any(|k| map.contains_key(*k));
        let ignored = map
            .keys()
            .filter(|k| !FLAT_KEYS.contains(&k.as_str()) && !DELTA_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();

        let wire: SnapshotWire = serde_json::from_value(Value::Object(map))?;
        let mut parts = Vec::with_capacity(2);

        if has_flat {
            parts.push(SnapshotPart::Flat(FlatSnapshot {
                users: wire.users,
                outter: wire.outter.map(|r| ids(r, PlayerId)),
                bullets: wire.bullets.map(Option::unwrap_or_default),
                time: wire.time.map(seconds),
                end: wire.end.is_some(),
            }));
        }

        if has_delta {
            parts.push(SnapshotPart::Delta(DeltaSnapshot {
                added: wire.added.unwrap_or_default(),
                moved: wire.moved.unwrap_or_default(),
                removed: ids(wire.removed.unwrap_or_default(), PlayerId),
                bullets: wire.bullets_delta.map(|b| BulletDelta {
                    add: b.add.unwrap_or_default(),
                    moved: b.moved.unwrap_or_default(),
                    remove: ids(b.remove.unwrap_or_default(), BulletId),
                }),
                obstacles: wire.obstacles.map(|o| ObstacleDelta {
                    add: o.add.unwrap_or_default(),
                    del: ids(o.del.unwrap_or_default(), ObstacleId),
                }),
                time: wire.time_delta.map(seconds),
                end: wire.end_delta.is_some(),
            }));
        }

        Ok(Self { parts, ignored })
    }

    /// True when neither dialect recognized anything in the message.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// Frames a JSON document the way the server does: a little-endian length
/// prefix followed by the document bytes.
pub fn encode_server_frame(json: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(INBOUND_PREFIX_LEN + json.len());
    buf.put_u32_le(json.len() as u32);
    buf.put_slice(json.as_bytes());
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_flat(s: &Snapshot) -> &FlatSnapshot {
        match s.parts.as_slice() {
            [SnapshotPart::Flat(f)] => f,
            other => panic!("expected a single flat part, got {other:?}"),
        }
    }

    fn only_delta(s: &Snapshot) -> &DeltaSnapshot {
        match s.parts.as_slice() {
            [SnapshotPart::Delta(d)] => d,
            other => panic!("expected a single delta part, got {other:?}"),
        }
    }

    #[test]
    fn parses_flat_users() {
        let s = Snapshot::from_json_str(
            r#"{"users":[{"Id":1,"X":10,"Y":20,"Hp":100},{"Id":2,"X":5,"Y":5,"Hp":80,"Ag":90}]}"#,
        )
        .unwrap();
        let flat = only_flat(&s);
        let users = flat.users.as_ref().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, PlayerId(1));
        assert_eq!(users[0].position(), Vec2::new(10.0, 20.0));
        assert_eq!(users[0].facing, None);
        assert_eq!(users[1].hp, Some(80));
        assert_eq!(users[1].facing, Some(90.0));
        assert!(flat.bullets.is_none());
        assert!(!flat.end);
    }

    #[test]
    fn null_bullets_means_empty_list() {
        let s = Snapshot::from_json_str(r#"{"bullets":null}"#).unwrap();
        assert_eq!(only_flat(&s).bullets, Some(Vec::new()));

        let s = Snapshot::from_json_str(r#"{"bullets":[{"Id":3,"Pos":{"X":1.5,"Y":-2}}]}"#).unwrap();
        let bullets = only_flat(&s).bullets.clone().unwrap();
        assert_eq!(bullets[0].id, BulletId(3));
        assert_eq!(bullets[0].position(), Vec2::new(1.5, -2.0));
    }

    #[test]
    fn end_is_presence_based() {
        let s = Snapshot::from_json_str(r#"{"end":null,"time":12}"#).unwrap();
        let flat = only_flat(&s);
        assert!(flat.end);
        assert_eq!(flat.time, Some(12));
    }

    #[test]
    fn parses_delta_sections() {
        let s = Snapshot::from_json_str(
            r#"{
                "Add":[{"Id":4,"X":1,"Y":2,"Hp":50}],
                "Move":[{"Id":5,"X":3,"Y":4}],
                "ReMove":[6,{"Id":7}],
                "Bullets":{"Add":[{"Id":1,"X":9,"Y":9}],"ReMove":[2]},
                "Obstacles":{"Add":[{"Id":1,"X":0,"Y":0,"Size":3}],"Del":[8]},
                "Time":30
            }"#,
        )
        .unwrap();
        let d = only_delta(&s);
        assert_eq!(d.added[0].id, PlayerId(4));
        assert_eq!(d.moved[0].hp, None);
        assert_eq!(d.removed, vec![PlayerId(6), PlayerId(7)]);
        let bullets = d.bullets.as_ref().unwrap();
        assert_eq!(bullets.add[0].position(), Vec2::new(9.0, 9.0));
        assert!(bullets.moved.is_empty());
        assert_eq!(bullets.remove, vec![BulletId(2)]);
        let obstacles = d.obstacles.as_ref().unwrap();
        assert_eq!(obstacles.add[0].size, 3.0);
        assert_eq!(obstacles.del, vec![ObstacleId(8)]);
        assert_eq!(d.time, Some(30));
        assert!(!d.end);
        assert_eq!(d.players().count(), 2);
    }

    #[test]
    fn mixed_message_orders_flat_first() {
        let s = Snapshot::from_json_str(
            r#"{"Bullets":{"ReMove":[5]},"bullets":[{"Id":5,"Pos":{"X":0,"Y":0}}],"chat":"hi"}"#,
        )
        .unwrap();
        assert_eq!(s.parts.len(), 2);
        assert!(matches!(s.parts[0], SnapshotPart::Flat(_)));
        assert!(matches!(s.parts[1], SnapshotPart::Delta(_)));
        assert_eq!(s.ignored, vec!["chat".to_string()]);
    }

    #[test]
    fn unknown_only_is_empty() {
        let s = Snapshot::from_json_str(r#"{"ping":1}"#).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn parse_strips_prefix() {
        let frame = encode_server_frame(r#"{"time":7}"#);
        let s = Snapshot::parse(&frame).unwrap();
        assert_eq!(only_flat(&s).time, Some(7));
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            Snapshot::parse(&[1, 2]),
            Err(ProtocolError::ShortFrame { .. })
        ));
        assert!(matches!(
            Snapshot::parse(b"\0\0\0\0{not json"),
            Err(ProtocolError::MalformedSnapshot(_))
        ));
        assert!(matches!(
            Snapshot::from_json_str("[1,2]"),
            Err(ProtocolError::MalformedSnapshot(_))
        ));
        assert!(matches!(
            Snapshot::from_json_str(r#"{"users":[{"X":1}]}"#),
            Err(ProtocolError::MalformedSnapshot(_))
        ));
    }
}
