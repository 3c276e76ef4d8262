//! Decoding of api.php response bodies.
//!
//! api.php is PHP's `json_encode` of RackTables' internal arrays, which means
//! ids arrive as numbers or numeric strings, and an empty associative array
//! is encoded as `[]` instead of `{}`. The helpers here absorb both.

use crate::types::{IpAllocation, ObjectId, RemoteObject, Tag, TagId};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

/// Top-level `{"response": ...}` envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

/// A PHP array: either keyed (`{}`) or a list (`[]`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PhpArray<T> {
    Keyed(BTreeMap<String, T>),
    List(Vec<T>),
}

impl<T> PhpArray<T> {
    fn into_entries(self) -> Vec<(Option<String>, T)> {
        match self {
            Self::Keyed(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
            Self::List(list) => list.into_iter().map(|v| (None, v)).collect(),
        }
    }
}

fn entries<T>(array: Option<PhpArray<T>>) -> Vec<(Option<String>, T)> {
    array.map(PhpArray::into_entries).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn value(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let raw = RawId::deserialize(deserializer)?;
    raw.value()
        .ok_or_else(|| de::Error::custom(format!("invalid id: {raw:?}")))
}

/// `null`, `""` and missing all mean "no id".
fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<RawId>::deserialize(deserializer)?;
    Ok(raw.and_then(|r| r.value()))
}

fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
    let raw = Option::<PhpArray<RawId>>::deserialize(deserializer)?;
    Ok(entries(raw)
        .into_iter()
        .filter_map(|(_, r)| r.value())
        .collect())
}

#[derive(Debug, Deserialize)]
struct TagRef {
    #[serde(deserialize_with = "id")]
    id: u64,
    #[serde(default)]
    tag: String,
}

#[derive(Debug, Deserialize)]
struct AddrInfo {
    #[serde(default)]
    ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpRecord {
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    addrinfo: Option<AddrInfo>,
    #[serde(default)]
    osif: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectRecord {
    #[serde(deserialize_with = "id")]
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    container_name: Option<String>,
    #[serde(default, deserialize_with = "optional_id")]
    container_id: Option<u64>,
    #[serde(default)]
    itags: Option<PhpArray<TagRef>>,
    #[serde(default)]
    etags: Option<PhpArray<TagRef>>,
    #[serde(default)]
    ipv4: Option<PhpArray<IpRecord>>,
}

#[derive(Debug, Deserialize)]
struct TagRecord {
    #[serde(deserialize_with = "id")]
    id: u64,
    tag: String,
    #[serde(default, deserialize_with = "optional_id")]
    parent_id: Option<u64>,
    #[serde(default, deserialize_with = "id_list")]
    trace: Vec<u64>,
}

fn tag_map(array: Option<PhpArray<TagRef>>) -> BTreeMap<TagId, String> {
    entries(array)
        .into_iter()
        .map(|(_, t)| (TagId(t.id), t.tag))
        .collect()
}

/// Parse an address from the record, falling back to the entry key.
///
/// RackTables keys `ipv4` by the packed address, which api.php may emit as
/// either dotted form or as an unsigned integer.
fn allocation(key: Option<&str>, record: IpRecord) -> Option<IpAllocation> {
    let from_record = record
        .ip
        .as_deref()
        .or(record.addrinfo.as_ref().and_then(|a| a.ip.as_deref()))
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    let from_key = || {
        let key = key?.trim();
        key.parse::<IpAddr>()
            .ok()
            .or_else(|| key.parse::<u32>().ok().map(|n| IpAddr::V4(Ipv4Addr::from(n))))
    };

    let ip = from_record.or_else(from_key)?;
    Some(IpAllocation {
        ip,
        interface: record.osif.filter(|s| !s.is_empty()),
    })
}

impl From<ObjectRecord> for RemoteObject {
    fn from(r: ObjectRecord) -> Self {
        let mut ips: Vec<IpAllocation> = entries(r.ipv4)
            .into_iter()
            .filter_map(|(key, record)| {
                let parsed = allocation(key.as_deref(), record);
                if parsed.is_none() {
                    log::debug!("skipping unreadable address on object {}", r.id);
                }
                parsed
            })
            .collect();
        ips.sort_by(|a, b| a.ip.cmp(&b.ip));

        Self {
            id: ObjectId(r.id),
            name: r.name.unwrap_or_default(),
            container_name: r.container_name.unwrap_or_default(),
            container_id: r.container_id.map(ObjectId),
            implicit_tags: tag_map(r.itags),
            explicit_tags: tag_map(r.etags),
            ips,
        }
    }
}

impl From<TagRecord> for Tag {
    fn from(r: TagRecord) -> Self {
        Self {
            id: TagId(r.id),
            name: r.tag,
            parent_id: r.parent_id.map(TagId),
            trace: r.trace.into_iter().map(TagId).collect(),
        }
    }
}

fn envelope<T: DeserializeOwned>(method: &'static str, body: &str) -> crate::Result<T> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(|e| e.response)
        .map_err(|e| crate::Error::parse(method, e.to_string()))
}

/// Decode a `get_depot` body into objects keyed by id.
pub(crate) fn objects(body: &str) -> crate::Result<BTreeMap<ObjectId, RemoteObject>> {
    let records: Option<PhpArray<ObjectRecord>> = envelope("get_depot", body)?;
    Ok(entries(records)
        .into_iter()
        .map(|(_, r)| {
            let object = RemoteObject::from(r);
            (object.id, object)
        })
        .collect())
}

/// Decode a `get_tags` body.
pub(crate) fn tags(body: &str) -> crate::Result<Vec<Tag>> {
    let records: Option<PhpArray<TagRecord>> = envelope("get_tags", body)?;
    Ok(entries(records).into_iter().map(|(_, r)| r.into()).collect())
}

/// Pull the new object id out of an `add_object` body, if it is there.
pub(crate) fn created_id(body: &str) -> Option<ObjectId> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let id = value.get("response")?.get("id")?;
    match id {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .map(ObjectId)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPOT: &str = r#"{
        "response": {
            "7": {
                "id": "7",
                "name": "vm1",
                "container_name": "A",
                "container_id": "100",
                "container_objtype_id": "1505",
                "itags": [],
                "etags": {"2": {"id": "2", "tag": "proj1"}},
                "ipv4": {
                    "167772161": {"osif": "veth0", "addrinfo": {"ip": "10.0.0.1"}}
                }
            },
            "8": {
                "id": 8,
                "name": "vm2",
                "container_name": null,
                "container_id": null,
                "itags": {"9": {"id": 9, "tag": "virtual"}},
                "etags": [],
                "ipv4": []
            }
        }
    }"#;

    #[test]
    fn test_objects_decode() {
        let objects = objects(DEPOT).unwrap();
        assert_eq!(objects.len(), 2);

        let vm1 = &objects[&ObjectId(7)];
        assert_eq!(vm1.name, "vm1");
        assert_eq!(vm1.container_name, "A");
        assert_eq!(vm1.container_id, Some(ObjectId(100)));
        assert!(vm1.implicit_tags.is_empty());
        assert_eq!(vm1.explicit_tags.get(&TagId(2)).map(String::as_str), Some("proj1"));
        assert_eq!(vm1.ips.len(), 1);
        assert_eq!(vm1.ips[0].ip, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(vm1.ips[0].interface.as_deref(), Some("veth0"));

        let vm2 = &objects[&ObjectId(8)];
        assert_eq!(vm2.container_name, "");
        assert_eq!(vm2.container_id, None);
        assert_eq!(vm2.implicit_tags.len(), 1);
        assert!(vm2.explicit_tags.is_empty());
        assert!(vm2.ips.is_empty());
    }

    #[test]
    fn test_objects_empty_response_list() {
        assert!(objects(r#"{"response": []}"#).unwrap().is_empty());
        assert!(objects(r#"{"response": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_objects_missing_envelope() {
        let err = objects(r#"{"error": "denied"}"#).unwrap_err();
        assert!(matches!(err, crate::Error::Parse { method: "get_depot", .. }));

        let err = objects("<html>login</html>").unwrap_err();
        assert!(matches!(err, crate::Error::Parse { .. }));
    }

    #[test]
    fn test_ip_from_integer_key() {
        let body = r#"{"response": {"1": {"id": 1, "name": "vm", "ipv4": {"167772162": {}}}}}"#;
        let objects = objects(body).unwrap();
        assert_eq!(
            objects[&ObjectId(1)].ips[0].ip,
            "10.0.0.2".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_tags_decode() {
        let body = r#"{"response": {
            "1": {"id": "1", "tag": "projects", "parent_id": null, "trace": []},
            "2": {"id": "2", "tag": "proj1", "parent_id": "1", "trace": ["1"]}
        }}"#;
        let tags = tags(body).unwrap();
        assert_eq!(tags.len(), 2);
        let proj1 = tags.iter().find(|t| t.name == "proj1").unwrap();
        assert_eq!(proj1.parent_id, Some(TagId(1)));
        assert_eq!(proj1.trace, vec![TagId(1)]);
    }

    #[test]
    fn test_created_id() {
        assert_eq!(created_id(r#"{"response": {"id": "42"}}"#), Some(ObjectId(42)));
        assert_eq!(created_id(r#"{"response": {"id": 43}}"#), Some(ObjectId(43)));
        assert_eq!(created_id(r#"{"response": []}"#), None);
        assert_eq!(created_id("not json"), None);
    }
}
