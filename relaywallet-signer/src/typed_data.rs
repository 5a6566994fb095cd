//! Typed, domain-separated hashing of structured messages.
//!
//! A [`TypedData`] is reduced to a single 32-byte digest:
//!
//! ```text
//! keccak256(0x19 0x01 || domainSeparator || messageHash)
//! domainSeparator = keccak256(keccak256(sig("EIP712Domain")) || encode_domain(domain))
//! messageHash     = keccak256(keccak256(sig(primaryType))    || encode_message_values(..))
//! ```
//!
//! Every function here is pure; the same input always yields the same bytes.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::hash::keccak256_concat;
use crate::EncodingError;

pub const DOMAIN_TYPE: &str = "EIP712Domain";

/// Leading bytes of the final hash input, reserved for typed data.
pub const TYPED_DATA_PREFIX: [u8; 2] = [0x19, 0x01];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl TypeField {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Declared types by name. Field order inside each type is significant;
/// the order of the map itself is not.
pub type TypeSet = HashMap<String, Vec<TypeField>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Number, decimal string or `0x` hex string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    pub types: TypeSet,
    pub primary_type: String,
    #[serde(default)]
    pub domain: TypedDataDomain,
    pub message: Map<String, Value>,
}

impl TypedData {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Canonical signature of `type_name`: `Name(type1 name1,...)` followed by
/// the signatures of every custom type it references, sorted by name.
///
/// Each reachable type appears at most once: a type already emitted
/// earlier in the same call, or still being encoded further up, emits
/// nothing. Self-referencing and mutually-referencing types terminate.
/// A type missing from `types` encodes as `Name()`.
pub fn encode_type_signature(type_name: &str, types: &TypeSet) -> String {
    let mut out = String::new();
    encode_type_scoped(
        type_name,
        types,
        &mut BTreeSet::new(),
        &mut BTreeSet::new(),
        &mut out,
    );
    out
}

fn encode_type_scoped<'a>(
    type_name: &'a str,
    types: &'a TypeSet,
    in_progress: &mut BTreeSet<&'a str>,
    emitted: &mut BTreeSet<&'a str>,
    out: &mut String,
) {
    if in_progress.contains(type_name) || !emitted.insert(type_name) {
        return;
    }
    in_progress.insert(type_name);

    out.push_str(&own_signature(type_name, types));
    for dep in find_dependencies(type_name, types) {
        encode_type_scoped(dep, types, in_progress, emitted, out);
    }

    in_progress.remove(type_name);
}

fn own_signature(type_name: &str, types: &TypeSet) -> String {
    let fields = types
        .get(type_name)
        .map(|fields| {
            fields
                .iter()
                .map(|f| format!("{} {}", f.type_name, f.name))
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default();
    format!("{type_name}({fields})")
}

/// Every custom type reachable from `type_name` (breadth first), excluding
/// `type_name` itself, in lexicographic order.
fn find_dependencies<'a>(type_name: &'a str, types: &'a TypeSet) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([type_name]);

    while let Some(current) = queue.pop_front() {
        for field in types.get(current).into_iter().flatten() {
            if let Some((dep, _)) = types.get_key_value(field.type_name.as_str()) {
                if seen.insert(dep.as_str()) {
                    queue.push_back(dep.as_str());
                }
            }
        }
    }

    seen.remove(type_name);
    seen.into_iter().collect()
}

/// Raw bytes of the domain fields that are present, in the fixed order
/// name, version, chain id, verifying contract, salt.
pub fn encode_domain(domain: &TypedDataDomain) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    if let Some(name) = &domain.name {
        out.extend_from_slice(name.as_bytes());
    }
    if let Some(version) = &domain.version {
        out.extend_from_slice(version.as_bytes());
    }
    if let Some(chain_id) = &domain.chain_id {
        let n = parse_uint(chain_id).ok_or_else(|| EncodingError::mismatch("chainId", "uint256"))?;
        out.extend_from_slice(&minimal_be_bytes(n));
    }
    if let Some(contract) = &domain.verifying_contract {
        let addr = parse_address(contract)
            .ok_or_else(|| EncodingError::mismatch("verifyingContract", "address"))?;
        out.extend_from_slice(addr.as_slice());
    }
    if let Some(salt) = &domain.salt {
        let salt = salt.strip_prefix("0x").unwrap_or(salt);
        let bytes = hex::decode(salt).map_err(|_| EncodingError::mismatch("salt", "bytes"))?;
        out.extend_from_slice(&bytes);
    }
    Ok(out)
}

/// Encode `values` following `fields` in declared order. Keys of `values`
/// that are not declared are ignored.
pub fn encode_message_values(
    values: &Map<String, Value>,
    fields: &[TypeField],
    types: &TypeSet,
) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    for field in fields {
        let value = values
            .get(&field.name)
            .ok_or_else(|| EncodingError::MissingField(field.name.clone()))?;
        out.extend(encode_value(&field.name, value, &field.type_name, types)?);
    }
    Ok(out)
}

fn encode_value(
    field: &str,
    value: &Value,
    type_name: &str,
    types: &TypeSet,
) -> Result<Vec<u8>, EncodingError> {
    match type_name {
        "string" => value
            .as_str()
            .map(|s| s.as_bytes().to_vec())
            .ok_or_else(|| EncodingError::mismatch(field, type_name)),
        "address" => value
            .as_str()
            .and_then(parse_address)
            .map(|a| a.to_vec())
            .ok_or_else(|| EncodingError::mismatch(field, type_name)),
        t if uint_bits(t).is_some() => {
            let bits = uint_bits(t).unwrap_or(256);
            parse_uint(value)
                .filter(|n| n.bit_len() <= bits)
                .map(minimal_be_bytes)
                .ok_or_else(|| EncodingError::mismatch(field, type_name))
        }
        t if types.contains_key(t) => {
            let nested = value
                .as_object()
                .ok_or_else(|| EncodingError::mismatch(field, type_name))?;
            Ok(hash_struct(t, nested, types)?.to_vec())
        }
        other => Err(EncodingError::UnsupportedType(other.to_string())),
    }
}

fn hash_struct(
    type_name: &str,
    values: &Map<String, Value>,
    types: &TypeSet,
) -> Result<[u8; 32], EncodingError> {
    let fields = types
        .get(type_name)
        .ok_or_else(|| EncodingError::UnsupportedType(type_name.to_string()))?;
    let type_hash = keccak256_concat(&[encode_type_signature(type_name, types).as_bytes()]);
    let encoded = encode_message_values(values, fields, types)?;
    Ok(keccak256_concat(&[type_hash.as_slice(), encoded.as_slice()]))
}

/// The digest a wallet signs for `data`.
pub fn hash_typed_data(data: &TypedData) -> Result<[u8; 32], EncodingError> {
    let domain_type_hash =
        keccak256_concat(&[encode_type_signature(DOMAIN_TYPE, &data.types).as_bytes()]);
    let domain_fields = encode_domain(&data.domain)?;
    let domain_separator =
        keccak256_concat(&[domain_type_hash.as_slice(), domain_fields.as_slice()]);

    if !data.types.contains_key(&data.primary_type) {
        return Err(EncodingError::UnsupportedType(data.primary_type.clone()));
    }
    let message_hash = hash_struct(&data.primary_type, &data.message, &data.types)?;

    Ok(keccak256_concat(&[
        TYPED_DATA_PREFIX.as_slice(),
        domain_separator.as_slice(),
        message_hash.as_slice(),
    ]))
}

/// Bit width of `uint8` .. `uint256`.
fn uint_bits(type_name: &str) -> Option<usize> {
    let bits: usize = type_name.strip_prefix("uint")?.parse().ok()?;
    (bits >= 8 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

fn parse_uint(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        Value::String(s) if !s.is_empty() => s.parse::<U256>().ok(),
        _ => None,
    }
}

fn parse_address(s: &str) -> Option<Address> {
    s.parse::<Address>().ok()
}

fn minimal_be_bytes(n: U256) -> Vec<u8> {
    let bytes = n.to_be_bytes::<32>();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
