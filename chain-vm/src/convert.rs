//! Host to machine value conversion
//!
//! Conversions are spelled out per type tag; nothing here inspects host
//! types at runtime.

use crate::machine::{IntType, TypedValue, UintType};
use crate::{VmError, VmResult};
use base64::Engine;
use chain_core::{
    parse_coins, Address, Coin, Coins, PubKey, PubKeyEd25519, PubKeyMultisigThreshold,
    PubKeySecp256k1,
};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_TYPE: &str = "std.Address";
pub const COIN_TYPE: &str = "std.Coin";
pub const COINS_TYPE: &str = "std.Coins";
pub const PUBKEY_TYPE: &str = "std.PubKey";

/// A host type with a fixed machine representation
pub trait NativeValue: Sized {
    const TYPE_TAG: &'static str;

    fn to_vm(&self) -> TypedValue;

    fn from_vm(tv: &TypedValue) -> VmResult<Self>;
}

/// Host values the conversion table can produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Address(Address),
    Coin(Coin),
    Coins(Coins),
    PubKey(PubKey),
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HostValue::Address(addr) => write!(f, "{}", addr),
            HostValue::Coin(coin) => write!(f, "{}", coin),
            HostValue::Coins(coins) => write!(f, "{}", coins),
            HostValue::PubKey(key) => write!(f, "{}", key),
        }
    }
}

fn mismatch(expected: &str, tv: &TypedValue) -> VmError {
    VmError::Conversion(format!("expected {}, got {}", expected, tv.type_name()))
}

fn string_field<'a>(tv: &'a TypedValue, name: &str) -> VmResult<&'a str> {
    match tv.field(name).map(TypedValue::underlying) {
        Some(TypedValue::String(s)) => Ok(s),
        _ => Err(VmError::Conversion(format!("missing string field {}", name))),
    }
}

fn bytes_field<'a>(tv: &'a TypedValue, name: &str) -> VmResult<&'a [u8]> {
    match tv.field(name).map(TypedValue::underlying) {
        Some(TypedValue::Bytes(bz)) | Some(TypedValue::ByteArray(bz)) => Ok(bz),
        _ => Err(VmError::Conversion(format!("missing bytes field {}", name))),
    }
}

impl NativeValue for Address {
    const TYPE_TAG: &'static str = ADDRESS_TYPE;

    fn to_vm(&self) -> TypedValue {
        TypedValue::named(ADDRESS_TYPE, TypedValue::String(self.to_string()))
    }

    fn from_vm(tv: &TypedValue) -> VmResult<Self> {
        match tv.underlying() {
            TypedValue::String(s) => Ok(Address::from_str(s)?),
            _ => Err(mismatch(ADDRESS_TYPE, tv)),
        }
    }
}

impl NativeValue for Coin {
    const TYPE_TAG: &'static str = COIN_TYPE;

    fn to_vm(&self) -> TypedValue {
        TypedValue::Struct {
            type_tag: COIN_TYPE.to_string(),
            fields: vec![
                ("Denom".to_string(), TypedValue::String(self.denom.clone())),
                ("Amount".to_string(), TypedValue::int64(self.amount)),
            ],
        }
    }

    fn from_vm(tv: &TypedValue) -> VmResult<Self> {
        let denom = string_field(tv, "Denom")?;
        let amount = match tv.field("Amount").map(TypedValue::underlying) {
            Some(TypedValue::Int { value, .. }) => *value,
            _ => return Err(VmError::Conversion("missing int field Amount".to_string())),
        };
        let coin = Coin {
            denom: denom.to_string(),
            amount,
        };
        coin.validate()?;
        Ok(coin)
    }
}

impl NativeValue for Coins {
    const TYPE_TAG: &'static str = COINS_TYPE;

    fn to_vm(&self) -> TypedValue {
        TypedValue::named(
            COINS_TYPE,
            TypedValue::Slice {
                elem_type: COIN_TYPE.to_string(),
                items: self.iter().map(Coin::to_vm).collect(),
            },
        )
    }

    fn from_vm(tv: &TypedValue) -> VmResult<Self> {
        match tv.underlying() {
            TypedValue::Slice { items, .. } => {
                let coins = items.iter().map(Coin::from_vm).collect::<VmResult<Vec<_>>>()?;
                let coins = Coins::raw(coins).sort();
                coins.validate()?;
                Ok(coins)
            }
            TypedValue::Nil => Ok(Coins::default()),
            _ => Err(mismatch(COINS_TYPE, tv)),
        }
    }
}

const SECP256K1_KIND: &str = "secp256k1";
const ED25519_KIND: &str = "ed25519";
const MULTISIG_KIND: &str = "multisig";

impl NativeValue for PubKey {
    const TYPE_TAG: &'static str = PUBKEY_TYPE;

    fn to_vm(&self) -> TypedValue {
        let fields = match self {
            PubKey::Secp256k1(key) => vec![
                ("Kind".to_string(), TypedValue::string(SECP256K1_KIND)),
                ("Key".to_string(), TypedValue::Bytes(key.0.to_vec())),
            ],
            PubKey::Ed25519(key) => vec![
                ("Kind".to_string(), TypedValue::string(ED25519_KIND)),
                ("Key".to_string(), TypedValue::Bytes(key.0.to_vec())),
            ],
            PubKey::Multisig(multi) => vec![
                ("Kind".to_string(), TypedValue::string(MULTISIG_KIND)),
                (
                    "Threshold".to_string(),
                    TypedValue::Uint {
                        ty: UintType::Uint32,
                        value: multi.threshold as u64,
                    },
                ),
                (
                    "PubKeys".to_string(),
                    TypedValue::Slice {
                        elem_type: PUBKEY_TYPE.to_string(),
                        items: multi.pubkeys.iter().map(PubKey::to_vm).collect(),
                    },
                ),
            ],
        };
        TypedValue::Struct {
            type_tag: PUBKEY_TYPE.to_string(),
            fields,
        }
    }

    fn from_vm(tv: &TypedValue) -> VmResult<Self> {
        match string_field(tv, "Kind")? {
            SECP256K1_KIND => {
                let key = bytes_field(tv, "Key")?;
                let key: [u8; 33] = key
                    .try_into()
                    .map_err(|_| VmError::Conversion("secp256k1 key must be 33 bytes".to_string()))?;
                Ok(PubKey::Secp256k1(PubKeySecp256k1(key)))
            }
            ED25519_KIND => {
                let key = bytes_field(tv, "Key")?;
                let key: [u8; 32] = key
                    .try_into()
                    .map_err(|_| VmError::Conversion("ed25519 key must be 32 bytes".to_string()))?;
                Ok(PubKey::Ed25519(PubKeyEd25519(key)))
            }
            MULTISIG_KIND => {
                let threshold = match tv.field("Threshold").map(TypedValue::underlying) {
                    Some(TypedValue::Uint { value, .. }) => u32::try_from(*value)
                        .map_err(|_| VmError::Conversion("threshold out of range".to_string()))?,
                    _ => return Err(VmError::Conversion("missing field Threshold".to_string())),
                };
                let pubkeys = match tv.field("PubKeys").map(TypedValue::underlying) {
                    Some(TypedValue::Slice { items, .. }) => items
                        .iter()
                        .map(PubKey::from_vm)
                        .collect::<VmResult<Vec<_>>>()?,
                    _ => return Err(VmError::Conversion("missing field PubKeys".to_string())),
                };
                Ok(PubKey::Multisig(PubKeyMultisigThreshold::new(threshold, pubkeys)?))
            }
            other => Err(VmError::Conversion(format!("unknown pubkey kind {}", other))),
        }
    }
}

fn assert_no_plus_prefix(arg: &str) -> VmResult<()> {
    if arg.starts_with('+') {
        return Err(VmError::Conversion("numbers cannot start with +".to_string()));
    }
    Ok(())
}

fn parse_int(arg: &str, ty: IntType) -> VmResult<TypedValue> {
    assert_no_plus_prefix(arg)?;
    let value: i64 = arg
        .parse()
        .map_err(|e| VmError::Conversion(format!("error parsing {} {:?}: {}", ty.name(), arg, e)))?;
    let bits = ty.bits();
    if bits < 64 {
        let max = (1i64 << (bits - 1)) - 1;
        let min = -(1i64 << (bits - 1));
        if value < min || value > max {
            return Err(VmError::Conversion(format!(
                "error parsing {} {:?}: value out of range",
                ty.name(),
                arg
            )));
        }
    }
    Ok(TypedValue::Int { ty, value })
}

fn parse_uint(arg: &str, ty: UintType) -> VmResult<TypedValue> {
    assert_no_plus_prefix(arg)?;
    let value: u64 = arg
        .parse()
        .map_err(|e| VmError::Conversion(format!("error parsing {} {:?}: {}", ty.name(), arg, e)))?;
    let bits = ty.bits();
    if bits < 64 && value > (1u64 << bits) - 1 {
        return Err(VmError::Conversion(format!(
            "error parsing {} {:?}: value out of range",
            ty.name(),
            arg
        )));
    }
    Ok(TypedValue::Uint { ty, value })
}

/// Convert a transaction argument string to a value of the declared type
pub fn convert_arg(arg: &str, ty: &str) -> VmResult<TypedValue> {
    match ty {
        "bool" => match arg {
            "true" => Ok(TypedValue::Bool(true)),
            "false" => Ok(TypedValue::Bool(false)),
            _ => Err(VmError::Conversion(format!("unexpected bool value {:?}", arg))),
        },
        "string" => Ok(TypedValue::String(arg.to_string())),
        "int" => parse_int(arg, IntType::Int),
        "int8" => parse_int(arg, IntType::Int8),
        "int16" => parse_int(arg, IntType::Int16),
        "int32" => parse_int(arg, IntType::Int32),
        "int64" => parse_int(arg, IntType::Int64),
        "uint" => parse_uint(arg, UintType::Uint),
        "uint8" => parse_uint(arg, UintType::Uint8),
        "uint16" => parse_uint(arg, UintType::Uint16),
        "uint32" => parse_uint(arg, UintType::Uint32),
        "uint64" => parse_uint(arg, UintType::Uint64),
        "[]byte" => base64::engine::general_purpose::STANDARD
            .decode(arg)
            .map(TypedValue::Bytes)
            .map_err(|e| VmError::Conversion(format!("error parsing byte slice {:?}: {}", arg, e))),
        ADDRESS_TYPE => Ok(Address::from_str(arg)?.to_vm()),
        COINS_TYPE => Ok(parse_coins(arg)?.to_vm()),
        other => Err(VmError::Conversion(format!(
            "unexpected argument type {} for {:?}",
            other, arg
        ))),
    }
}

/// Convert every argument against its declared parameter type
pub fn convert_args(args: &[String], types: &[String]) -> VmResult<Vec<TypedValue>> {
    if args.len() != types.len() {
        return Err(VmError::Conversion(format!(
            "wrong number of arguments; expected {} got {}",
            types.len(),
            args.len()
        )));
    }
    args.iter()
        .zip(types)
        .map(|(arg, ty)| convert_arg(arg, ty))
        .collect()
}
