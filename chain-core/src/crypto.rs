//! Public keys, private keys and multisignatures

use crate::{Address, StdError, StdResult};
use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex (de)serialization for fixed-size byte arrays
pub(crate) mod hex_array {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom(format!("expected {N} bytes")))
    }
}

/// Hex (de)serialization for byte vectors
pub(crate) mod hex_bytes {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(de::Error::custom)
    }
}

/// Compressed secp256k1 public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PubKeySecp256k1(#[serde(with = "hex_array")] pub [u8; 33]);

/// Ed25519 public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PubKeyEd25519(#[serde(with = "hex_array")] pub [u8; 32]);

/// K-of-N threshold multisig key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PubKeyMultisigThreshold {
    pub threshold: u32,
    pub pubkeys: Vec<PubKey>,
}

impl PubKeyMultisigThreshold {
    /// Create a threshold key; `threshold` must be in `1..=pubkeys.len()`
    pub fn new(threshold: u32, pubkeys: Vec<PubKey>) -> StdResult<Self> {
        if threshold == 0 {
            return Err(StdError::InvalidPubKey(
                "threshold k of n multisignature: k <= 0".to_string(),
            ));
        }
        if pubkeys.len() < threshold as usize {
            return Err(StdError::InvalidPubKey(
                "threshold k of n multisignature: len(pubkeys) < k".to_string(),
            ));
        }
        Ok(Self { threshold, pubkeys })
    }

    fn verify_bytes(&self, msg: &[u8], sig: &[u8]) -> bool {
        let Ok(multisig) = Multisignature::decode(sig) else {
            return false;
        };
        let size = multisig.bit_array.size();
        if size != self.pubkeys.len() {
            return false;
        }
        let signed = multisig.bit_array.num_true_bits();
        if signed < self.threshold as usize || multisig.sigs.len() != signed {
            return false;
        }
        let mut sig_index = 0;
        for (i, pubkey) in self.pubkeys.iter().enumerate() {
            if multisig.bit_array.get_index(i) {
                if !pubkey.verify_bytes(msg, &multisig.sigs[sig_index]) {
                    return false;
                }
                sig_index += 1;
            }
        }
        true
    }
}

/// A public key of any supported kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "@type", content = "value")]
pub enum PubKey {
    #[serde(rename = "/tm.PubKeySecp256k1")]
    Secp256k1(PubKeySecp256k1),
    #[serde(rename = "/tm.PubKeyEd25519")]
    Ed25519(PubKeyEd25519),
    #[serde(rename = "/tm.PubKeyMultisig")]
    Multisig(PubKeyMultisigThreshold),
}

impl PubKey {
    /// Canonical byte encoding, used for address derivation
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            PubKey::Secp256k1(key) => key.0.to_vec(),
            PubKey::Ed25519(key) => key.0.to_vec(),
            PubKey::Multisig(multi) => {
                let mut bz = b"multisig".to_vec();
                bz.extend_from_slice(&multi.threshold.to_be_bytes());
                for sub in &multi.pubkeys {
                    let sub_bz = sub.bytes();
                    bz.extend_from_slice(&(sub_bz.len() as u32).to_be_bytes());
                    bz.extend_from_slice(&sub_bz);
                }
                bz
            }
        }
    }

    /// Address controlled by this key
    pub fn address(&self) -> Address {
        Address::from_preimage(&self.bytes())
    }

    /// Verify `sig` over `msg`. Any malformed key or signature fails.
    pub fn verify_bytes(&self, msg: &[u8], sig: &[u8]) -> bool {
        match self {
            PubKey::Secp256k1(key) => {
                let secp = secp256k1::Secp256k1::verification_only();
                let Ok(public_key) = secp256k1::PublicKey::from_slice(&key.0) else {
                    return false;
                };
                let Ok(signature) = secp256k1::ecdsa::Signature::from_compact(sig) else {
                    return false;
                };
                let message = secp256k1::Message::from_digest(sha256(msg));
                public_key.verify(&secp, message, &signature).is_ok()
            }
            PubKey::Ed25519(key) => {
                let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(&key.0) else {
                    return false;
                };
                let Ok(signature) = ed25519_dalek::Signature::from_slice(sig) else {
                    return false;
                };
                verifying_key.verify(msg, &signature).is_ok()
            }
            PubKey::Multisig(multi) => multi.verify_bytes(msg, sig),
        }
    }

    /// Number of leaf keys, counting nested multisig keys recursively
    pub fn count_sub_keys(&self) -> usize {
        match self {
            PubKey::Secp256k1(_) | PubKey::Ed25519(_) => 1,
            PubKey::Multisig(multi) => multi.pubkeys.iter().map(PubKey::count_sub_keys).sum(),
        }
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PubKey::Secp256k1(key) => write!(f, "PubKeySecp256k1{{{}}}", hex::encode_upper(key.0)),
            PubKey::Ed25519(key) => write!(f, "PubKeyEd25519{{{}}}", hex::encode_upper(key.0)),
            PubKey::Multisig(multi) => write!(
                f,
                "PubKeyMultisig{{{}/{}}}",
                multi.threshold,
                multi.pubkeys.len()
            ),
        }
    }
}

fn sha256(bz: &[u8]) -> [u8; 32] {
    Sha256::digest(bz).into()
}

/// Fixed-size bit array recording which multisig members signed.
///
/// Decoding rejects a bit count that disagrees with the stored bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBitArray")]
pub struct BitArray {
    bits: usize,
    elems: Vec<u8>,
}

#[derive(Deserialize)]
struct RawBitArray {
    bits: usize,
    elems: Vec<u8>,
}

impl TryFrom<RawBitArray> for BitArray {
    type Error = StdError;

    fn try_from(raw: RawBitArray) -> StdResult<Self> {
        if raw.elems.len() != raw.bits.div_ceil(8) {
            return Err(StdError::Unauthorized(format!(
                "bit array of {} bits carries {} bytes",
                raw.bits,
                raw.elems.len()
            )));
        }
        Ok(Self {
            bits: raw.bits,
            elems: raw.elems,
        })
    }
}

impl BitArray {
    pub fn new(bits: usize) -> Self {
        Self {
            bits,
            elems: vec![0u8; bits.div_ceil(8)],
        }
    }

    pub fn size(&self) -> usize {
        self.bits
    }

    pub fn get_index(&self, i: usize) -> bool {
        if i >= self.bits {
            return false;
        }
        self.elems
            .get(i >> 3)
            .is_some_and(|e| e & (1 << (7 - (i % 8))) != 0)
    }

    /// Set bit `i`; returns false when out of range
    pub fn set_index(&mut self, i: usize, value: bool) -> bool {
        if i >= self.bits {
            return false;
        }
        let Some(elem) = self.elems.get_mut(i >> 3) else {
            return false;
        };
        let mask = 1 << (7 - (i % 8));
        if value {
            *elem |= mask;
        } else {
            *elem &= !mask;
        }
        true
    }

    pub fn num_true_bits(&self) -> usize {
        (0..self.bits).filter(|&i| self.get_index(i)).count()
    }
}

/// Signatures of the members of a threshold key, ordered by member index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multisignature {
    pub bit_array: BitArray,
    pub sigs: Vec<Vec<u8>>,
}

impl Multisignature {
    /// Empty multisignature for a key with `n` members
    pub fn new(n: usize) -> Self {
        Self {
            bit_array: BitArray::new(n),
            sigs: Vec::new(),
        }
    }

    /// Add or replace the signature of member `index`
    pub fn add_signature(&mut self, sig: Vec<u8>, index: usize) {
        let pos = (0..index).filter(|&i| self.bit_array.get_index(i)).count();
        if self.bit_array.get_index(index) {
            self.sigs[pos] = sig;
            return;
        }
        if self.bit_array.set_index(index, true) {
            self.sigs.insert(pos, sig);
        }
    }

    /// Add the signature made by `pubkey`, a member of `keys`
    pub fn add_signature_from_pubkey(
        &mut self,
        sig: Vec<u8>,
        pubkey: &PubKey,
        keys: &[PubKey],
    ) -> StdResult<()> {
        let index = keys
            .iter()
            .position(|k| k == pubkey)
            .ok_or_else(|| StdError::InvalidPubKey("provided key didn't exist in pubkeys".to_string()))?;
        self.add_signature(sig, index);
        Ok(())
    }

    pub fn encode(&self) -> StdResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StdError::Internal(e.to_string()))
    }

    pub fn decode(bz: &[u8]) -> StdResult<Self> {
        Ok(serde_json::from_slice(bz)?)
    }
}

/// A private key able to produce signatures for its [`PubKey`]
#[derive(Clone)]
pub enum PrivKey {
    Secp256k1([u8; 32]),
    Ed25519([u8; 32]),
}

impl PrivKey {
    /// Generate a random secp256k1 key
    pub fn generate_secp256k1() -> Self {
        loop {
            let bytes: [u8; 32] = rand::random();
            if secp256k1::SecretKey::from_slice(&bytes).is_ok() {
                return PrivKey::Secp256k1(bytes);
            }
        }
    }

    /// Generate a random ed25519 key
    pub fn generate_ed25519() -> Self {
        PrivKey::Ed25519(rand::random())
    }

    pub fn pub_key(&self) -> StdResult<PubKey> {
        match self {
            PrivKey::Secp256k1(bytes) => {
                let secp = secp256k1::Secp256k1::new();
                let secret_key = secp256k1::SecretKey::from_slice(bytes)
                    .map_err(|e| StdError::InvalidPubKey(e.to_string()))?;
                let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
                Ok(PubKey::Secp256k1(PubKeySecp256k1(public_key.serialize())))
            }
            PrivKey::Ed25519(bytes) => {
                let signing_key = ed25519_dalek::SigningKey::from_bytes(bytes);
                Ok(PubKey::Ed25519(PubKeyEd25519(
                    signing_key.verifying_key().to_bytes(),
                )))
            }
        }
    }

    /// Sign `msg`; secp256k1 signs its SHA-256 digest
    pub fn sign(&self, msg: &[u8]) -> StdResult<Vec<u8>> {
        match self {
            PrivKey::Secp256k1(bytes) => {
                let secp = secp256k1::Secp256k1::new();
                let secret_key = secp256k1::SecretKey::from_slice(bytes)
                    .map_err(|e| StdError::Internal(e.to_string()))?;
                let message = secp256k1::Message::from_digest(sha256(msg));
                let sig = secp.sign_ecdsa(message, &secret_key);
                Ok(sig.serialize_compact().to_vec())
            }
            PrivKey::Ed25519(bytes) => {
                let signing_key = ed25519_dalek::SigningKey::from_bytes(bytes);
                Ok(signing_key.sign(msg).to_bytes().to_vec())
            }
        }
    }
}

impl fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivKey::Secp256k1(_) => f.write_str("PrivKey::Secp256k1(..)"),
            PrivKey::Ed25519(_) => f.write_str("PrivKey::Ed25519(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secp_keys(n: usize) -> Vec<(PrivKey, PubKey)> {
        (0..n)
            .map(|_| {
                let priv_key = PrivKey::generate_secp256k1();
                let pub_key = priv_key.pub_key().unwrap();
                (priv_key, pub_key)
            })
            .collect()
    }

    #[test]
    fn test_bit_array_size_must_match_bytes() {
        let ok: BitArray = serde_json::from_str(r#"{"bits":10,"elems":[0,0]}"#).unwrap();
        assert_eq!(ok.size(), 10);

        let huge = format!(r#"{{"bits":{},"elems":[]}}"#, usize::MAX);
        assert!(serde_json::from_str::<BitArray>(&huge).is_err());
        assert!(serde_json::from_str::<BitArray>(r#"{"bits":3,"elems":[0,0]}"#).is_err());

        let sig = format!(r#"{{"bit_array":{},"sigs":[]}}"#, huge);
        assert!(Multisignature::decode(sig.as_bytes()).is_err());
    }

    #[test]
    fn test_secp256k1_sign_verify() {
        let (priv_key, pub_key) = secp_keys(1).remove(0);
        let sig = priv_key.sign(b"hello").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(pub_key.verify_bytes(b"hello", &sig));
        assert!(!pub_key.verify_bytes(b"other", &sig));
        assert!(!pub_key.verify_bytes(b"hello", &sig[..10]));
    }

    #[test]
    fn test_ed25519_sign_verify() {
        let priv_key = PrivKey::generate_ed25519();
        let pub_key = priv_key.pub_key().unwrap();
        let sig = priv_key.sign(b"hello").unwrap();
        assert!(pub_key.verify_bytes(b"hello", &sig));
        assert!(!pub_key.verify_bytes(b"hellO", &sig));
    }

    #[test]
    fn test_multisig_threshold_verification() {
        let keys = secp_keys(3);
        let pubkeys: Vec<PubKey> = keys.iter().map(|(_, pk)| pk.clone()).collect();
        let multi = PubKey::Multisig(PubKeyMultisigThreshold::new(2, pubkeys.clone()).unwrap());
        let msg = b"sign me";

        let mut multisig = Multisignature::new(3);
        let sig2 = keys[2].0.sign(msg).unwrap();
        multisig
            .add_signature_from_pubkey(sig2, &pubkeys[2], &pubkeys)
            .unwrap();
        assert!(!multi.verify_bytes(msg, &multisig.encode().unwrap()));

        let sig0 = keys[0].0.sign(msg).unwrap();
        multisig
            .add_signature_from_pubkey(sig0, &pubkeys[0], &pubkeys)
            .unwrap();
        assert_eq!(multisig.bit_array.num_true_bits(), 2);
        assert!(multi.verify_bytes(msg, &multisig.encode().unwrap()));
        assert!(!multi.verify_bytes(b"tampered", &multisig.encode().unwrap()));
    }

    #[test]
    fn test_multisig_threshold_bounds() {
        let pubkeys: Vec<PubKey> = secp_keys(2).into_iter().map(|(_, pk)| pk).collect();
        assert!(PubKeyMultisigThreshold::new(0, pubkeys.clone()).is_err());
        assert!(PubKeyMultisigThreshold::new(3, pubkeys.clone()).is_err());
        assert!(PubKeyMultisigThreshold::new(2, pubkeys).is_ok());
    }

    #[test]
    fn test_count_sub_keys() {
        let single = secp_keys(1).remove(0).1;
        assert_eq!(single.count_sub_keys(), 1);

        let five: Vec<PubKey> = secp_keys(5).into_iter().map(|(_, pk)| pk).collect();
        let multi = PubKey::Multisig(PubKeyMultisigThreshold::new(3, five.clone()).unwrap());
        assert_eq!(multi.count_sub_keys(), 5);

        let mut nested_keys = five;
        nested_keys.push(multi);
        let nested = PubKey::Multisig(PubKeyMultisigThreshold::new(3, nested_keys).unwrap());
        assert_eq!(nested.count_sub_keys(), 10);
    }

    #[test]
    fn test_bit_array() {
        let mut bits = BitArray::new(10);
        assert!(bits.set_index(0, true));
        assert!(bits.set_index(9, true));
        assert!(!bits.set_index(10, true));
        assert!(bits.get_index(9));
        assert!(!bits.get_index(5));
        assert_eq!(bits.num_true_bits(), 2);
        bits.set_index(0, false);
        assert_eq!(bits.num_true_bits(), 1);
    }

    #[test]
    fn test_pubkey_serde_tagged() {
        let pub_key = PubKey::Secp256k1(PubKeySecp256k1([2u8; 33]));
        let json = serde_json::to_value(&pub_key).unwrap();
        assert_eq!(json["@type"], "/tm.PubKeySecp256k1");
        let back: PubKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, pub_key);
    }

    #[test]
    fn test_address_differs_per_key() {
        let keys = secp_keys(2);
        assert_ne!(keys[0].1.address(), keys[1].1.address());
        assert_eq!(keys[0].1.address(), keys[0].1.address());
    }
}
