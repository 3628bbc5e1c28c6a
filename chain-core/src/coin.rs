//! Denominated coin amounts and canonical coin sets
//!
//! A [`Coin`] is a single `(denom, amount)` pair. [`Coins`] is an ordered set
//! of coins that is kept sorted by denomination with no zero or duplicate
//! entries. The panicking arithmetic (`add`/`sub`) is meant for amounts that
//! are already known to be valid; the `*_unsafe` variants return results that
//! may be invalid (negative, for instance) and must be checked with
//! [`Coins::is_valid`] before they are persisted.

use crate::{StdError, StdResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const DENOM_PATTERN: &str = "[a-z][a-z0-9]{2,15}";

static DENOM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{DENOM_PATTERN}$")).expect("denom pattern compiles"));

static COIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^([[:digit:]]+)[[:space:]]*({DENOM_PATTERN})$"))
        .expect("coin pattern compiles")
});

/// Check a denomination against the denom grammar
pub fn validate_denom(denom: &str) -> StdResult<()> {
    if DENOM_RE.is_match(denom) {
        Ok(())
    } else {
        Err(StdError::InvalidCoins(format!("invalid denom: {denom}")))
    }
}

fn must_validate_denom(denom: &str) {
    if let Err(err) = validate_denom(denom) {
        panic!("{err}");
    }
}

/// A single denominated amount
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Coin {
    pub denom: String,
    pub amount: i64,
}

impl Coin {
    /// Create a new coin, panicking on an invalid denom or a negative amount
    pub fn new(denom: impl Into<String>, amount: i64) -> Self {
        let coin = Self {
            denom: denom.into(),
            amount,
        };
        if let Err(err) = coin.validate() {
            panic!("{err}");
        }
        coin
    }

    /// Validate denom and amount
    pub fn validate(&self) -> StdResult<()> {
        validate_denom(&self.denom)?;
        if self.amount < 0 {
            return Err(StdError::InvalidCoins(format!(
                "negative coin amount: {}",
                self.amount
            )));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    fn assert_same_denom(&self, other: &Coin) {
        if self.denom != other.denom {
            panic!(
                "invalid coin denominations; {}, {}",
                self.denom, other.denom
            );
        }
    }

    /// `self >= other`; panics when denominations differ
    pub fn is_gte(&self, other: &Coin) -> bool {
        self.assert_same_denom(other);
        self.amount >= other.amount
    }

    /// `self < other`; panics when denominations differ
    pub fn is_lt(&self, other: &Coin) -> bool {
        self.assert_same_denom(other);
        self.amount < other.amount
    }

    /// Amount equality; panics when denominations differ
    pub fn is_equal(&self, other: &Coin) -> bool {
        self.assert_same_denom(other);
        self.amount == other.amount
    }

    /// Add two coins of the same denom. The result may not be valid.
    pub fn add_unsafe(&self, other: &Coin) -> Coin {
        self.assert_same_denom(other);
        let amount = self
            .amount
            .checked_add(other.amount)
            .unwrap_or_else(|| panic!("coin amount overflow: {} + {}", self, other));
        Coin {
            denom: self.denom.clone(),
            amount,
        }
    }

    /// Add two coins of the same denom, panicking on an invalid result
    pub fn add(&self, other: &Coin) -> Coin {
        let sum = self.add_unsafe(other);
        if let Err(err) = sum.validate() {
            panic!("{err}");
        }
        sum
    }

    /// Subtract two coins of the same denom. The result may be negative.
    pub fn sub_unsafe(&self, other: &Coin) -> Coin {
        self.assert_same_denom(other);
        let amount = self
            .amount
            .checked_sub(other.amount)
            .unwrap_or_else(|| panic!("coin amount overflow: {} - {}", self, other));
        Coin {
            denom: self.denom.clone(),
            amount,
        }
    }

    /// Subtract two coins of the same denom, panicking on a negative result
    pub fn sub(&self, other: &Coin) -> Coin {
        let diff = self.sub_unsafe(other);
        if diff.is_negative() {
            panic!("negative coin amount: {diff}");
        }
        diff
    }

    fn negated(&self) -> Coin {
        let amount = self
            .amount
            .checked_neg()
            .unwrap_or_else(|| panic!("coin amount overflow: -{}", self));
        Coin {
            denom: self.denom.clone(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = StdError;

    fn from_str(s: &str) -> StdResult<Self> {
        parse_coin(s)
    }
}

/// Parse a coin from `"<amount><denom>"`, e.g. `"100ugnot"`
pub fn parse_coin(s: &str) -> StdResult<Coin> {
    let s = s.trim();
    let caps = COIN_RE
        .captures(s)
        .ok_or_else(|| StdError::InvalidCoins(format!("invalid coin expression: {s}")))?;
    let amount: i64 = caps[1]
        .parse()
        .map_err(|e| StdError::InvalidCoins(format!("failed to parse coin amount {}: {e}", &caps[1])))?;
    let denom = &caps[2];
    validate_denom(denom)?;
    Ok(Coin {
        denom: denom.to_string(),
        amount,
    })
}

impl Serialize for Coin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.denom.is_empty() && self.amount == 0 {
            serializer.serialize_str("")
        } else {
            serializer.collect_str(self)
        }
    }
}

impl<'de> Deserialize<'de> for Coin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Ok(Coin::default());
        }
        parse_coin(&s).map_err(de::Error::custom)
    }
}

/// A sorted, denom-unique set of coins
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Build a canonical coin set: zero coins are dropped and the rest sorted.
    /// Panics on a duplicate denom or an invalid coin.
    pub fn new(coins: Vec<Coin>) -> Self {
        let mut coins: Vec<Coin> = coins.into_iter().filter(|c| !c.is_zero()).collect();
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        if let Some(dup) = coins.windows(2).find(|w| w[0].denom == w[1].denom) {
            panic!("find duplicate denom: {}", dup[0].denom);
        }
        let coins = Coins(coins);
        if let Err(err) = coins.validate() {
            panic!("invalid coin set {coins}: {err}");
        }
        coins
    }

    /// Wrap coins as given, without sorting or validation.
    ///
    /// Used for amounts that arrive from the wire and are checked with
    /// [`Coins::validate`] by the consumer.
    pub fn raw(coins: Vec<Coin>) -> Self {
        Coins(coins)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coin> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Coin] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Coin> {
        self.0
    }

    /// Check that coins are sorted, unique, positive and correctly named
    pub fn validate(&self) -> StdResult<()> {
        for (i, coin) in self.0.iter().enumerate() {
            validate_denom(&coin.denom)?;
            if !coin.is_positive() {
                return Err(StdError::InvalidCoins(format!(
                    "coin {coin} amount is not positive"
                )));
            }
            if i > 0 && self.0[i - 1].denom >= coin.denom {
                return Err(StdError::InvalidCoins(format!(
                    "denomination {} is not sorted or is duplicated",
                    coin.denom
                )));
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Merge-add two sorted coin sets. Zero results are dropped; the result
    /// may be invalid.
    pub fn add_unsafe(&self, other: &Coins) -> Coins {
        let (a, b) = (&self.0, &other.0);
        let mut sum = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        loop {
            if i == a.len() {
                sum.extend(b[j..].iter().filter(|c| !c.is_zero()).cloned());
                break;
            }
            if j == b.len() {
                sum.extend(a[i..].iter().filter(|c| !c.is_zero()).cloned());
                break;
            }
            match a[i].denom.cmp(&b[j].denom) {
                Ordering::Less => {
                    if !a[i].is_zero() {
                        sum.push(a[i].clone());
                    }
                    i += 1;
                }
                Ordering::Equal => {
                    let res = a[i].add_unsafe(&b[j]);
                    if !res.is_zero() {
                        sum.push(res);
                    }
                    i += 1;
                    j += 1;
                }
                Ordering::Greater => {
                    if !b[j].is_zero() {
                        sum.push(b[j].clone());
                    }
                    j += 1;
                }
            }
        }
        Coins(sum)
    }

    /// Merge-add, reporting amount overflow or an invalid sum as an error
    pub fn checked_add(&self, other: &Coins) -> StdResult<Coins> {
        for coin in other.iter() {
            let held = self.amount_of(&coin.denom);
            if held.checked_add(coin.amount).is_none() {
                return Err(StdError::InvalidCoins(format!(
                    "coin amount overflow: {}{} + {}",
                    held, coin.denom, coin
                )));
            }
        }
        let sum = self.add_unsafe(other);
        sum.validate()
            .map_err(|err| StdError::InvalidCoins(format!("invalid coin sum {sum}: {err}")))?;
        Ok(sum)
    }

    /// Merge-add, panicking if the result is invalid
    pub fn add(&self, other: &Coins) -> Coins {
        let sum = self.add_unsafe(other);
        if let Err(err) = sum.validate() {
            panic!("invalid coin sum {sum}: {err}");
        }
        sum
    }

    /// Merge-subtract. The result may contain negative amounts.
    pub fn sub_unsafe(&self, other: &Coins) -> Coins {
        self.add_unsafe(&other.negated())
    }

    /// Merge-subtract, panicking on a negative result
    pub fn sub(&self, other: &Coins) -> Coins {
        let diff = self.sub_unsafe(other);
        if diff.is_any_negative() {
            panic!("negative coin amount: {diff}");
        }
        diff
    }

    fn negated(&self) -> Coins {
        Coins(self.0.iter().map(Coin::negated).collect())
    }

    /// Amount held for `denom`, zero when absent. Panics on an invalid denom.
    pub fn amount_of(&self, denom: &str) -> i64 {
        must_validate_denom(denom);
        match self.0.binary_search_by(|c| c.denom.as_str().cmp(denom)) {
            Ok(idx) => self.0[idx].amount,
            Err(_) => 0,
        }
    }

    /// Every denom of `self` is present in `other`
    pub fn denoms_subset_of(&self, other: &Coins) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.0.iter().all(|c| other.amount_of(&c.denom) != 0)
    }

    /// Strictly greater for every denom in `other`
    pub fn is_all_gt(&self, other: &Coins) -> bool {
        if self.is_empty() {
            return false;
        }
        if other.is_empty() {
            return true;
        }
        if !other.denoms_subset_of(self) {
            return false;
        }
        other
            .iter()
            .all(|c| self.amount_of(&c.denom) > c.amount)
    }

    /// Greater or equal for every denom in `other`
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        other
            .iter()
            .all(|c| self.amount_of(&c.denom) >= c.amount)
    }

    pub fn is_all_lt(&self, other: &Coins) -> bool {
        other.is_all_gt(self)
    }

    pub fn is_all_lte(&self, other: &Coins) -> bool {
        other.is_all_gte(self)
    }

    /// Some denom of `self` exceeds a non-zero amount in `other`
    pub fn is_any_gt(&self, other: &Coins) -> bool {
        if other.is_empty() {
            return false;
        }
        self.0.iter().any(|c| {
            let amt = other.amount_of(&c.denom);
            c.amount > amt && amt != 0
        })
    }

    /// Some denom of `self` reaches a non-zero amount in `other`
    pub fn is_any_gte(&self, other: &Coins) -> bool {
        if other.is_empty() {
            return false;
        }
        self.0.iter().any(|c| {
            let amt = other.amount_of(&c.denom);
            c.amount >= amt && amt != 0
        })
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(Coin::is_zero)
    }

    /// Same denoms with the same amounts, regardless of input order
    pub fn is_equal(&self, other: &Coins) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let a = self.clone().sort();
        let b = other.clone().sort();
        a.0.iter()
            .zip(b.0.iter())
            .all(|(x, y)| x.denom == y.denom && x.amount == y.amount)
    }

    /// Non-empty and every amount strictly positive
    pub fn is_all_positive(&self) -> bool {
        !self.is_empty() && self.0.iter().all(Coin::is_positive)
    }

    pub fn is_any_negative(&self) -> bool {
        self.0.iter().any(Coin::is_negative)
    }

    /// Whether any coin's denom is in `denoms`
    pub fn contains_one_of_denom(&self, denoms: &HashSet<String>) -> bool {
        self.0.iter().any(|c| denoms.contains(&c.denom))
    }

    /// Sort by denomination
    pub fn sort(mut self) -> Self {
        self.0.sort_by(|a, b| a.denom.cmp(&b.denom));
        self
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        Coins::new(vec![coin])
    }
}

impl<'a> IntoIterator for &'a Coins {
    type Item = &'a Coin;
    type IntoIter = std::slice::Iter<'a, Coin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, coin) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{coin}")?;
        }
        Ok(())
    }
}

impl FromStr for Coins {
    type Err = StdError;

    fn from_str(s: &str) -> StdResult<Self> {
        parse_coins(s)
    }
}

/// Parse a comma separated coin list, e.g. `"300ugnot,100foo"`.
///
/// The result is sorted and validated; an empty string gives empty coins.
pub fn parse_coins(s: &str) -> StdResult<Coins> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Coins::default());
    }
    let coins = s
        .split(',')
        .map(parse_coin)
        .collect::<StdResult<Vec<_>>>()?;
    let coins = Coins(coins).sort();
    coins
        .validate()
        .map_err(|err| StdError::InvalidCoins(format!("parse coins {s}: {err}")))?;
    Ok(coins)
}

impl Serialize for Coins {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_coins(&s).map_err(de::Error::custom)
    }
}
