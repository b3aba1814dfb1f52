//! Shelley-era Cardano addresses.
//!
//! An address is a header byte followed by one or two credentials. The high
//! nibble of the header selects the address type, the low nibble is the
//! network id (0 = testnets, 1 = mainnet):
//!
//! | type   | layout                                   |
//! |--------|------------------------------------------|
//! | 0–3    | base: payment cred (28) + stake cred (28) |
//! | 4–5    | pointer: payment cred (28) + pointer      |
//! | 6–7    | enterprise: payment cred (28)             |
//! | 8      | Byron bootstrap address                   |
//! | 14–15  | reward: stake cred (28)                   |

use std::fmt;
use std::str::FromStr;

use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

const CREDENTIAL_LEN: usize = 28;
const STAKE_KEY_HEADER: u8 = 0xe0;
const STAKE_SCRIPT_HEADER: u8 = 0xf0;

/// Classification derived from the address header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Base,
    Pointer,
    Enterprise,
    Byron,
    Reward,
}

/// A raw Cardano address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address(Vec<u8>);

impl Address {
    /// Validate and wrap raw address bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, ParseError> {
        let bytes = bytes.into();
        let header = *bytes.first().ok_or(ParseError::EmptyAddress)?;
        let kind = kind_of(header)?;
        let expected = match kind {
            AddressKind::Base => 1 + 2 * CREDENTIAL_LEN,
            AddressKind::Enterprise | AddressKind::Reward => 1 + CREDENTIAL_LEN,
            AddressKind::Pointer => {
                // pointer part is variable-length; just require the credential
                if bytes.len() <= 1 + CREDENTIAL_LEN {
                    return Err(ParseError::InvalidLength {
                        what: "pointer address",
                        expected: 1 + CREDENTIAL_LEN + 3,
                        actual: bytes.len(),
                    });
                }
                return Ok(Self(bytes));
            }
            AddressKind::Byron => return Ok(Self(bytes)),
        };
        if bytes.len() != expected {
            return Err(ParseError::InvalidLength {
                what: "address",
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn header_type(&self) -> u8 {
        self.0[0] >> 4
    }

    pub fn network_id(&self) -> u8 {
        self.0[0] & 0x0f
    }

    pub fn kind(&self) -> AddressKind {
        // bytes were validated on construction
        kind_of(self.0[0]).unwrap_or(AddressKind::Byron)
    }

    /// Returns the reward (stake) address this address delegates to, if any.
    ///
    /// Base addresses yield their delegation credential as a reward address;
    /// reward addresses yield themselves. Pointer, enterprise and Byron
    /// addresses carry no stake credential.
    pub fn stake_address(&self) -> Option<Address> {
        match self.kind() {
            AddressKind::Reward => Some(self.clone()),
            AddressKind::Base => {
                let header = match self.header_type() {
                    0 | 1 => STAKE_KEY_HEADER,
                    _ => STAKE_SCRIPT_HEADER,
                } | self.network_id();
                let mut bytes = Vec::with_capacity(1 + CREDENTIAL_LEN);
                bytes.push(header);
                bytes.extend_from_slice(&self.0[1 + CREDENTIAL_LEN..]);
                Some(Self(bytes))
            }
            _ => None,
        }
    }

    /// Human-readable bech32 prefix for this address.
    pub fn hrp(&self) -> &'static str {
        let mainnet = self.network_id() == 1;
        match (self.kind(), mainnet) {
            (AddressKind::Reward, true) => "stake",
            (AddressKind::Reward, false) => "stake_test",
            (_, true) => "addr",
            (_, false) => "addr_test",
        }
    }
}

fn kind_of(header: u8) -> Result<AddressKind, ParseError> {
    match header >> 4 {
        0..=3 => Ok(AddressKind::Base),
        4 | 5 => Ok(AddressKind::Pointer),
        6 | 7 => Ok(AddressKind::Enterprise),
        8 => Ok(AddressKind::Byron),
        14 | 15 => Ok(AddressKind::Reward),
        other => Err(ParseError::UnknownAddressHeader(other)),
    }
}

/// Bech32-encode `data` under a constant human-readable prefix.
pub(crate) fn encode_bech32(hrp: &'static str, data: &[u8]) -> String {
    // only fails on malformed prefixes; all callers pass constants
    bech32::encode(hrp, data.to_base32(), Variant::Bech32).unwrap_or_else(|_| hex::encode(data))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            // Byron addresses use base58, which we do not render
            AddressKind::Byron => f.write_str(&hex::encode(&self.0)),
            _ => f.write_str(&encode_bech32(self.hrp(), &self.0)),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("addr") || s.starts_with("stake") {
            let (_, data, _) = bech32::decode(s)?;
            let bytes = Vec::<u8>::from_base32(&data)?;
            return Self::from_bytes(bytes);
        }
        Self::from_bytes(hex::decode(s)?)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
