//! Serde helpers rendering raw bytes as lowercase hex strings.
//!
//! Use with `#[serde(with = "chainpipe_core::serde_hex")]` on `Vec<u8>` fields
//! and `#[serde(with = "chainpipe_core::serde_hex::option")]` on
//! `Option<Vec<u8>>` fields.

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<T: AsRef<[u8]>, S: Serializer>(bytes: T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    hex::decode(s).map_err(serde::de::Error::custom)
}

pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(hex::decode)
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
