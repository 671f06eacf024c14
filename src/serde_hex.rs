//! Serde adapters rendering big integers as lowercase hex strings, for use
//! in `#[serde(with)]`. Every integer crossing the boundary to the web layer
//! travels as a hex string.

/// Adapter for a single `BigUint` field.
pub mod biguint_hex {
    use num_bigint::BigUint;
    use num_traits::Num;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_str_radix(16))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BigUint, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex = String::deserialize(deserializer)?;
        BigUint::from_str_radix(&hex, 16).map_err(de::Error::custom)
    }
}

/// Adapter for a `[BigUint; 2]` field (branch pairs in OR-proofs).
pub mod biguint_hex_pair {
    use num_bigint::BigUint;
    use num_traits::Num;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &[BigUint; 2], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let pair = [value[0].to_str_radix(16), value[1].to_str_radix(16)];
        pair.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[BigUint; 2], D::Error>
    where
        D: Deserializer<'de>,
    {
        let pair: [String; 2] = Deserialize::deserialize(deserializer)?;
        let first = BigUint::from_str_radix(&pair[0], 16).map_err(de::Error::custom)?;
        let second = BigUint::from_str_radix(&pair[1], 16).map_err(de::Error::custom)?;
        Ok([first, second])
    }
}
