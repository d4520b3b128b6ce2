pub mod earnings;
pub mod levels;
pub mod rates;
pub mod referrals;
pub mod users;

/// Deserializers for document fields that may be stored either as JSON
/// numbers or as numeric strings.
pub mod lenient {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberLike {
        Number(f64),
        Text(String),
    }

    pub fn option_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<NumberLike>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NumberLike::Number(n)) => Ok(Some(n)),
            Some(NumberLike::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(NumberLike::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("expected a number, found {s:?}"))),
        }
    }

    pub fn option_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match option_f64(deserializer)? {
            None => Ok(None),
            Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(Some(n as u32)),
            Some(n) => Err(de::Error::custom(format!(
                "expected a non-negative integer, found {n}"
            ))),
        }
    }

}
