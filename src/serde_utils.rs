use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize_status_code<S>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u16(status.as_u16())
}

/// Reads an optional human readable duration such as `"30s"` or `"2m 30s"`.
pub fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    humantime::parse_duration(&text)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

pub fn serialize_optional_duration<S>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match duration {
        Some(duration) => {
            serializer.serialize_str(&humantime::format_duration(*duration).to_string())
        }
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct TestStruct {
        #[serde(
            default,
            deserialize_with = "deserialize_optional_duration",
            serialize_with = "serialize_optional_duration"
        )]
        timeout: Option<Duration>,
    }

    #[derive(Serialize)]
    struct StatusStruct {
        #[serde(serialize_with = "serialize_status_code")]
        status: StatusCode,
    }

    #[test]
    fn test_deserialize_optional_duration() {
        let json = r#"{"timeout": "2m 30s"}"#;
        let result: TestStruct = serde_json::from_str(json).unwrap();
        assert_eq!(result.timeout, Some(Duration::from_secs(150)));

        let result: TestStruct = serde_json::from_str("{}").unwrap();
        assert_eq!(result.timeout, None);
    }

    #[test]
    fn test_deserialize_invalid_duration() {
        let json = r#"{"timeout": "soon"}"#;
        assert!(serde_json::from_str::<TestStruct>(json).is_err());
    }

    #[test]
    fn test_serialize_optional_duration() {
        let json = serde_json::to_string(&TestStruct {
            timeout: Some(Duration::from_secs(90)),
        })
        .unwrap();
        assert_eq!(json, r#"{"timeout":"1m 30s"}"#);

        let json = serde_json::to_string(&TestStruct { timeout: None }).unwrap();
        assert_eq!(json, r#"{"timeout":null}"#);
    }

    #[test]
    fn test_serialize_status_code() {
        let json = serde_json::to_string(&StatusStruct {
            status: StatusCode::NO_CONTENT,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":204}"#);
    }
}
