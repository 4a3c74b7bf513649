pub const DATE_FMT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub mod serializer {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde::de::Error;
    use crate::utils::date::DATE_FMT;

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        time_to_json(*time).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let str_time: String = Deserialize::deserialize(deserializer)?;
        let time = NaiveDateTime::parse_from_str(&str_time, DATE_FMT).map_err(D::Error::custom)?;
        Ok(time)
    }

    // written in the same format it is parsed with so entities survive a store round trip
    pub(crate) fn time_to_json(t: NaiveDateTime) -> String {
        format!("{}", t.format(DATE_FMT))
    }
}

pub mod opt_serializer {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde::de::Error;
    use crate::utils::date::DATE_FMT;
    use crate::utils::date::serializer::time_to_json;

    pub fn serialize<S: Serializer>(time: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
        time.map(time_to_json).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error> {
        let str_time: Option<String> = Deserialize::deserialize(deserializer)?;
        match str_time {
            Some(s) if !s.is_empty() => {
                NaiveDateTime::parse_from_str(&s, DATE_FMT).map(Some).map_err(D::Error::custom)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use serde::{Deserialize, Serialize};
    use crate::utils::date::{opt_serializer, serializer};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamp {
        #[serde(with = "serializer")]
        at: NaiveDateTime,
        #[serde(with = "opt_serializer", default)]
        until: Option<NaiveDateTime>,
    }

    #[tokio::test]
    async fn test_should_parse_serialized_dates() {
        let at = NaiveDate::from_ymd_opt(2023, 4, 12).unwrap().and_hms_milli_opt(12, 12, 12, 250).unwrap();
        let stamp = Stamp { at, until: None };
        let json = serde_json::to_string(&stamp).expect("serialize");
        assert!(json.contains("2023-04-12T12:12:12.250"));
        let parsed: Stamp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(stamp, parsed);
    }

    #[tokio::test]
    async fn test_should_treat_empty_date_as_none() {
        let parsed: Stamp = serde_json::from_str(r#"{"at":"2023-04-12T12:12:12","until":""}"#).expect("deserialize");
        assert_eq!(None, parsed.until);
    }
}
