//! Wire shapes of the upstream JSON endpoints. The site mixes numbers and numeric strings
//! (sometimes with thousands separators), so numeric fields go through [`lenient_f64`].

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const PATH_FII_DII: &str = "/api/fiidiiTradeReact";
pub const PATH_ALL_INDICES: &str = "/api/allIndices";
pub const PATH_MARKET_STATUS: &str = "/api/marketStatus";
pub const PATH_INDEX_CONSTITUENTS: &str = "/api/equity-stockIndices";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRow {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buy_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sell_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub net_value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllIndicesResponse {
    #[serde(default)]
    pub data: Vec<IndexRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRow {
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub index_symbol: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub last: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub previous_close: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub year_high: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub year_low: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStatusResponse {
    #[serde(default)]
    pub market_state: Vec<MarketStateRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStateRow {
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub market_status: Option<String>,
    #[serde(default)]
    pub trade_date: Option<String>,
    #[serde(default)]
    pub index: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub last: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub variation: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percent_change: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexConstituentsResponse {
    /// Constituent rows, passed through untouched to ticker clients.
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub metadata: Option<IndexMetadata>,
    /// Kept raw as well: the ticker forwards it verbatim.
    #[serde(default)]
    pub advance: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub last: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub change: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub perc_change: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvanceCounts {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub advances: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub declines: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub unchanged: Option<f64>,
}

pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(value_to_f64))
}

pub fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let t = s.trim().replace(',', "");
            if t.is_empty() || t == "-" {
                return None;
            }
            t.parse::<f64>().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numeric_strings_and_numbers() {
        let row: FlowRow = serde_json::from_value(json!({
            "category": "FII/FPI",
            "date": "17-Oct-2026",
            "buyValue": "12,345.67",
            "sellValue": 11000,
            "netValue": "-"
        }))
        .unwrap();
        assert_eq!(row.buy_value, Some(12345.67));
        assert_eq!(row.sell_value, Some(11000.0));
        assert_eq!(row.net_value, None);
    }

    #[test]
    fn tolerates_missing_advance_block() {
        let res: IndexConstituentsResponse = serde_json::from_value(json!({
            "data": [{"symbol": "RELIANCE"}],
            "metadata": {"indexName": "NIFTY 50", "last": 25000.5, "change": 10, "percChange": 0.04}
        }))
        .unwrap();
        assert!(res.advance.is_none());
        assert_eq!(res.data.len(), 1);
        assert_eq!(res.metadata.unwrap().perc_change, Some(0.04));
    }
}
