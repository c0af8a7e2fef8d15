//! 抽出結果の型定義

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 値が無い項目に入れる文字列
pub const UNKNOWN: &str = "Unknown";

const NAME_KEYS: &[&str] = &["name", "Name"];
const HOMETOWN_KEYS: &[&str] = &["hometown", "Hometown", "home_town"];
const HIGH_SCHOOL_KEYS: &[&str] = &["high_school", "High School", "highSchool", "high school"];

/// 選手1人分のレコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub hometown: String,
    pub high_school: String,
}

impl PlayerRecord {
    pub fn new(
        name: impl Into<String>,
        hometown: impl Into<String>,
        high_school: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            hometown: hometown.into().trim().to_string(),
            high_school: high_school.into().trim().to_string(),
        }
    }

    /// 抽出サービスの1要素から変換（欠損・null は全項目 "Unknown"）
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self::new(
            field(obj, NAME_KEYS),
            field(obj, HOMETOWN_KEYS),
            field(obj, HIGH_SCHOOL_KEYS),
        )
    }
}

fn field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match obj.get(*key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// `{"players": [...]}` 形式のレスポンスから選手リストを取り出す
///
/// 形式が違う場合は `None`（空の抽出結果として扱う）。
/// オブジェクト以外の要素は読み飛ばす。
pub fn players_from_response(value: &Value) -> Option<Vec<PlayerRecord>> {
    let players = value.as_object()?.get("players")?.as_array()?;

    Some(
        players
            .iter()
            .filter_map(Value::as_object)
            .map(PlayerRecord::from_object)
            .collect(),
    )
}
