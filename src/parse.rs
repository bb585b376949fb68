//! 外部パース協調サービスの境界
//!
//! リクエスト/レスポンスの形はJSONワイヤ形式そのまま（serdeで直列化可能）。
//! コアは応答をそのまま消費し、選択・編集の間にサービスを再呼び出ししない。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::register::{Bit, Formats, Register, RegisterError};

/// 入力値の基数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberFormat {
    #[default]
    Hex,
    Dec,
    Oct,
}

impl NumberFormat {
    pub fn name(self) -> &'static str {
        match self {
            NumberFormat::Hex => "hex",
            NumberFormat::Dec => "dec",
            NumberFormat::Oct => "oct",
        }
    }

    /// 選択UI用の巡回
    pub fn next(self) -> Self {
        match self {
            NumberFormat::Hex => NumberFormat::Dec,
            NumberFormat::Dec => NumberFormat::Oct,
            NumberFormat::Oct => NumberFormat::Hex,
        }
    }

    pub fn prev(self) -> Self {
        self.next().next()
    }

    /// 値入力欄のプレースホルダ
    pub fn placeholder(self) -> &'static str {
        match self {
            NumberFormat::Hex => "Enter hex value (e.g., 0x12345678, ABCDEF)",
            NumberFormat::Dec => "Enter decimal value (e.g., 305419896)",
            NumberFormat::Oct => "Enter octal value (e.g., 0o1234567, 1234567)",
        }
    }

    /// この基数に対応する表現を選ぶ（入力欄への書き戻し用）
    pub fn pick(self, formats: &Formats) -> &str {
        match self {
            NumberFormat::Hex => &formats.hex,
            NumberFormat::Dec => &formats.dec,
            NumberFormat::Oct => &formats.oct,
        }
    }
}

/// パース要求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRequest {
    pub value: String,
    pub compare_value: String,
    pub format: NumberFormat,
    /// ワイヤ形式の都合で文字列エンコード
    pub bit_width: String,
}

/// パース応答。successがfalseのときはerrorのみ意味を持つ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<Vec<Bit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<Formats>,
    /// 比較値なしならNone（ワイヤ上はnull）
    pub comparison: Option<ComparisonResult>,
}

impl ParseResponse {
    fn failure(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }

    /// 応答の主値フィールドからレジスタを組み立て直す（不整合データは拒否）
    pub fn primary_register(&self) -> Result<Register, RegisterError> {
        let (Some(parsed_value), Some(bit_width), Some(binary), Some(bits), Some(formats)) = (
            self.parsed_value,
            self.bit_width,
            self.binary.as_ref(),
            self.bits.as_ref(),
            self.formats.as_ref(),
        ) else {
            return Err(RegisterError::MalformedBits(
                "missing bit data".to_string(),
            ));
        };
        Register::from_parts(
            parsed_value,
            bit_width,
            binary.clone(),
            bits.clone(),
            formats.clone(),
        )
    }
}

/// 比較値の解析結果。解析に失敗した場合はerrorのみ設定される
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_value: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits: Option<Vec<Bit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<Formats>,
}

impl ComparisonResult {
    /// 比較値レジスタを応答フィールドから復元。errorが設定済みならNone
    pub fn to_register(&self) -> Option<Result<Register, RegisterError>> {
        if self.error.is_some() {
            return None;
        }
        let (Some(parsed_value), Some(bit_width), Some(binary), Some(bits), Some(formats)) = (
            self.parsed_value,
            self.bit_width,
            self.binary.as_ref(),
            self.bits.as_ref(),
            self.formats.as_ref(),
        ) else {
            return Some(Err(RegisterError::MalformedBits(
                "missing comparison bit data".to_string(),
            )));
        };
        Some(Register::from_parts(
            parsed_value,
            bit_width,
            binary.clone(),
            bits.clone(),
            formats.clone(),
        ))
    }
}

/// サービス呼び出し自体の失敗（応答が返らなかった場合）
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not connect to parsing service: {0}")]
    Unreachable(String),
}

/// パース協調サービスの継ぎ目
pub trait ParseService {
    fn parse(&self, request: &ParseRequest) -> Result<ParseResponse, ServiceError>;
}

/// プロセス内実装
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterParser;

impl ParseService for RegisterParser {
    fn parse(&self, request: &ParseRequest) -> Result<ParseResponse, ServiceError> {
        Ok(parse_register(request))
    }
}

/// 要求をデコードして応答を組み立てる
///
/// 主値の失敗は応答全体の失敗、比較値の失敗は`comparison.error`への縮退。
pub fn parse_register(request: &ParseRequest) -> ParseResponse {
    let value = request.value.trim();
    let compare_value = request.compare_value.trim();

    let bit_width = match request.bit_width.trim().parse::<u16>() {
        Ok(width) => width,
        Err(e) => {
            return ParseResponse::failure(format!(
                "Invalid number format: bad bit width {:?}: {}",
                request.bit_width, e
            ));
        }
    };

    let register = match parse_single_value(value, request.format)
        .and_then(|parsed| Register::decode(parsed, bit_width).map_err(|e| e.to_string()))
    {
        Ok(register) => register,
        Err(e) => {
            log::debug!("parse failed for {value:?}: {e}");
            return ParseResponse::failure(format!("Invalid number format: {e}"));
        }
    };

    let comparison = if compare_value.is_empty() {
        None
    } else {
        Some(
            match parse_single_value(compare_value, request.format)
                .and_then(|parsed| Register::decode(parsed, bit_width).map_err(|e| e.to_string()))
            {
                Ok(register) => ComparisonResult {
                    error: None,
                    compare_value: Some(compare_value.to_string()),
                    parsed_value: Some(register.parsed_value()),
                    binary: Some(register.binary().to_string()),
                    bit_width: Some(register.bit_width()),
                    bits: Some(register.bits().to_vec()),
                    formats: Some(register.formats().clone()),
                },
                Err(e) => ComparisonResult {
                    error: Some(format!("Invalid comparison value: {e}")),
                    ..Default::default()
                },
            },
        )
    };

    ParseResponse {
        success: true,
        error: None,
        original_value: Some(value.to_string()),
        parsed_value: Some(register.parsed_value()),
        binary: Some(register.binary().to_string()),
        bit_width: Some(register.bit_width()),
        bits: Some(register.bits().to_vec()),
        formats: Some(register.formats().clone()),
        comparison,
    }
}

/// 1つの値を基数に従って解釈（hex/octは任意の0x・0oプレフィックスを剥がす）
fn parse_single_value(value: &str, format: NumberFormat) -> Result<u64, String> {
    let (digits, radix) = match format {
        NumberFormat::Hex => (strip_prefix(value, "0x", "0X"), 16),
        NumberFormat::Dec => (value, 10),
        NumberFormat::Oct => (strip_prefix(value, "0o", "0O"), 8),
    };
    u64::from_str_radix(digits, radix)
        .map_err(|e| format!("invalid {} value {:?}: {}", format.name(), value, e))
}

fn strip_prefix<'a>(value: &'a str, lower: &str, upper: &str) -> &'a str {
    value
        .strip_prefix(lower)
        .or_else(|| value.strip_prefix(upper))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: &str, compare: &str, format: NumberFormat, width: &str) -> ParseRequest {
        ParseRequest {
            value: value.to_string(),
            compare_value: compare.to_string(),
            format,
            bit_width: width.to_string(),
        }
    }

    #[test]
    fn parses_hex_with_and_without_prefix() {
        for value in ["0xCA", "0XCA", "CA", "  0xCA  "] {
            let response = parse_register(&request(value, "", NumberFormat::Hex, "8"));
            assert!(response.success, "{value}");
            assert_eq!(response.parsed_value, Some(0xCA));
            assert_eq!(response.binary.as_deref(), Some("11001010"));
        }
    }

    #[test]
    fn parses_decimal_and_octal() {
        let response = parse_register(&request("202", "", NumberFormat::Dec, "8"));
        assert_eq!(response.parsed_value, Some(202));

        let response = parse_register(&request("0o312", "", NumberFormat::Oct, "8"));
        assert_eq!(response.parsed_value, Some(0o312));
        assert_eq!(
            response.formats.as_ref().map(|f| f.oct.clone()),
            Some("0o312".to_string())
        );
    }

    #[test]
    fn rejects_garbage_value() {
        let response = parse_register(&request("zzz", "", NumberFormat::Hex, "8"));
        assert!(!response.success);
        let error = response.error.unwrap();
        assert!(error.starts_with("Invalid number format:"), "{error}");
        assert!(response.bits.is_none());
    }

    #[test]
    fn rejects_negative_value() {
        let response = parse_register(&request("-5", "", NumberFormat::Dec, "8"));
        assert!(!response.success);
    }

    #[test]
    fn rejects_value_exceeding_width() {
        let response = parse_register(&request("0x1FF", "", NumberFormat::Hex, "8"));
        assert!(!response.success);
        assert!(
            response
                .error
                .as_deref()
                .unwrap()
                .contains("exceeds maximum for 8-bit (255)")
        );
    }

    #[test]
    fn rejects_bad_bit_width() {
        let response = parse_register(&request("1", "", NumberFormat::Hex, "wide"));
        assert!(!response.success);
        let response = parse_register(&request("1", "", NumberFormat::Hex, "12"));
        assert!(!response.success);
    }

    #[test]
    fn comparison_failure_degrades_to_partial_response() {
        let response = parse_register(&request("0xCA", "zzz", NumberFormat::Hex, "8"));
        assert!(response.success);
        let comparison = response.comparison.unwrap();
        assert!(
            comparison
                .error
                .as_deref()
                .unwrap()
                .starts_with("Invalid comparison value:")
        );
        assert!(comparison.bits.is_none());
        assert!(comparison.to_register().is_none());
    }

    #[test]
    fn comparison_success_carries_full_register() {
        let response = parse_register(&request("0xCA", "0xC2", NumberFormat::Hex, "8"));
        let comparison = response.comparison.unwrap();
        assert_eq!(comparison.parsed_value, Some(0xC2));
        let register = comparison.to_register().unwrap().unwrap();
        assert_eq!(register.binary(), "11000010");
    }

    #[test]
    fn primary_register_roundtrips_through_response() {
        let response = parse_register(&request("0xCA", "", NumberFormat::Hex, "8"));
        let register = response.primary_register().unwrap();
        assert_eq!(register.parsed_value(), 0xCA);
        assert_eq!(register.bits().len(), 8);
    }

    #[test]
    fn primary_register_rejects_missing_bit_data() {
        let mut response = parse_register(&request("0xCA", "", NumberFormat::Hex, "8"));
        response.bits = None;
        assert!(response.primary_register().is_err());
    }

    #[test]
    fn wire_format_matches_collaborator_json() {
        let request = request("0x12", "", NumberFormat::Hex, "8");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["format"], "hex");
        assert_eq!(json["bit_width"], "8");

        let response = parse_register(&request);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["parsed_value"], 0x12);
        assert_eq!(json["binary"], "00010010");
        assert_eq!(json["bits"][1], serde_json::json!({
            "position": 1,
            "value": "1",
            "set": true,
        }));
        assert_eq!(json["formats"]["hex"], "0x12");
        // 比較値なしはnull
        assert!(json["comparison"].is_null());

        let decoded: ParseResponse = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn placeholders_follow_selected_format() {
        assert!(NumberFormat::Hex.placeholder().contains("0x12345678"));
        assert!(NumberFormat::Dec.placeholder().contains("305419896"));
        assert!(NumberFormat::Oct.placeholder().contains("0o1234567"));
    }

    #[test]
    fn format_cycle_is_closed() {
        let mut format = NumberFormat::Hex;
        for _ in 0..3 {
            format = format.next();
        }
        assert_eq!(format, NumberFormat::Hex);
        assert_eq!(NumberFormat::Hex.prev(), NumberFormat::Oct);
    }
}
