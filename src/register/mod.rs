mod model;

pub use model::{Bit, BitKey, Formats, Register, RegisterPair, RegisterTag, SUPPORTED_WIDTHS};

use thiserror::Error;

/// レジスタ操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// サポート外のビット幅
    #[error("unsupported bit width {0} (expected 8, 16, 32 or 64)")]
    UnsupportedWidth(u16),
    /// 値がビット幅に収まらない
    #[error("Value {value} exceeds maximum for {bit_width}-bit ({max})")]
    ValueTooWide {
        value: u64,
        bit_width: u16,
        max: u64,
    },
    /// ビット位置が範囲外
    #[error("bit position {position} out of range for {bit_width}-bit register")]
    PositionOutOfRange { position: u16, bit_width: u16 },
    /// 協調サービスの応答データが不整合
    #[error("inconsistent bit data: {0}")]
    MalformedBits(String),
}
