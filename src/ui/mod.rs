mod bit_grid;

pub use bit_grid::{BitGrid, GridLayout};

use ratatui::style::Color;

/// 画面配色
pub struct Colors;

impl Colors {
    /// 立っているビット
    pub const BIT_SET: Color = Color::White;
    pub const BIT_SET_BG: Color = Color::Rgb(30, 80, 150);
    /// 落ちているビット
    pub const BIT_UNSET: Color = Color::Gray;
    pub const BIT_UNSET_BG: Color = Color::Rgb(40, 40, 40);
    /// 比較で食い違うビット
    pub const BIT_DIFF_BG: Color = Color::Rgb(150, 40, 40);
    /// ドラッグ選択中のビット
    pub const SELECTION_BG: Color = Color::Rgb(170, 140, 20);
    pub const SELECTION_FG: Color = Color::Black;

    /// ビット位置ラベル
    pub const BIT_LABEL: Color = Color::DarkGray;
    /// レジスタ見出し
    pub const HEADER: Color = Color::Cyan;
    /// 凡例・注記
    pub const NOTE: Color = Color::Yellow;

    /// メッセージ
    pub const SUCCESS: Color = Color::Green;
    pub const ERROR: Color = Color::Red;

    /// フォーム
    pub const PLACEHOLDER: Color = Color::DarkGray;
    pub const FOCUS_BG: Color = Color::Rgb(60, 60, 60);

    /// ステータスバー
    pub const STATUS_BG: Color = Color::DarkGray;
    pub const STATUS_FG: Color = Color::White;
}
