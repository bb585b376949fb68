use std::collections::BTreeSet;

use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect},
    style::{Modifier, Style},
    widgets::Widget,
};

use super::Colors;
use crate::register::{BitKey, RegisterPair, RegisterTag};

/// セル1個の表示幅（2桁のビット番号に合わせる）
const CELL_WIDTH: u16 = 2;
/// セル間隔
const CELL_STRIDE: u16 = 3;
/// 8ビットごとの区切り幅
const GROUP_GAP: u16 = 2;
const BITS_PER_ROW: u16 = 16;
const GROUP_SIZE: u16 = 8;

/// 1レジスタ分の行配置
#[derive(Debug, Clone, Copy)]
struct RegisterBlock {
    tag: RegisterTag,
    /// 見出し行（比較表示時のみ）
    header_y: Option<u16>,
    /// 値情報行（比較表示時のみ）
    info_y: Option<u16>,
    /// 2進文字列行
    binary_y: u16,
}

/// ビットグリッドのセル配置
///
/// 描画とマウスヒットテストの両方がこの計算を唯一の基準にする。
/// セルはMSB先頭・1行16ビット・8ビットごとに区切り。
#[derive(Debug, Clone, Default)]
pub struct GridLayout {
    cells: Vec<(BitKey, Rect)>,
    blocks: Vec<RegisterBlock>,
    legend_y: Option<u16>,
    region: Rect,
}

impl GridLayout {
    /// レジスタ構成と描画領域からセル矩形を計算する
    pub fn compute(pair: &RegisterPair, area: Rect) -> Self {
        let mut cells = Vec::new();
        let mut blocks = Vec::new();
        let bottom = area.y.saturating_add(area.height);
        let right = area.x.saturating_add(area.width);
        let dual = pair.has_comparison();
        let mut y = area.y;

        // 凡例行（比較表示時のみ）
        let legend_y = if dual {
            let legend = y;
            y = y.saturating_add(2);
            Some(legend)
        } else {
            None
        };

        for tag in pair.tags() {
            let Some(register) = pair.get(tag) else {
                continue;
            };
            let width = register.bit_width();

            let (header_y, info_y) = if dual {
                let header = y;
                y = y.saturating_add(2);
                (Some(header), Some(header + 1))
            } else {
                (None, None)
            };

            let rows = width.div_ceil(BITS_PER_ROW);
            for row in 0..rows {
                let cell_y = y + 1;
                let msb = width - 1 - row * BITS_PER_ROW;
                let row_bits = (msb + 1).min(BITS_PER_ROW);
                let mut x = area.x;
                for col in 0..row_bits {
                    if col > 0 && col % GROUP_SIZE == 0 {
                        x += GROUP_GAP;
                    }
                    let rect = Rect::new(x, cell_y, CELL_WIDTH, 1);
                    // 領域からはみ出すセルは配置しない（描画もヒットもしない）
                    if cell_y < bottom && x + CELL_WIDTH <= right {
                        cells.push((
                            BitKey {
                                register: tag,
                                position: msb - col,
                            },
                            rect,
                        ));
                    }
                    x += CELL_STRIDE;
                }
                y = y.saturating_add(2);
                if row + 1 < rows {
                    y = y.saturating_add(1);
                }
            }

            y = y.saturating_add(1);
            let binary_y = y;
            y = y.saturating_add(1);
            blocks.push(RegisterBlock {
                tag,
                header_y,
                info_y,
                binary_y,
            });
            if dual && tag == RegisterTag::Primary {
                y = y.saturating_add(1);
            }
        }

        let height = y.saturating_sub(area.y).min(area.height);
        Self {
            cells,
            blocks,
            legend_y,
            region: Rect::new(area.x, area.y, area.width, height),
        }
    }

    /// 画面座標からセルのアドレスキーを引く
    pub fn key_at(&self, position: Position) -> Option<BitKey> {
        self.cells
            .iter()
            .find(|(_, rect)| rect.contains(position))
            .map(|(key, _)| *key)
    }

    /// グリッド全体の領域
    pub fn region(&self) -> Rect {
        self.region
    }
}

/// ビットグリッドウィジェット
///
/// 再パース後にフルで描き直され、トグルや選択の変化はモデル経由で
/// 次フレームに反映される（パース要求は再発行しない）。
pub struct BitGrid<'a> {
    pair: &'a RegisterPair,
    selection: Option<(RegisterTag, &'a BTreeSet<u16>)>,
}

impl<'a> BitGrid<'a> {
    pub fn new(pair: &'a RegisterPair) -> Self {
        Self {
            pair,
            selection: None,
        }
    }

    pub fn selection(mut self, selection: Option<(RegisterTag, &'a BTreeSet<u16>)>) -> Self {
        self.selection = selection;
        self
    }

    fn is_selected(&self, key: BitKey) -> bool {
        matches!(
            self.selection,
            Some((tag, positions)) if tag == key.register && positions.contains(&key.position)
        )
    }
}

impl Widget for BitGrid<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let layout = GridLayout::compute(self.pair, area);
        let bottom = area.y + area.height;
        let max_width = area.width as usize;

        if let Some(legend_y) = layout.legend_y {
            if legend_y < bottom {
                buf.set_stringn(
                    area.x,
                    legend_y,
                    "■ Different bits highlighted",
                    max_width,
                    Style::default().fg(Colors::BIT_DIFF_BG),
                );
            }
        }

        for block in &layout.blocks {
            let Some(register) = self.pair.get(block.tag) else {
                continue;
            };
            if let Some(header_y) = block.header_y {
                if header_y < bottom {
                    buf.set_stringn(
                        area.x,
                        header_y,
                        block.tag.label(),
                        max_width,
                        Style::default()
                            .fg(Colors::HEADER)
                            .add_modifier(Modifier::BOLD),
                    );
                }
            }
            if let Some(info_y) = block.info_y {
                if info_y < bottom {
                    let info =
                        format!("{} ({})", register.formats().hex, register.parsed_value());
                    buf.set_stringn(area.x, info_y, &info, max_width, Style::default());
                }
            }
            if block.binary_y < bottom {
                let label = if self.pair.has_comparison() {
                    match block.tag {
                        RegisterTag::Primary => "Binary 1: ",
                        RegisterTag::Comparison => "Binary 2: ",
                    }
                } else {
                    "Binary: "
                };
                buf.set_stringn(
                    area.x,
                    block.binary_y,
                    &format!("{label}{}", register.binary()),
                    max_width,
                    Style::default(),
                );
            }
        }

        for &(key, rect) in &layout.cells {
            let Some(register) = self.pair.get(key.register) else {
                continue;
            };
            let Some(bit) = register.bit(key.position) else {
                continue;
            };

            // ビット番号ラベル（セルの1行上）
            if rect.y > area.y {
                buf.set_string(
                    rect.x,
                    rect.y - 1,
                    format!("{:>2}", key.position),
                    Style::default().fg(Colors::BIT_LABEL),
                );
            }

            let mut style = if bit.set {
                Style::default()
                    .fg(Colors::BIT_SET)
                    .bg(Colors::BIT_SET_BG)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Colors::BIT_UNSET).bg(Colors::BIT_UNSET_BG)
            };
            // 比較で食い違うビットは両側とも強調
            if self.pair.differs_at(key.position) {
                style = style.bg(Colors::BIT_DIFF_BG);
            }
            // 選択中のハイライトが最優先
            if self.is_selected(key) {
                style = style.bg(Colors::SELECTION_BG).fg(Colors::SELECTION_FG);
            }

            buf.set_string(rect.x, rect.y, format!("{:>2}", bit.value), style);
        }
    }
}
