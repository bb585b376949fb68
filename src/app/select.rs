use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::register::{BitKey, Register, RegisterTag};

/// クリックとドラッグを区別するデバウンス時間
pub const DRAG_DEBOUNCE: Duration = Duration::from_millis(150);

/// ドラッグ選択の進行状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// 押下直後。デバウンス満了までクリックかドラッグか未確定
    Pending { key: BitKey, deadline: Instant },
    /// ドラッグ確定。anchorが選択範囲の起点
    Active { anchor: BitKey },
}

/// ビットセル上のドラッグ選択を追跡する状態機械
///
/// 遷移は idle → pending → active → idle。満了前の解放はクリックに収束し
/// 選択は発生しない。activeの間はアンカーと進入セルの間の連続範囲が
/// 選択集合になる（MSB方向・LSB方向どちらのドラッグでも同じ）。
#[derive(Debug, Clone)]
pub struct Selection {
    phase: Phase,
    selected: BTreeSet<u16>,
    register: Option<RegisterTag>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

impl Selection {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            selected: BTreeSet::new(),
            register: None,
        }
    }

    /// セル押下。デバウンスを開始する
    pub fn on_press(&mut self, key: BitKey, now: Instant) {
        self.phase = Phase::Pending {
            key,
            deadline: now + DRAG_DEBOUNCE,
        };
    }

    /// デバウンス満了チェック。満了していればドラッグ確定しアンカーを選択
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Phase::Pending { key, deadline } = self.phase {
            if now >= deadline {
                self.phase = Phase::Active { anchor: key };
                self.selected.clear();
                self.selected.insert(key.position);
                self.register = Some(key.register);
                return true;
            }
        }
        false
    }

    /// ドラッグ中のセル進入。アンカーと同じレジスタ内の連続範囲に張り直す
    pub fn on_drag(&mut self, key: BitKey, now: Instant) -> bool {
        self.tick(now);
        let Phase::Active { anchor } = self.phase else {
            return false;
        };
        // レジスタをまたぐ選択は無効
        if key.register != anchor.register {
            return false;
        }
        let (lo, hi) = if anchor.position <= key.position {
            (anchor.position, key.position)
        } else {
            (key.position, anchor.position)
        };
        let range: BTreeSet<u16> = (lo..=hi).collect();
        if range != self.selected {
            self.selected = range;
            true
        } else {
            false
        }
    }

    /// ポインタ解放。pendingのままならクリックに収束し選択を消す
    pub fn on_release(&mut self) -> bool {
        match self.phase {
            Phase::Pending { .. } => {
                self.phase = Phase::Idle;
                self.clear()
            }
            Phase::Active { .. } => {
                // ドラッグ完了。選択は表示し続ける
                self.phase = Phase::Idle;
                false
            }
            Phase::Idle => false,
        }
    }

    /// 選択の全消去（Escape・範囲外クリック・モード切替）
    pub fn clear(&mut self) -> bool {
        self.phase = Phase::Idle;
        self.register = None;
        if self.selected.is_empty() {
            false
        } else {
            self.selected.clear();
            true
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn positions(&self) -> &BTreeSet<u16> {
        &self.selected
    }

    /// 選択が属するレジスタ
    pub fn register(&self) -> Option<RegisterTag> {
        self.register
    }

    /// 選択範囲の読み出し。空選択ならNone
    pub fn summary(&self, register: &Register) -> Option<SelectionSummary> {
        SelectionSummary::from_positions(register, self.register?, &self.selected)
    }
}

/// 選択範囲から読み出した部分値とその表現
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    pub register: RegisterTag,
    /// "Bit N" または "Bits MAX - MIN"
    pub range_text: String,
    pub bit_count: usize,
    /// 選択ビットをMSB先頭で並べた2進文字列
    pub binary: String,
    /// 2進文字列をビット0起点の独立した符号なし数として解釈した値
    pub value: u64,
    pub hex: String,
    pub dec: String,
    pub oct: String,
}

impl SelectionSummary {
    /// 選択位置集合から部分値を計算する
    ///
    /// 元の値からのマスク抽出ではなく、選択ビット列そのものを新しい数として
    /// 読む。位置がレジスタ幅を超える場合はNone。
    pub fn from_positions(
        register: &Register,
        tag: RegisterTag,
        positions: &BTreeSet<u16>,
    ) -> Option<Self> {
        if positions.is_empty() {
            return None;
        }

        // MSB先頭で2進文字列を構成
        let mut binary = String::with_capacity(positions.len());
        for &position in positions.iter().rev() {
            binary.push(register.bit(position)?.value);
        }
        let value = binary
            .chars()
            .fold(0u64, |acc, c| (acc << 1) | u64::from(c == '1'));

        let min = *positions.first()?;
        let max = *positions.last()?;
        let range_text = if min == max {
            format!("Bit {min}")
        } else {
            format!("Bits {max} - {min}")
        };

        Some(Self {
            register: tag,
            range_text,
            bit_count: positions.len(),
            binary,
            value,
            hex: format!("0x{value:X}"),
            dec: value.to_string(),
            oct: format!("0o{value:o}"),
        })
    }
}
