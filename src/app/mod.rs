mod select;
mod state;

pub use select::{DRAG_DEBOUNCE, Selection, SelectionSummary};
pub use state::App;

use crossterm::event::KeyCode;

/// 操作モード（ドラッグ選択 / ビット編集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractMode {
    #[default]
    Selection,
    Edit,
}

impl InteractMode {
    pub fn label(self) -> &'static str {
        match self {
            InteractMode::Selection => "Selection",
            InteractMode::Edit => "Edit",
        }
    }

    /// ステータスバーに出すジェスチャのヒント
    pub fn hint(self) -> &'static str {
        match self {
            InteractMode::Selection => "Click and drag to select bits",
            InteractMode::Edit => "Click bits to toggle values",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            InteractMode::Selection => InteractMode::Edit,
            InteractMode::Edit => InteractMode::Selection,
        }
    }
}

/// 入力フォームのフォーカス対象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    Value,
    Compare,
    Format,
    Width,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            FormField::Value => FormField::Compare,
            FormField::Compare => FormField::Format,
            FormField::Format => FormField::Width,
            FormField::Width => FormField::Value,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FormField::Value => FormField::Width,
            FormField::Compare => FormField::Value,
            FormField::Format => FormField::Compare,
            FormField::Width => FormField::Format,
        }
    }
}

/// アプリケーションアクション
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// フォーム送信（パースサービス呼び出し）
    Submit,

    // フォーム
    FocusNext,
    FocusPrev,
    InputChar(char),
    Backspace,
    ClearField,
    /// フォーカス中のセレクタを巡回
    CycleLeft,
    CycleRight,

    // モード・選択
    ToggleInteractMode,
    CopySelection,
    Cancel,

    None,
}

/// キー修飾子
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyMod {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Action {
    /// キーコードからアクションに変換
    pub fn from_key(key: KeyCode, mods: KeyMod) -> Self {
        let KeyMod { ctrl, shift, alt } = mods;

        match (key, ctrl, alt, shift) {
            // 終了: C-q / C-c
            (KeyCode::Char('q'), true, false, false) => Action::Quit,
            (KeyCode::Char('c'), true, false, false) => Action::Quit,

            // C-g / Esc: キャンセル（選択解除）
            (KeyCode::Char('g'), true, false, false) => Action::Cancel,
            (KeyCode::Esc, _, _, _) => Action::Cancel,

            // 送信
            (KeyCode::Enter, _, _, _) => Action::Submit,

            // フォーカス移動
            (KeyCode::Tab, false, false, false) => Action::FocusNext,
            (KeyCode::BackTab, _, _, _) => Action::FocusPrev,
            (KeyCode::Down, false, false, false) => Action::FocusNext,
            (KeyCode::Up, false, false, false) => Action::FocusPrev,

            // セレクタ巡回
            (KeyCode::Left, false, false, false) => Action::CycleLeft,
            (KeyCode::Right, false, false, false) => Action::CycleRight,

            // 編集
            (KeyCode::Backspace, false, false, _) => Action::Backspace,
            // C-k: フィールドをクリア
            (KeyCode::Char('k'), true, false, false) => Action::ClearField,

            // モード切替: F2
            (KeyCode::F(2), _, _, _) => Action::ToggleInteractMode,

            // M-w: 選択値をコピー
            (KeyCode::Char('w'), false, true, false) => Action::CopySelection,

            // 修飾なしの文字はフィールド入力
            (KeyCode::Char(ch), false, false, _) => Action::InputChar(ch),

            _ => Action::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_chars_become_input() {
        let action = Action::from_key(KeyCode::Char('a'), KeyMod::default());
        assert_eq!(action, Action::InputChar('a'));
        // Shift付き（大文字）も入力
        let action = Action::from_key(
            KeyCode::Char('A'),
            KeyMod {
                shift: true,
                ..Default::default()
            },
        );
        assert_eq!(action, Action::InputChar('A'));
    }

    #[test]
    fn control_keys_do_not_leak_into_input() {
        let ctrl = KeyMod {
            ctrl: true,
            ..Default::default()
        };
        assert_eq!(Action::from_key(KeyCode::Char('q'), ctrl), Action::Quit);
        assert_eq!(Action::from_key(KeyCode::Char('k'), ctrl), Action::ClearField);
        assert_eq!(Action::from_key(KeyCode::Char('g'), ctrl), Action::Cancel);
    }

    #[test]
    fn escape_cancels_and_f2_toggles_mode() {
        assert_eq!(
            Action::from_key(KeyCode::Esc, KeyMod::default()),
            Action::Cancel
        );
        assert_eq!(
            Action::from_key(KeyCode::F(2), KeyMod::default()),
            Action::ToggleInteractMode
        );
    }

    #[test]
    fn form_field_cycle_is_closed() {
        let mut field = FormField::Value;
        for _ in 0..4 {
            field = field.next();
        }
        assert_eq!(field, FormField::Value);
        assert_eq!(FormField::Value.prev(), FormField::Width);
    }
}
