use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use super::{Action, FormField, InteractMode, KeyMod, Selection, SelectionSummary};
use crate::clipboard;
use crate::parse::{NumberFormat, ParseRequest, ParseResponse, ParseService, RegisterParser};
use crate::register::{BitKey, Formats, RegisterPair, RegisterTag, SUPPORTED_WIDTHS};
use crate::ui::{BitGrid, Colors, GridLayout};

/// 入力欄の最大文字数
const MAX_INPUT_LEN: usize = 24;

/// 表示状態
#[derive(Debug, Clone)]
enum DisplayState {
    /// 未送信
    Empty,
    /// 解析失敗（メッセージのみ表示、各パネルはクリア）
    Failed { error: String },
    /// 解析成功
    Loaded(ResultView),
}

/// 解析成功後の表示内容
#[derive(Debug, Clone)]
struct ResultView {
    /// 成功メッセージ
    message: String,
    /// 応答のフォーマットパネル（グリッド欠損時の代替表示用）
    formats: Option<Formats>,
    /// ビットグリッド。応答データが不整合なら代わりに出すエラー文
    grid: Result<RegisterPair, String>,
    /// 比較値の解析失敗時の注記
    comparison_note: Option<String>,
}

/// 直近フレームのヒットテスト情報
#[derive(Debug, Clone, Default)]
struct ScreenLayout {
    /// ビット表示ブロック全体（モード行からサマリまで）
    bit_display: Rect,
    mode_selection: Rect,
    mode_edit: Rect,
    grid: Option<GridLayout>,
}

/// アプリケーション状態
pub struct App {
    /// 主値入力欄
    value_input: String,
    /// 比較値入力欄
    compare_input: String,
    /// 入力の基数
    format: NumberFormat,
    /// ビット幅
    bit_width: u16,
    /// フォームのフォーカス
    focus: FormField,
    /// パース協調サービス
    service: Box<dyn ParseService>,
    /// 表示状態
    display: DisplayState,
    /// サービス呼び出し失敗の表示（直前の結果は保持する）
    net_error: Option<String>,
    /// 操作モード。再パースしても切り替えるまで維持される
    mode: InteractMode,
    /// ドラッグ選択状態
    selection: Selection,
    /// 直近フレームのレイアウト
    layout: ScreenLayout,
    /// ステータスメッセージ
    status_message: Option<String>,
    /// 終了フラグ
    should_quit: bool,
}

impl App {
    /// 新しいアプリケーションを作成
    pub fn new() -> Self {
        Self::with_service(Box::new(RegisterParser))
    }

    /// パースサービスを差し替えて作成
    pub fn with_service(service: Box<dyn ParseService>) -> Self {
        Self {
            value_input: String::new(),
            compare_input: String::new(),
            format: NumberFormat::Hex,
            bit_width: 32,
            focus: FormField::Value,
            service,
            display: DisplayState::Empty,
            net_error: None,
            mode: InteractMode::Selection,
            selection: Selection::new(),
            layout: ScreenLayout::default(),
            status_message: None,
            should_quit: false,
        }
    }

    /// 起動引数からフォームを埋める
    pub fn prefill(
        &mut self,
        value: Option<String>,
        compare: Option<String>,
        format: NumberFormat,
        bit_width: u16,
    ) {
        self.format = format;
        self.bit_width = bit_width;
        if let Some(compare) = compare {
            self.compare_input = compare;
        }
        if let Some(value) = value {
            self.value_input = value;
            self.submit();
        }
    }

    /// 終了すべきかどうか
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// フォーカス中のテキスト入力欄
    fn focused_input_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            FormField::Value => Some(&mut self.value_input),
            FormField::Compare => Some(&mut self.compare_input),
            FormField::Format | FormField::Width => None,
        }
    }

    /// 文字入力
    fn input_char(&mut self, ch: char) {
        if ch.is_control() {
            return;
        }
        if let Some(input) = self.focused_input_mut() {
            if input.chars().count() < MAX_INPUT_LEN {
                input.push(ch);
            }
        }
    }

    /// ペースト内容をフォーカス中の入力欄へ取り込む
    fn paste(&mut self, content: &str) {
        let cleaned: String = content.chars().filter(|c| !c.is_control()).collect();
        if let Some(input) = self.focused_input_mut() {
            input.push_str(&cleaned);
            if input.chars().count() > MAX_INPUT_LEN {
                *input = input.chars().take(MAX_INPUT_LEN).collect();
            }
        }
    }

    /// フォーカス中のセレクタを巡回する
    fn cycle(&mut self, forward: bool) {
        match self.focus {
            FormField::Format => {
                self.format = if forward {
                    self.format.next()
                } else {
                    self.format.prev()
                };
                self.auto_resubmit();
            }
            FormField::Width => {
                let len = SUPPORTED_WIDTHS.len();
                let idx = SUPPORTED_WIDTHS
                    .iter()
                    .position(|&w| w == self.bit_width)
                    .unwrap_or(0);
                let idx = if forward {
                    (idx + 1) % len
                } else {
                    (idx + len - 1) % len
                };
                self.bit_width = SUPPORTED_WIDTHS[idx];
                self.auto_resubmit();
            }
            FormField::Value | FormField::Compare => {}
        }
    }

    /// 基数・ビット幅の変更時、値欄が空でなければ既存の内容のまま再送信
    fn auto_resubmit(&mut self) {
        if !self.value_input.trim().is_empty() {
            self.submit();
        }
    }

    /// フォームを送信してパースサービスを呼ぶ
    pub fn submit(&mut self) {
        let request = ParseRequest {
            value: self.value_input.clone(),
            compare_value: self.compare_input.clone(),
            format: self.format,
            bit_width: self.bit_width.to_string(),
        };
        log::debug!(
            "parse request: {:?} ({} {}-bit)",
            request.value,
            request.format.name(),
            request.bit_width
        );
        match self.service.parse(&request) {
            Ok(response) => self.apply_response(response),
            Err(e) => {
                log::warn!("parse service unreachable: {e}");
                // 直前の表示には手を付けない
                self.net_error = Some("Network Error: Could not connect to server.".to_string());
            }
        }
    }

    /// 応答を表示状態に反映する
    fn apply_response(&mut self, response: ParseResponse) {
        self.net_error = None;
        // 表示の更新で選択は毎回作り直す
        self.selection.clear();

        if !response.success {
            let error = response
                .error
                .unwrap_or_else(|| "Unknown error".to_string());
            self.display = DisplayState::Failed { error };
            return;
        }

        // 比較値は失敗しても主値の表示を巻き込まない
        let mut comparison_note = None;
        let comparison = match response.comparison.as_ref() {
            None => None,
            Some(result) => {
                if let Some(error) = &result.error {
                    comparison_note = Some(error.clone());
                    None
                } else {
                    match result.to_register() {
                        Some(Ok(register)) => Some(register),
                        Some(Err(e)) => {
                            comparison_note = Some(format!("Invalid comparison value: {e}"));
                            None
                        }
                        None => None,
                    }
                }
            }
        };

        let grid = match response.primary_register() {
            Ok(primary) => Ok(RegisterPair::new(primary, comparison)),
            Err(e) => {
                log::warn!("malformed parse response: {e}");
                Err("Error: Missing bit data".to_string())
            }
        };

        let message = match response.parsed_value {
            Some(value) => format!("Parsing successful! Parsed value: {value}"),
            None => "Parsing successful!".to_string(),
        };
        self.display = DisplayState::Loaded(ResultView {
            message,
            formats: response.formats,
            grid,
            comparison_note,
        });
    }

    /// モード切替。進行中・確定済みの選択はどちらも消す
    fn set_mode(&mut self, mode: InteractMode) {
        if self.mode != mode {
            self.mode = mode;
            self.selection.clear();
            self.status_message = Some(format!("{} mode", mode.label()));
        }
    }

    /// ビットを反転し、値・表示・入力欄へ反映する
    fn toggle_bit_at(&mut self, key: BitKey) {
        let DisplayState::Loaded(view) = &mut self.display else {
            return;
        };
        let Ok(pair) = view.grid.as_mut() else {
            return;
        };
        let Some(register) = pair.get_mut(key.register) else {
            return;
        };
        if let Err(e) = register.toggle_bit(key.position) {
            self.status_message = Some(e.to_string());
            return;
        }
        log::debug!("toggled bit {} of {:?}", key.position, key.register);

        // 新しい値を現在の基数で入力欄と上部パネルへ書き戻す
        let formatted = self.format.pick(register.formats()).to_string();
        let new_formats = register.formats().clone();
        if key.register == RegisterTag::Primary {
            view.formats = Some(new_formats);
        }
        match key.register {
            RegisterTag::Primary => self.value_input = formatted,
            RegisterTag::Comparison => self.compare_input = formatted,
        }
    }

    /// 選択範囲の読み出し（表示中のレジスタから）
    fn selection_summary(&self) -> Option<SelectionSummary> {
        let DisplayState::Loaded(view) = &self.display else {
            return None;
        };
        let pair = view.grid.as_ref().ok()?;
        let register = pair.get(self.selection.register()?)?;
        self.selection.summary(register)
    }

    /// 選択中の部分値（HEX表現）をクリップボードへコピー
    fn copy_selection(&mut self) {
        let Some(summary) = self.selection_summary() else {
            self.status_message = Some("No selection".to_string());
            return;
        };
        match clipboard::copy_to_all(&summary.hex) {
            Ok(()) => self.status_message = Some(format!("Copied {}", summary.hex)),
            Err(_) => self.status_message = Some("Clipboard unavailable".to_string()),
        }
    }

    /// アクションを実行
    pub fn execute(&mut self, action: Action) {
        self.status_message = None;

        match action {
            Action::Quit => self.should_quit = true,
            Action::Submit => self.submit(),
            Action::FocusNext => self.focus = self.focus.next(),
            Action::FocusPrev => self.focus = self.focus.prev(),
            Action::InputChar(ch) => self.input_char(ch),
            Action::Backspace => {
                if let Some(input) = self.focused_input_mut() {
                    input.pop();
                }
            }
            Action::ClearField => {
                if let Some(input) = self.focused_input_mut() {
                    input.clear();
                }
            }
            Action::CycleLeft => self.cycle(false),
            Action::CycleRight => self.cycle(true),
            Action::ToggleInteractMode => self.set_mode(self.mode.toggled()),
            Action::CopySelection => self.copy_selection(),
            Action::Cancel => {
                self.selection.clear();
            }
            Action::None => {}
        }
    }

    /// マウスイベントを処理
    fn on_mouse(&mut self, mouse: MouseEvent) {
        let position = Position::new(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if self.layout.mode_selection.contains(position) {
                    self.set_mode(InteractMode::Selection);
                    return;
                }
                if self.layout.mode_edit.contains(position) {
                    self.set_mode(InteractMode::Edit);
                    return;
                }
                if let Some(key) = self.key_at(position) {
                    match self.mode {
                        InteractMode::Selection => self.selection.on_press(key, Instant::now()),
                        InteractMode::Edit => self.toggle_bit_at(key),
                    }
                } else if !self.layout.bit_display.contains(position) {
                    // ビット表示の外側をクリック → 選択解除
                    self.selection.clear();
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if self.mode == InteractMode::Selection {
                    if let Some(key) = self.key_at(position) {
                        self.selection.on_drag(key, Instant::now());
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if self.mode == InteractMode::Selection {
                    self.selection.on_release();
                }
            }
            _ => {}
        }
    }

    fn key_at(&self, position: Position) -> Option<BitKey> {
        self.layout.grid.as_ref()?.key_at(position)
    }

    /// イベントを処理
    pub fn handle_event(&mut self) -> Result<()> {
        // デバウンス満了の監視（イベントの有無に関わらず進める）
        self.selection.tick(Instant::now());

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        return Ok(());
                    }
                    let mods = KeyMod {
                        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
                        shift: key.modifiers.contains(KeyModifiers::SHIFT),
                        alt: key.modifiers.contains(KeyModifiers::ALT),
                    };
                    let action = Action::from_key(key.code, mods);
                    if action != Action::None {
                        self.execute(action);
                    }
                }
                Event::Mouse(mouse) => self.on_mouse(mouse),
                // ペースト（Bracketed Paste Mode）
                Event::Paste(content) => self.paste(&content),
                _ => {}
            }
        }

        self.selection.tick(Instant::now());
        Ok(())
    }

    /// UIを描画
    pub fn draw(&mut self, frame: &mut Frame) {
        let size = frame.area();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // フォーム
                Constraint::Length(1), // メッセージ
                Constraint::Min(1),    // 結果
                Constraint::Length(1), // ステータス
            ])
            .split(size);

        self.layout = ScreenLayout::default();
        self.draw_form(frame, layout[0]);
        self.draw_message(frame, layout[1]);
        self.draw_results(frame, layout[2]);
        self.draw_status(frame, layout[3]);
    }

    /// 入力フォームを描画
    fn draw_form(&self, frame: &mut Frame, area: Rect) {
        let value_line = self.field_line(
            "Value:   ",
            &self.value_input,
            self.format.placeholder(),
            self.focus == FormField::Value,
        );
        let compare_line = self.field_line(
            "Compare: ",
            &self.compare_input,
            "(optional comparison value)",
            self.focus == FormField::Compare,
        );

        let selector_line = Line::from(vec![
            Span::raw("  Format:  "),
            Span::styled(
                format!("‹ {} ›", self.format.name()),
                self.selector_style(FormField::Format),
            ),
            Span::raw("   Width: "),
            Span::styled(
                format!("‹ {} ›", self.bit_width),
                self.selector_style(FormField::Width),
            ),
        ]);
        let help_line = Line::styled(
            "  Enter: parse | Tab: field | Left/Right: change | F2: mode | M-w: copy | C-q: quit",
            Style::default().fg(Colors::PLACEHOLDER),
        );

        let form = Paragraph::new(vec![value_line, compare_line, selector_line, help_line]);
        frame.render_widget(form, area);
    }

    fn field_line(
        &self,
        label: &str,
        content: &str,
        placeholder: &str,
        focused: bool,
    ) -> Line<'static> {
        let marker = if focused { "▸" } else { " " };
        let mut spans = vec![Span::raw(format!("{marker} {label}"))];
        if content.is_empty() {
            spans.push(Span::styled(
                placeholder.to_string(),
                Style::default().fg(Colors::PLACEHOLDER),
            ));
        } else {
            let style = if focused {
                Style::default().bg(Colors::FOCUS_BG)
            } else {
                Style::default()
            };
            spans.push(Span::styled(content.to_string(), style));
        }
        if focused {
            spans.push(Span::raw("_"));
        }
        Line::from(spans)
    }

    fn selector_style(&self, field: FormField) -> Style {
        if self.focus == field {
            Style::default()
                .bg(Colors::FOCUS_BG)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    }

    /// メッセージ行を描画
    fn draw_message(&self, frame: &mut Frame, area: Rect) {
        let line = if let Some(error) = &self.net_error {
            Line::styled(
                format!(" {error}"),
                Style::default()
                    .fg(Colors::ERROR)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            match &self.display {
                DisplayState::Empty => Line::styled(
                    " Enter a value and press Enter".to_string(),
                    Style::default().fg(Colors::PLACEHOLDER),
                ),
                DisplayState::Failed { error } => Line::styled(
                    format!(" Error: {error}"),
                    Style::default()
                        .fg(Colors::ERROR)
                        .add_modifier(Modifier::BOLD),
                ),
                DisplayState::Loaded(view) => Line::styled(
                    format!(" {}", view.message),
                    Style::default().fg(Colors::SUCCESS),
                ),
            }
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    /// 結果（フォーマットパネル・モード行・グリッド・サマリ）を描画
    fn draw_results(&mut self, frame: &mut Frame, area: Rect) {
        let DisplayState::Loaded(view) = &self.display else {
            return;
        };
        if area.height < 5 {
            return;
        }
        let bottom = area.y + area.height;
        let mut y = area.y;

        // フォーマットパネル
        let formats = match view.grid.as_ref() {
            Ok(pair) => Some(pair.primary().formats().clone()),
            Err(_) => view.formats.clone(),
        };
        if let Some(formats) = formats {
            let line = format!(
                " Hex: {} | Dec: {} | Oct: {}",
                formats.hex, formats.dec, formats.oct
            );
            frame.render_widget(
                Paragraph::new(line),
                Rect::new(area.x, y, area.width, 1),
            );
        }
        y += 2;

        // モード切替行
        let selection_label = if self.mode == InteractMode::Selection {
            "(*) Selection mode"
        } else {
            "( ) Selection mode"
        };
        let edit_label = if self.mode == InteractMode::Edit {
            "(*) Edit mode"
        } else {
            "( ) Edit mode"
        };
        let mode_line = Line::from(vec![
            Span::raw(" "),
            Span::styled(
                selection_label,
                self.mode_style(InteractMode::Selection),
            ),
            Span::raw("   "),
            Span::styled(edit_label, self.mode_style(InteractMode::Edit)),
            Span::styled(
                format!("    {}", self.mode.hint()),
                Style::default().fg(Colors::PLACEHOLDER),
            ),
        ]);
        frame.render_widget(
            Paragraph::new(mode_line),
            Rect::new(area.x, y, area.width, 1),
        );
        self.layout.mode_selection =
            Rect::new(area.x + 1, y, selection_label.len() as u16, 1);
        self.layout.mode_edit = Rect::new(
            area.x + 1 + selection_label.len() as u16 + 3,
            y,
            edit_label.len() as u16,
            1,
        );
        let bit_display_top = y;
        y += 2;

        // ビットグリッドとサマリ
        match view.grid.as_ref() {
            Ok(pair) => {
                let grid_area = Rect::new(
                    area.x + 1,
                    y,
                    area.width.saturating_sub(1),
                    bottom.saturating_sub(y).saturating_sub(2),
                );
                let grid_layout = GridLayout::compute(pair, grid_area);
                let selection = self
                    .selection
                    .register()
                    .map(|tag| (tag, self.selection.positions()));
                frame.render_widget(BitGrid::new(pair).selection(selection), grid_area);

                let summary_area = Rect::new(
                    area.x,
                    grid_layout.region().bottom(),
                    area.width,
                    bottom.saturating_sub(grid_layout.region().bottom()).min(2),
                );
                self.draw_summary(frame, summary_area, pair, view.comparison_note.as_deref());
                self.layout.grid = Some(grid_layout);
            }
            Err(fragment) => {
                frame.render_widget(
                    Paragraph::new(Line::styled(
                        format!(" {fragment}"),
                        Style::default().fg(Colors::ERROR),
                    )),
                    Rect::new(area.x, y, area.width, 1),
                );
            }
        }
        self.layout.bit_display = Rect::new(
            area.x,
            bit_display_top,
            area.width,
            bottom.saturating_sub(bit_display_top),
        );
    }

    fn mode_style(&self, mode: InteractMode) -> Style {
        if self.mode == mode {
            Style::default()
                .fg(Colors::HEADER)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    }

    /// 選択サマリ（選択がなければ比較値の注記）を描画
    fn draw_summary(
        &self,
        frame: &mut Frame,
        area: Rect,
        pair: &RegisterPair,
        comparison_note: Option<&str>,
    ) {
        if area.height == 0 {
            return;
        }
        let summary = self
            .selection
            .register()
            .and_then(|tag| pair.get(tag))
            .and_then(|register| self.selection.summary(register));

        if let Some(summary) = summary {
            let plural = if summary.bit_count == 1 { "" } else { "s" };
            let header = format!(
                " {} - Selected {} ({} bit{plural})",
                summary.register.label(),
                summary.range_text,
                summary.bit_count,
            );
            frame.render_widget(
                Paragraph::new(Line::styled(
                    header,
                    Style::default()
                        .fg(Colors::NOTE)
                        .add_modifier(Modifier::BOLD),
                )),
                Rect::new(area.x, area.y, area.width, 1),
            );
            if area.height > 1 {
                let detail = format!(
                    "   Binary: {} | Hex: {} | Dec: {} | Oct: {}",
                    summary.binary, summary.hex, summary.dec, summary.oct
                );
                frame.render_widget(
                    Paragraph::new(detail),
                    Rect::new(area.x, area.y + 1, area.width, 1),
                );
            }
        } else if let Some(note) = comparison_note {
            frame.render_widget(
                Paragraph::new(Line::styled(
                    format!(" {note}"),
                    Style::default().fg(Colors::NOTE),
                )),
                Rect::new(area.x, area.y, area.width, 1),
            );
        }
    }

    /// ステータスバーを描画
    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let trailing = self
            .status_message
            .clone()
            .unwrap_or_else(|| self.mode.hint().to_string());
        let status = format!(
            " regbits | {}-bit {} | {} mode | {}",
            self.bit_width,
            self.format.name(),
            self.mode.label(),
            trailing,
        );
        let status_widget = Paragraph::new(status)
            .style(Style::default().bg(Colors::STATUS_BG).fg(Colors::STATUS_FG));
        frame.render_widget(status_widget, area);
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::DRAG_DEBOUNCE;
    use crate::parse::ServiceError;

    struct DownService;

    impl ParseService for DownService {
        fn parse(&self, _request: &ParseRequest) -> Result<ParseResponse, ServiceError> {
            Err(ServiceError::Unreachable("connection refused".to_string()))
        }
    }

    struct MissingBitsService;

    impl ParseService for MissingBitsService {
        fn parse(&self, _request: &ParseRequest) -> Result<ParseResponse, ServiceError> {
            Ok(ParseResponse {
                success: true,
                parsed_value: Some(1),
                ..Default::default()
            })
        }
    }

    fn loaded_app(value: &str, compare: &str, format: NumberFormat, width: u16) -> App {
        let mut app = App::new();
        app.value_input = value.to_string();
        app.compare_input = compare.to_string();
        app.format = format;
        app.bit_width = width;
        app.submit();
        app
    }

    fn pair(app: &App) -> &RegisterPair {
        match &app.display {
            DisplayState::Loaded(view) => view.grid.as_ref().expect("grid error"),
            _ => panic!("not loaded"),
        }
    }

    fn select_range(app: &mut App, register: RegisterTag, from: u16, to: u16) {
        let now = Instant::now();
        app.selection.on_press(
            BitKey {
                register,
                position: from,
            },
            now,
        );
        app.selection.tick(now + DRAG_DEBOUNCE);
        app.selection.on_drag(
            BitKey {
                register,
                position: to,
            },
            now + DRAG_DEBOUNCE,
        );
    }

    #[test]
    fn submit_loads_register_pair() {
        let app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        assert_eq!(pair(&app).primary().parsed_value(), 0xCA);
        match &app.display {
            DisplayState::Loaded(view) => {
                assert!(view.message.contains("202"), "{}", view.message);
            }
            _ => panic!("not loaded"),
        }
    }

    #[test]
    fn decode_failure_clears_panels() {
        let app = loaded_app("0x1FF", "", NumberFormat::Hex, 8);
        match &app.display {
            DisplayState::Failed { error } => {
                assert!(error.contains("exceeds maximum"), "{error}");
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn toggle_updates_register_and_value_field() {
        let mut app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        let key = BitKey {
            register: RegisterTag::Primary,
            position: 0,
        };
        app.toggle_bit_at(key);
        assert_eq!(pair(&app).primary().parsed_value(), 0xCB);
        assert_eq!(app.value_input, "0xCB");
        // 2回目のトグルで元に戻る
        app.toggle_bit_at(key);
        assert_eq!(pair(&app).primary().parsed_value(), 0xCA);
        assert_eq!(app.value_input, "0xCA");
    }

    #[test]
    fn toggle_comparison_updates_compare_field_and_diff() {
        let mut app = loaded_app("0xCA", "0xC2", NumberFormat::Hex, 8);
        assert!(pair(&app).differs_at(3));
        app.toggle_bit_at(BitKey {
            register: RegisterTag::Comparison,
            position: 3,
        });
        assert_eq!(app.compare_input, "0xCA");
        assert_eq!(app.value_input, "0xCA");
        // 差分ハイライトは再計算で消える
        for position in 0..8 {
            assert!(!pair(&app).differs_at(position));
        }
    }

    #[test]
    fn toggle_pushes_value_in_selected_base() {
        let mut app = loaded_app("202", "", NumberFormat::Dec, 8);
        app.toggle_bit_at(BitKey {
            register: RegisterTag::Primary,
            position: 0,
        });
        assert_eq!(app.value_input, "203");
    }

    #[test]
    fn mode_switch_clears_selection_without_residue() {
        let mut app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        select_range(&mut app, RegisterTag::Primary, 7, 4);
        assert_eq!(app.selection.positions().len(), 4);

        app.set_mode(InteractMode::Edit);
        assert!(app.selection.is_empty());
        assert!(app.selection_summary().is_none());

        app.set_mode(InteractMode::Selection);
        assert!(app.selection.is_empty());
    }

    #[test]
    fn mode_persists_across_reparses() {
        let mut app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        app.set_mode(InteractMode::Edit);
        app.submit();
        assert_eq!(app.mode, InteractMode::Edit);
    }

    #[test]
    fn reparse_resets_selection() {
        let mut app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        select_range(&mut app, RegisterTag::Primary, 7, 4);
        app.submit();
        assert!(app.selection.is_empty());
    }

    #[test]
    fn selection_summary_reads_owning_register() {
        let mut app = loaded_app("0xF0", "0x0F", NumberFormat::Hex, 8);
        select_range(&mut app, RegisterTag::Comparison, 3, 0);
        let summary = app.selection_summary().unwrap();
        assert_eq!(summary.register, RegisterTag::Comparison);
        assert_eq!(summary.binary, "1111");
        assert_eq!(summary.hex, "0xF");
    }

    #[test]
    fn cancel_clears_selection() {
        let mut app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        select_range(&mut app, RegisterTag::Primary, 2, 5);
        app.execute(Action::Cancel);
        assert!(app.selection.is_empty());
    }

    #[test]
    fn outside_click_clears_selection() {
        let mut app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        select_range(&mut app, RegisterTag::Primary, 2, 5);
        app.on_mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 0,
            row: 0,
            modifiers: KeyModifiers::empty(),
        });
        assert!(app.selection.is_empty());
    }

    #[test]
    fn service_failure_keeps_prior_results() {
        let mut app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        app.service = Box::new(DownService);
        app.submit();
        assert!(app.net_error.is_some());
        // 前回の結果はそのまま
        assert_eq!(pair(&app).primary().parsed_value(), 0xCA);
        // 次の成功で復帰する
        app.service = Box::new(RegisterParser);
        app.submit();
        assert!(app.net_error.is_none());
    }

    #[test]
    fn partial_comparison_failure_falls_back_to_single_register() {
        let app = loaded_app("0xCA", "zzz", NumberFormat::Hex, 8);
        assert!(!pair(&app).has_comparison());
        match &app.display {
            DisplayState::Loaded(view) => {
                let note = view.comparison_note.as_deref().unwrap();
                assert!(note.starts_with("Invalid comparison value:"), "{note}");
            }
            _ => panic!("not loaded"),
        }
    }

    #[test]
    fn malformed_response_becomes_inline_error_fragment() {
        let mut app = App::with_service(Box::new(MissingBitsService));
        app.value_input = "1".to_string();
        app.submit();
        match &app.display {
            DisplayState::Loaded(view) => {
                assert!(view.grid.is_err());
            }
            _ => panic!("not loaded"),
        }
    }

    #[test]
    fn width_change_with_value_resubmits() {
        let mut app = loaded_app("0xCA", "", NumberFormat::Hex, 8);
        app.focus = FormField::Width;
        app.cycle(true);
        assert_eq!(app.bit_width, 16);
        assert_eq!(pair(&app).primary().bit_width(), 16);
        assert_eq!(pair(&app).primary().formats().hex, "0x00CA");
    }

    #[test]
    fn format_change_with_value_resubmits() {
        let mut app = loaded_app("100", "", NumberFormat::Dec, 8);
        app.focus = FormField::Format;
        // dec → oct: 同じ入力を8進数として読み直す
        app.cycle(true);
        assert_eq!(app.format, NumberFormat::Oct);
        assert_eq!(pair(&app).primary().parsed_value(), 0o100);
    }

    #[test]
    fn cycle_without_value_does_not_submit() {
        let mut app = App::new();
        app.focus = FormField::Format;
        app.cycle(true);
        assert!(matches!(app.display, DisplayState::Empty));
    }

    #[test]
    fn typing_goes_to_focused_field() {
        let mut app = App::new();
        app.execute(Action::InputChar('0'));
        app.execute(Action::InputChar('x'));
        app.execute(Action::FocusNext);
        app.execute(Action::InputChar('1'));
        assert_eq!(app.value_input, "0x");
        assert_eq!(app.compare_input, "1");
        app.execute(Action::ClearField);
        assert_eq!(app.compare_input, "");
    }
}
