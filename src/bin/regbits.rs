use std::io::{self, Write as _};

use anyhow::{Result, bail};
use clap::Parser;
use crossterm::{
    event::{
        DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    },
    execute, queue,
    terminal::{
        BeginSynchronizedUpdate, EndSynchronizedUpdate, EnterAlternateScreen,
        LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
    },
};
use ratatui::{Terminal, backend::CrosstermBackend};

use regbits::app::App;
use regbits::parse::NumberFormat;

/// Terminal register bit-field viewer and editor
#[derive(Parser, Debug)]
#[command(name = "regbits")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Value to parse on startup (e.g., 0x12345678)
    #[arg(value_name = "VALUE")]
    value: Option<String>,

    /// Comparison value
    #[arg(short, long)]
    compare: Option<String>,

    /// Number format: "hex", "dec" or "oct"
    #[arg(short, long, default_value = "hex")]
    format: String,

    /// Bit width (8, 16, 32, 64)
    #[arg(short = 'w', long, default_value = "32")]
    bit_width: u16,
}

/// フォーマット名をパース
fn parse_format(name: &str) -> Result<NumberFormat> {
    match name {
        "hex" => Ok(NumberFormat::Hex),
        "dec" => Ok(NumberFormat::Dec),
        "oct" => Ok(NumberFormat::Oct),
        _ => bail!("format must be 'hex', 'dec' or 'oct'"),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let format = parse_format(&args.format)?;

    // ターミナルの初期化
    // ドラッグ選択とクリック編集のためマウスキャプチャを有効化
    // Alternate Screenでスクロールによるバッファ移動を防止
    // Bracketed Pasteでペースト内容を一括取り込み
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableBracketedPaste,
        EnableMouseCapture,
        SetTitle("regbits - register bit fields")
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // アプリケーションの実行
    let result = run_app(&mut terminal, args, format);

    // ターミナルの後処理
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    args: Args,
    format: NumberFormat,
) -> Result<()> {
    let mut app = App::new();
    app.prefill(args.value, args.compare, format, args.bit_width);

    // メインループ
    loop {
        // Synchronized Update: 描画のちらつきを防止
        queue!(terminal.backend_mut(), BeginSynchronizedUpdate)?;
        terminal.draw(|f| app.draw(f))?;
        queue!(terminal.backend_mut(), EndSynchronizedUpdate)?;
        terminal.backend_mut().flush()?;

        app.handle_event()?;

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
