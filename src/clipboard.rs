//! クリップボード連携
//!
//! システムクリップボード（arboard）とターミナルのクリップボード
//! （OSC 52エスケープ）の両方へコピーする。SSH越しでも後者が効く。

use std::io::{self, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD};

/// システムとターミナルの両方へテキストをコピー
/// どちらか一方でも成功すればOk
pub fn copy_to_all(text: &str) -> io::Result<()> {
    let system = copy_system(text).is_ok();
    let terminal = copy_osc52(text).is_ok();
    if system || terminal {
        Ok(())
    } else {
        Err(io::Error::other("clipboard unavailable"))
    }
}

/// システムクリップボードへコピー
fn copy_system(text: &str) -> Result<(), arboard::Error> {
    arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.to_owned()))
}

/// OSC 52エスケープでターミナルのクリップボードへコピー
fn copy_osc52(text: &str) -> io::Result<()> {
    let encoded = STANDARD.encode(text.as_bytes());
    let mut stdout = io::stdout();
    write!(stdout, "\x1b]52;c;{encoded}\x07")?;
    stdout.flush()
}
