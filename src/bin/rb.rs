//! rb - Register bits tool for pipes
//!
//! One-shot decode of register values without the TUI.

use std::collections::BTreeSet;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use regbits::app::SelectionSummary;
use regbits::parse::{NumberFormat, ParseRequest, parse_register};
use regbits::register::{Register, RegisterTag};

/// Register bits tool for pipes
#[derive(Parser, Debug)]
#[command(name = "rb")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Number format: "hex", "dec" or "oct"
    #[arg(short, long, default_value = "hex", global = true)]
    format: String,

    /// Bit width (8, 16, 32, 64)
    #[arg(short = 'w', long, default_value = "32", global = true)]
    bit_width: u16,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a value and print its bit grid
    Show {
        /// Value to decode (e.g., "0xCA")
        value: String,

        /// Comparison value; differing bits are marked
        #[arg(short, long)]
        compare: Option<String>,
    },

    /// Read a contiguous bit range off a value as a new number
    Bits {
        /// Value to decode
        value: String,

        /// Bit range "HI:LO" (e.g., "7:4") or a single position
        range: String,
    },

    /// Toggle bits of a value and print the result
    Toggle {
        /// Value to decode
        value: String,

        /// Bit positions to toggle
        positions: Vec<u16>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let format = parse_format(&args.format)?;

    match args.command {
        Command::Show { value, compare } => {
            cmd_show(&value, compare.as_deref(), format, args.bit_width)
        }
        Command::Bits { value, range } => cmd_bits(&value, &range, format, args.bit_width),
        Command::Toggle { value, positions } => {
            cmd_toggle(&value, &positions, format, args.bit_width)
        }
    }
}

fn parse_format(name: &str) -> Result<NumberFormat> {
    match name {
        "hex" => Ok(NumberFormat::Hex),
        "dec" => Ok(NumberFormat::Dec),
        "oct" => Ok(NumberFormat::Oct),
        _ => bail!("format must be 'hex', 'dec' or 'oct'"),
    }
}

/// Decode one value through the parsing service
fn decode(value: &str, format: NumberFormat, bit_width: u16) -> Result<Register> {
    let request = ParseRequest {
        value: value.to_string(),
        compare_value: String::new(),
        format,
        bit_width: bit_width.to_string(),
    };
    let response = parse_register(&request);
    if !response.success {
        bail!("{}", response.error.unwrap_or_else(|| "parse failed".to_string()));
    }
    Ok(response.primary_register()?)
}

/// Parse "HI:LO" or a single position
fn parse_range(s: &str) -> Result<(u16, u16)> {
    match s.split_once(':') {
        Some((hi, lo)) => {
            let hi: u16 = hi.trim().parse()?;
            let lo: u16 = lo.trim().parse()?;
            if hi < lo {
                bail!("range must be HI:LO with HI >= LO");
            }
            Ok((hi, lo))
        }
        None => {
            let position: u16 = s.trim().parse()?;
            Ok((position, position))
        }
    }
}

/// Print one register as label and value rows, 16 bits per row,
/// with a gap every 8 bits. Differing bits are marked with '^'.
fn print_grid(register: &Register, diff: Option<&Register>) {
    let width = register.bit_width();
    let mut msb = width - 1;
    loop {
        let row_bits = (msb + 1).min(16);
        let lo = msb + 1 - row_bits;

        let mut labels = String::new();
        let mut values = String::new();
        let mut marks = String::new();
        for col in 0..row_bits {
            if col > 0 && col % 8 == 0 {
                labels.push_str("  ");
                values.push_str("  ");
                marks.push_str("  ");
            }
            let position = msb - col;
            let bit = register.bit(position).map(|b| b.value).unwrap_or('?');
            labels.push_str(&format!("{position:>2} "));
            values.push_str(&format!(" {bit} "));
            let differs = diff
                .and_then(|other| other.bit(position))
                .is_some_and(|other| Some(other.value) != register.bit(position).map(|b| b.value));
            marks.push_str(if differs { " ^ " } else { "   " });
        }
        println!("{labels}");
        println!("{values}");
        if diff.is_some() {
            println!("{marks}");
        }

        if lo == 0 {
            break;
        }
        msb = lo - 1;
    }
}

// === Commands ===

fn cmd_show(
    value: &str,
    compare: Option<&str>,
    format: NumberFormat,
    bit_width: u16,
) -> Result<()> {
    let request = ParseRequest {
        value: value.to_string(),
        compare_value: compare.unwrap_or_default().to_string(),
        format,
        bit_width: bit_width.to_string(),
    };
    let response = parse_register(&request);
    if !response.success {
        bail!("{}", response.error.unwrap_or_else(|| "parse failed".to_string()));
    }
    let register = response.primary_register()?;

    let comparison = match response.comparison.as_ref() {
        None => None,
        Some(result) => match (&result.error, result.to_register()) {
            (Some(error), _) => {
                eprintln!("warning: {error}");
                None
            }
            (None, Some(Ok(register))) => Some(register),
            (None, _) => {
                eprintln!("warning: comparison data missing");
                None
            }
        },
    };

    let formats = register.formats();
    println!("Hex: {}  Dec: {}  Oct: {}", formats.hex, formats.dec, formats.oct);
    println!();
    print_grid(&register, comparison.as_ref());
    println!("Binary: {}", register.binary());

    if let Some(comparison) = &comparison {
        println!();
        let formats = comparison.formats();
        println!(
            "Compare  Hex: {}  Dec: {}  Oct: {}",
            formats.hex, formats.dec, formats.oct
        );
        println!();
        print_grid(comparison, Some(&register));
        println!("Binary: {}", comparison.binary());
    }

    Ok(())
}

fn cmd_bits(value: &str, range: &str, format: NumberFormat, bit_width: u16) -> Result<()> {
    let register = decode(value, format, bit_width)?;
    let (hi, lo) = parse_range(range)?;
    if hi >= register.bit_width() {
        bail!(
            "bit position {} out of range for {}-bit register",
            hi,
            register.bit_width()
        );
    }

    let positions: BTreeSet<u16> = (lo..=hi).collect();
    let Some(summary) =
        SelectionSummary::from_positions(&register, RegisterTag::Primary, &positions)
    else {
        bail!("empty bit range");
    };

    println!("Selected {} ({} bits)", summary.range_text, summary.bit_count);
    println!("Binary: {}", summary.binary);
    println!("Hex: {}  Dec: {}  Oct: {}", summary.hex, summary.dec, summary.oct);
    Ok(())
}

fn cmd_toggle(
    value: &str,
    positions: &[u16],
    format: NumberFormat,
    bit_width: u16,
) -> Result<()> {
    if positions.is_empty() {
        bail!("no bit positions given");
    }
    let mut register = decode(value, format, bit_width)?;
    for &position in positions {
        register.toggle_bit(position)?;
    }

    let formats = register.formats();
    println!("Hex: {}  Dec: {}  Oct: {}", formats.hex, formats.dec, formats.oct);
    println!("Binary: {}", register.binary());
    Ok(())
}
