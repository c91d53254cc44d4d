// UI utilities for the SDK CLI

use console::style;
use dialoguer::{theme::ColorfulTheme, Password};
use indicatif::{ProgressBar, ProgressStyle};

use kratos_sdk::network::NetworkSnapshot;
use kratos_sdk::{Balance, Receipt, Status, KRAT};

/// Create a spinner with a message
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Balance in KRAT with grouped thousands and at most 6 decimals
pub fn format_balance(amount: Balance) -> String {
    let fraction = format!("{:012}", amount % KRAT);
    let decimals = fraction[..6].trim_end_matches('0');

    match decimals {
        "" => format!("{} KRAT", group_thousands(amount / KRAT)),
        _ => format!("{}.{} KRAT", group_thousands(amount / KRAT), decimals),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;

    let mut grouped = String::from(&digits[..head]);
    for group in digits.as_bytes()[head..].chunks(3) {
        if !grouped.is_empty() {
            grouped.push(',');
        }
        grouped.extend(group.iter().map(|&b| b as char));
    }
    grouped
}

/// Parse a KRAT amount such as `12` or `0.5` into base units
pub fn parse_amount(input: &str) -> Result<Balance, String> {
    let input = input.trim().trim_end_matches("KRAT").trim();
    let (whole, frac) = input.split_once('.').unwrap_or((input, ""));

    if whole.is_empty() && frac.is_empty() {
        return Err("empty amount".to_string());
    }
    if frac.len() > 12 {
        return Err("at most 12 decimals".to_string());
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| format!("invalid amount `{}`", input))?
    };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<12}", frac)
            .parse()
            .map_err(|_| format!("invalid amount `{}`", input))?
    };

    whole
        .checked_mul(KRAT)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(|| "amount too large".to_string())
}

/// Print a section header
pub fn print_header(title: &str) {
    println!();
    println!("{}", style(title).cyan().bold());
    println!();
}

pub fn print_success(message: &str) {
    println!("{}", style(format!("  ✅ {}", message)).green());
}

pub fn print_error(message: &str) {
    eprintln!("{}", style(format!("  ❌ {}", message)).red());
}

pub fn print_info(message: &str) {
    println!("{}", style(format!("  ℹ️  {}", message)).blue());
}

/// Password with confirmation, for new keystores
pub fn read_password_with_confirm(prompt: &str) -> anyhow::Result<String> {
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords don't match")
        .interact()?;
    Ok(password)
}

/// Password without confirmation, for unlocking
pub fn read_password(prompt: &str) -> anyhow::Result<String> {
    let password = Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()?;
    Ok(password)
}

fn styled_status(status: Status) -> String {
    if status == Status::Success {
        format!("{}", style(status).green())
    } else {
        format!("{}", style(status).red())
    }
}

/// Print the fields a receipt actually carries
pub fn print_receipt(receipt: &Receipt) {
    println!("  {} {}", style("Status:").dim(), styled_status(receipt.status));

    let fields = [
        ("Account:", receipt.account_id.map(|id| id.to_string())),
        ("File:", receipt.file_id.map(|id| id.to_string())),
        ("Topic:", receipt.topic_id.map(|id| id.to_string())),
        ("Contract:", receipt.contract_id.map(|id| id.to_string())),
        ("Sequence:", receipt.topic_sequence_number.map(|n| n.to_string())),
        ("Consensus:", receipt.consensus_timestamp.map(|t| t.to_string())),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("  {} {}", style(label).dim(), value);
        }
    }
}

/// Print the node table of a snapshot
pub fn print_nodes(snapshot: &NetworkSnapshot) {
    println!(
        "  {} {} {}",
        style("Generation").dim(),
        style(snapshot.generation()).white(),
        style(format!("({} nodes)", snapshot.len())).dim()
    );
    println!();

    for node in snapshot.nodes() {
        let health = if node.is_healthy() {
            style(format!("health {:>3}", node.health())).green()
        } else {
            style(format!("backoff {:?}", node.remaining_backoff())).yellow()
        };
        println!(
            "  {:<12} {}  {}",
            style(node.account_id()).cyan(),
            health,
            style(node.endpoints().join(", ")).dim()
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_balance() {
        assert_eq!(format_balance(0), "0 KRAT");
        assert_eq!(format_balance(7 * KRAT), "7 KRAT");
        assert_eq!(format_balance(25_000 * KRAT), "25,000 KRAT");
        assert_eq!(format_balance(3 * KRAT + KRAT / 4), "3.25 KRAT");
        // Dust below a micro-KRAT is not shown
        assert_eq!(format_balance(KRAT + 1), "1 KRAT");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(4096), "4,096");
        assert_eq!(group_thousands(12_345_678), "12,345,678");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1"), Ok(KRAT));
        assert_eq!(parse_amount("1.5"), Ok(KRAT + KRAT / 2));
        assert_eq!(parse_amount("0.000000000001"), Ok(1));
        assert_eq!(parse_amount(".25 KRAT"), Ok(KRAT / 4));
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("1.0000000000001").is_err());
        assert!(parse_amount("99999999999").is_err());
    }
}
