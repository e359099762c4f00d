use colored::*;
use tracing::info;
use watchr_common::network::device::Protocol;
use watchr_core::registry::Health;

pub const TOTAL_WIDTH: usize = 64;

pub fn header(msg: &str) {
    let formatted: String = format!("⟦ {} ⟧", msg);
    let msg_len: usize = formatted.chars().count();

    let dash_count: usize = TOTAL_WIDTH.saturating_sub(msg_len);
    let left: usize = dash_count / 2;
    let right: usize = dash_count - left;

    let line: String = format!(
        "{}{}{}",
        "─".repeat(left).bright_black(),
        formatted.to_uppercase().bright_green(),
        "─".repeat(right).bright_black()
    );

    info!("{line}");
}

pub fn health(health: &Health, running_monitors: usize) {
    let suspended: Vec<String> = Protocol::ALL
        .iter()
        .map(|protocol| {
            let count: usize = health.suspended(*protocol);
            let count: ColoredString = if count == 0 {
                count.to_string().green()
            } else {
                count.to_string().red().bold()
            };
            format!("{protocol} {count}")
        })
        .collect();

    info!(
        "{} devices, {} monitors, suspended {}",
        health.device_count.to_string().bold(),
        running_monitors,
        suspended.join(" ")
    );
}

pub fn tree_head(idx: usize, name: &str) {
    info!("{} {}", format!("[{idx}]").bright_black(), name.bright_white());
}

pub fn as_tree_one_level(key_value_pair: &[(&str, String)]) {
    for (i, (key, value)) in key_value_pair.iter().enumerate() {
        let last: bool = i + 1 == key_value_pair.len();
        let branch: ColoredString = if !last {
            "├─".bright_black()
        } else {
            "└─".bright_black()
        };
        let dots: String = ".".repeat(8usize.saturating_sub(key.len()));
        info!(" {} {}{}{} {}", branch, key, dots.bright_black(), ":".bright_black(), value);
    }
}
