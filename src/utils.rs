// Helpers for terminal output.

use chrono::{DateTime, Utc};

use crate::devices::DeviceSummary;

pub fn truncate_string(mut value: String, max_length: usize) -> String {
    if value.chars().count() > max_length {
        let keep = max_length.saturating_sub(3);
        value = value.chars().take(keep).collect::<String>() + "...";
    }
    value
}

pub fn time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - timestamp).num_seconds().max(0) as u64;
    let days = seconds / 86400;
    match days {
        0 => match seconds {
            0..=9 => "just now".to_string(),
            10..=59 => format!("{} seconds ago", seconds),
            60..=119 => "a minute ago".to_string(),
            120..=3599 => format!("{} minutes ago", seconds / 60),
            3600..=7199 => "an hour ago".to_string(),
            _ => format!("{} hours ago", seconds / 3600),
        },
        1 => "1 day ago".to_string(),
        2..=6 => format!("{} days ago", days),
        7..=13 => "1 week ago".to_string(),
        14..=30 => format!("{} weeks ago", days / 7),
        31..=364 => format!("{} months ago", days / 30),
        _ => format!("{} years ago", days / 365),
    }
}

// Display a table of devices.
pub fn display_devices(devices: &[DeviceSummary], now: DateTime<Utc>) {
    // {:>##} gives the column a fixed width of ## characters, aligned right
    println!("{:>6} {:>34} {:>40} {:>22}", "ID", "Name", "IP", "Last Seen");
    for device in devices {
        let name = device
            .display_name
            .clone()
            .unwrap_or_else(|| format!("device {}", device.device_id));
        println!(
            "{:>6} {:>34} {:>40} {:>22}",
            device.device_id,
            truncate_string(name, 33),
            truncate_string(device.primary_ip.clone().unwrap_or_default(), 40),
            time_ago(device.last_seen_at, now)
        );
    }
}
