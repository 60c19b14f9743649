use cronplane_core::types::CronDescription;
use cronplane_core::{Error, Result};

pub const MAX_NAME_LEN: usize = 64;
/// Alerting thresholds below one minute are noise, not signal.
pub const MIN_THRESHOLD_SECS: u64 = 60;
/// Platform capacity classes: CPU units (1024 = one vCPU) and MiB.
pub const CPU_RANGE: std::ops::RangeInclusive<u32> = 128..=4096;
pub const MEMORY_RANGE: std::ops::RangeInclusive<u32> = 128..=30720;

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidInput(message.into())
}

/// Reject a description before any external resource is touched.
pub fn validate(desc: &CronDescription) -> Result<()> {
    if desc.name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if desc.name.len() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if !desc
        .name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            "name may only contain lowercase letters, digits and dashes",
        ));
    }

    if desc.timeout == Some(0) {
        return Err(invalid("timeout must be a positive number of seconds"));
    }

    let capacity = &desc.container.capacity;
    if !CPU_RANGE.contains(&capacity.cpu) {
        return Err(invalid(format!(
            "cpu {} outside supported range {}..={}",
            capacity.cpu,
            CPU_RANGE.start(),
            CPU_RANGE.end()
        )));
    }
    if !MEMORY_RANGE.contains(&capacity.memory) {
        return Err(invalid(format!(
            "memory {} outside supported range {}..={}",
            capacity.memory,
            MEMORY_RANGE.start(),
            MEMORY_RANGE.end()
        )));
    }

    for stream in &desc.container.logging.types {
        if stream != "stdout" && stream != "stderr" {
            return Err(invalid(format!(
                "unknown log type {stream} (expected stdout|stderr)"
            )));
        }
    }

    if let Some(notifications) = &desc.notifications {
        if !notifications.has_channel() {
            return Err(invalid(
                "notifications require a pagerduty key or a slack channel",
            ));
        }
        for threshold in [
            notifications.no_run_threshold,
            notifications.ran_longer_than_threshold,
        ]
        .into_iter()
        .flatten()
        {
            if threshold < MIN_THRESHOLD_SECS {
                return Err(invalid(format!(
                    "notification thresholds must be at least {MIN_THRESHOLD_SECS} seconds"
                )));
            }
        }
    }

    Ok(())
}
