//! Elapsed-time formatting

/// Render a number of seconds as `HH:MM:SS`.
///
/// Hours are not wrapped, so very long recordings show more than two hour digits.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hours_minutes_seconds() {
        assert_eq!(format_elapsed(3661), "01:01:01");
    }

    #[test]
    fn test_format_under_a_minute() {
        assert_eq!(format_elapsed(59), "00:00:59");
        assert_eq!(format_elapsed(0), "00:00:00");
    }

    #[test]
    fn test_format_long_recording() {
        assert_eq!(format_elapsed(100 * 3600 + 5), "100:00:05");
    }
}
