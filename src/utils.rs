pub fn env_var(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("Missing environment variable {key}"))
}

pub fn format_hms(secs: u64) -> String {
    let mins = secs / 60;
    let hours = mins / 60;
    if hours > 0 {
        format!(
            "{hours}:{mins:02}:{secs:02}",
            hours = hours,
            mins = mins % 60,
            secs = secs % 60
        )
    } else {
        format!("{mins:02}:{secs:02}", mins = mins % 60, secs = secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::format_hms;

    #[test]
    fn test_format_hms() {
        assert_eq!("00:42", format_hms(42));
        assert_eq!("12:03", format_hms(12 * 60 + 3));
        assert_eq!("1:00:59", format_hms(3659));
    }
}
