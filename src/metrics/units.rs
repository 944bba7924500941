//! Unit conversions and display formatting.

/// Kilocalories per kilojoule.
pub const KCAL_PER_KJ: f64 = 0.2390057361;

/// Convert kJ to kcal.
pub fn joule_to_cal(kj: f64) -> f64 {
    KCAL_PER_KJ * kj
}

/// Format a duration as `hh:mm:ss`, optionally with hundredths
/// (`hh:mm:ss.cc`). Negative durations get a `- ` prefix.
pub fn format_elapsed(ms: i64, with_centis: bool) -> String {
    let sign = if ms < 0 { "- " } else { "" };
    let ms = ms.unsigned_abs();

    let hours = ms / 3_600_000;
    let minutes = ms % 3_600_000 / 60_000;
    let seconds = ms % 60_000 / 1000;

    let mut time = format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds);
    if with_centis {
        time.push_str(&format!(".{:02}", ms % 1000 / 10));
    }
    time
}
