//! Completion-ratio tracking from ffmpeg's stderr.
//!
//! ffmpeg is run with `-progress pipe:2 -nostats`, which interleaves the
//! usual log output (including the input's `Duration:` header) with blocks
//! of `key=value` lines, each block terminated by `progress=continue` or
//! `progress=end`.

/// Incremental parser that turns ffmpeg stderr lines into ratios.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    duration_secs: Option<f64>,
    out_time_secs: Option<f64>,
}

impl FfmpegProgress {
    /// Create a parser that learns the duration from the stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with a known input duration.
    pub fn with_duration(duration_secs: f64) -> Self {
        Self {
            duration_secs: Some(duration_secs),
            out_time_secs: None,
        }
    }

    /// Input duration, once known.
    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    /// Feed one stderr line. Returns a ratio in `0.0..=1.0` at the end of
    /// each progress block whose position can be related to the duration.
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("Duration:") {
            // Only the first (input) duration counts.
            if self.duration_secs.is_none() {
                let stamp = rest.split(',').next().unwrap_or("").trim();
                self.duration_secs = parse_timestamp(stamp).filter(|d| *d > 0.0);
            }
            return None;
        }

        if let Some(val) = line.strip_prefix("out_time_us=") {
            if let Ok(us) = val.trim().parse::<i64>() {
                self.out_time_secs = Some(us.max(0) as f64 / 1_000_000.0);
            }
            return None;
        }

        if let Some(val) = line.strip_prefix("out_time=") {
            // Fallback for builds that report `out_time_us=N/A`.
            if let Some(secs) = parse_timestamp(val.trim()) {
                self.out_time_secs = Some(secs);
            }
            return None;
        }

        if let Some(state) = line.strip_prefix("progress=") {
            if state.trim() == "end" {
                return Some(1.0);
            }
            let (Some(out), Some(dur)) = (self.out_time_secs, self.duration_secs) else {
                return None;
            };
            return Some((out / dur).clamp(0.0, 1.0));
        }

        None
    }
}

/// Parse `HH:MM:SS[.frac]` into seconds. Returns `None` for `N/A` or
/// malformed input.
pub fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim().trim_start_matches('-');
    let mut parts = s.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
