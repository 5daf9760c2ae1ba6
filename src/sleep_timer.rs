// One-shot "stop playback later" timer
// Owned by the player loop; expiry is observed there, never on another thread

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepSetting {
    Off,
    Minutes(u32),
}

/// Choices offered to the user, in menu order
pub const SLEEP_OPTIONS: [SleepSetting; 6] = [
    SleepSetting::Off,
    SleepSetting::Minutes(15),
    SleepSetting::Minutes(30),
    SleepSetting::Minutes(45),
    SleepSetting::Minutes(60),
    SleepSetting::Minutes(90),
];

impl SleepSetting {
    pub fn duration(&self) -> Option<Duration> {
        match self {
            SleepSetting::Off | SleepSetting::Minutes(0) => None,
            SleepSetting::Minutes(minutes) => Some(Duration::from_secs(u64::from(*minutes) * 60)),
        }
    }
}

impl fmt::Display for SleepSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepSetting::Off => f.write_str("Off"),
            SleepSetting::Minutes(minutes) => write!(f, "{} minutes", minutes),
        }
    }
}

impl FromStr for SleepSetting {
    type Err = String;

    /// Accepts `Off`, `<n> minutes` or a bare `<n>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("off") {
            return Ok(SleepSetting::Off);
        }

        let number = s
            .strip_suffix("minutes")
            .or_else(|| s.strip_suffix("minute"))
            .or_else(|| s.strip_suffix("min"))
            .unwrap_or(s)
            .trim();
        match number.parse::<u32>() {
            Ok(0) => Ok(SleepSetting::Off),
            Ok(minutes) => Ok(SleepSetting::Minutes(minutes)),
            Err(_) => Err(format!("invalid sleep timer setting: '{}'", s)),
        }
    }
}

/// At most one pending deadline; a new `set` replaces the old one outright.
#[derive(Debug, Clone, Default)]
pub struct SleepTimer {
    deadline: Option<Instant>,
}

impl SleepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm, re-arm or cancel. Returns the new deadline, if any.
    pub fn set(&mut self, setting: SleepSetting, now: Instant) -> Option<Instant> {
        self.cancel();
        self.deadline = setting.duration().map(|d| now + d);
        match setting.duration() {
            Some(d) => info!("Sleep timer set for {} minutes", d.as_secs() / 60),
            None => info!("Sleep timer off"),
        }
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }

    /// True exactly once, at the first check on or after the deadline
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                info!("Sleep timer expired");
                true
            }
            _ => false,
        }
    }
}

/// Resolves at `deadline`, or never when there is none
pub async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_render_like_menu_labels() {
        let labels: Vec<String> = SLEEP_OPTIONS.iter().map(|o| o.to_string()).collect();
        assert_eq!(
            labels,
            vec!["Off", "15 minutes", "30 minutes", "45 minutes", "60 minutes", "90 minutes"]
        );
        for option in SLEEP_OPTIONS {
            assert_eq!(option.to_string().parse::<SleepSetting>().unwrap(), option);
        }
    }

    #[test]
    fn parser_accepts_loose_forms() {
        assert_eq!("20".parse::<SleepSetting>().unwrap(), SleepSetting::Minutes(20));
        assert_eq!(" 5 min ".parse::<SleepSetting>().unwrap(), SleepSetting::Minutes(5));
        assert_eq!("OFF".parse::<SleepSetting>().unwrap(), SleepSetting::Off);
        assert_eq!("0 minutes".parse::<SleepSetting>().unwrap(), SleepSetting::Off);
        assert!("soon".parse::<SleepSetting>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_the_deadline() {
        let mut timer = SleepTimer::new();
        let start = Instant::now();
        timer.set(SleepSetting::Minutes(15), start);

        assert!(!timer.fire(start + Duration::from_secs(60)));
        wait_for(timer.deadline()).await;

        let now = Instant::now();
        assert!(now >= start + Duration::from_secs(15 * 60));
        assert!(timer.fire(now));
        assert!(!timer.fire(now));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn off_right_after_set_never_fires() {
        let mut timer = SleepTimer::new();
        timer.set(SleepSetting::Minutes(1), Instant::now());
        timer.set(SleepSetting::Off, Instant::now());

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(!timer.fire(Instant::now()));
        assert_eq!(timer.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn resetting_replaces_the_pending_deadline() {
        let mut timer = SleepTimer::new();
        let start = Instant::now();
        timer.set(SleepSetting::Minutes(15), start);
        timer.set(SleepSetting::Minutes(30), start);

        tokio::time::advance(Duration::from_secs(16 * 60)).await;
        assert!(!timer.fire(Instant::now()));
        assert_eq!(timer.remaining(Instant::now()), Some(Duration::from_secs(14 * 60)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms_a_pending_deadline() {
        let mut timer = SleepTimer::new();
        timer.set(SleepSetting::Minutes(15), Instant::now());
        timer.cancel();

        assert!(!timer.is_armed());
        assert_eq!(timer.remaining(Instant::now()), None);
        tokio::time::advance(Duration::from_secs(16 * 60)).await;
        assert!(!timer.fire(Instant::now()));
    }
}
