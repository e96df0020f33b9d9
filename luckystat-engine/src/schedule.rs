use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Jour et heure locale du renouvellement hebdomadaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshAt {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
}

impl Default for RefreshAt {
    fn default() -> Self {
        Self {
            weekday: Weekday::Sun,
            hour: 7,
            minute: 0,
        }
    }
}

impl RefreshAt {
    pub fn time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.min(23), self.minute.min(59), 0).unwrap_or(NaiveTime::MIN)
    }
}

/// Heure locale vers instant ; une heure sautée (passage à l'heure d'été) est
/// décalée vers l'avant, une heure ambiguë prend le premier instant.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    for shift in 0..3 {
        if let Some(dt) = tz.from_local_datetime(&(naive + Duration::hours(shift))).earliest() {
            return dt;
        }
    }
    tz.from_utc_datetime(&naive)
}

/// Prochaine occurrence de `at` strictement après `now`, dans le fuseau de `now`.
pub fn next_weekly_instant<Tz: TimeZone>(now: &DateTime<Tz>, at: &RefreshAt) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.naive_local().date();
    let days_until =
        (7 + at.weekday.num_days_from_sunday() - today.weekday().num_days_from_sunday()) % 7;

    let date = today + Days::new(days_until as u64);
    let candidate = resolve_local(&tz, date.and_time(at.time()));
    if candidate > *now {
        return candidate;
    }
    resolve_local(&tz, (date + Days::new(7)).and_time(at.time()))
}

pub fn is_due(now: &DateTime<Utc>, next_refresh: &DateTime<Utc>) -> bool {
    now >= next_refresh
}

pub trait Clock {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// Horloge murale, fuseau local de la machine.
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

pub trait Sleeper {
    fn sleep(&mut self, duration: std::time::Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: std::time::Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn assert_on_schedule<Tz: TimeZone>(dt: &DateTime<Tz>) {
        let local = dt.naive_local();
        assert_eq!(local.weekday(), Weekday::Sun);
        assert_eq!((local.hour(), local.minute(), local.second()), (7, 0, 0));
    }

    #[test]
    fn test_midweek_goes_to_coming_sunday() {
        // 2024-01-03 est un mercredi
        let next = next_weekly_instant(&utc(2024, 1, 3, 12, 0, 0), &RefreshAt::default());
        assert_eq!(next, utc(2024, 1, 7, 7, 0, 0));
    }

    #[test]
    fn test_sunday_before_seven_same_day() {
        let next = next_weekly_instant(&utc(2024, 1, 7, 6, 59, 59), &RefreshAt::default());
        assert_eq!(next, utc(2024, 1, 7, 7, 0, 0));
    }

    #[test]
    fn test_sunday_at_seven_goes_to_next_week() {
        let next = next_weekly_instant(&utc(2024, 1, 7, 7, 0, 0), &RefreshAt::default());
        assert_eq!(next, utc(2024, 1, 14, 7, 0, 0));

        let next = next_weekly_instant(&utc(2024, 1, 7, 22, 30, 0), &RefreshAt::default());
        assert_eq!(next, utc(2024, 1, 14, 7, 0, 0));
    }

    #[test]
    fn test_saturday_night_crosses_month() {
        let next = next_weekly_instant(&utc(2024, 3, 30, 23, 0, 0), &RefreshAt::default());
        assert_eq!(next, utc(2024, 3, 31, 7, 0, 0));
    }

    #[test]
    fn test_uses_local_time_of_offset() {
        let seoul = FixedOffset::east_opt(9 * 3600).unwrap();
        // samedi 23:30 UTC = dimanche 08:30 à Séoul : déjà passé, semaine suivante
        let now = utc(2024, 1, 6, 23, 30, 0).with_timezone(&seoul);
        let next = next_weekly_instant(&now, &RefreshAt::default());
        assert_on_schedule(&next);
        assert_eq!(next.with_timezone(&Utc), utc(2024, 1, 13, 22, 0, 0));
    }

    #[test]
    fn test_strictly_after_and_stable() {
        let at = RefreshAt::default();
        let mut now = utc(2024, 1, 1, 0, 0, 0);
        // un instant toutes les 7h13 sur un peu plus de deux mois
        for _ in 0..250 {
            let next = next_weekly_instant(&now, &at);
            assert!(next > now);
            assert!(next - now <= Duration::days(7));
            assert_on_schedule(&next);
            let just_before = next - Duration::milliseconds(1);
            assert_eq!(next_weekly_instant(&just_before, &at), next);
            now += Duration::minutes(433);
        }
    }

    #[test]
    fn test_custom_weekday() {
        let at = RefreshAt {
            weekday: Weekday::Wed,
            hour: 20,
            minute: 30,
        };
        let next = next_weekly_instant(&utc(2024, 1, 1, 9, 0, 0), &at);
        assert_eq!(next, utc(2024, 1, 3, 20, 30, 0));
    }

    #[test]
    fn test_is_due() {
        let t = utc(2024, 1, 7, 7, 0, 0);
        assert!(is_due(&t, &t));
        assert!(is_due(&(t + Duration::seconds(1)), &t));
        assert!(!is_due(&(t - Duration::seconds(1)), &t));
    }

    #[test]
    fn test_refresh_at_serde() {
        let json = serde_json::to_string(&RefreshAt::default()).unwrap();
        let back: RefreshAt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RefreshAt::default());
    }
}
