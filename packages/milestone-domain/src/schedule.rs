use rand::Rng;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use time_tz::{OffsetDateTimeExt, Tz, timezones};

use milestone_config::Schedule;

/// Looks up an IANA zone name. Unknown names resolve to `None`, which callers treat as UTC.
pub fn resolve_timezone(name: &str) -> Option<&'static Tz> {
	timezones::get_by_name(name.trim())
}

pub fn to_local(ts: OffsetDateTime, tz: Option<&Tz>) -> OffsetDateTime {
	match tz {
		Some(tz) => ts.to_timezone(tz),
		None => ts.to_offset(UtcOffset::UTC),
	}
}

pub fn is_waking_hour(local: OffsetDateTime, cfg: &Schedule) -> bool {
	let hour = local.hour();

	hour >= cfg.waking_start_hour && hour < cfg.waking_end_hour
}

/// Picks a delivery time inside `[match_time, match_time + window]` that lands in the follower's
/// waking hours, falling back to the next local morning when random draws keep missing.
pub fn schedule_delivery<R>(
	match_time: OffsetDateTime,
	timezone: &str,
	cfg: &Schedule,
	rng: &mut R,
) -> OffsetDateTime
where
	R: Rng + ?Sized,
{
	let tz = resolve_timezone(timezone);
	let window_secs = i64::from(cfg.window_hours) * 3_600;

	for _ in 0..cfg.max_attempts {
		let candidate = match_time + Duration::seconds(rng.gen_range(0..=window_secs));

		if is_waking_hour(to_local(candidate, tz), cfg) {
			return candidate.to_offset(UtcOffset::UTC);
		}
	}

	next_morning(match_time, tz, cfg, rng)
}

/// The first waking hour, plus a random minute, on the local day after the match.
pub fn next_morning<R>(
	match_time: OffsetDateTime,
	tz: Option<&Tz>,
	cfg: &Schedule,
	rng: &mut R,
) -> OffsetDateTime
where
	R: Rng + ?Sized,
{
	let local_match = to_local(match_time, tz);
	let day = local_match.date().next_day().unwrap_or(local_match.date());
	let minute = rng.gen_range(0..60_i64);
	let wall_clock = Time::MIDNIGHT
		+ Duration::hours(i64::from(cfg.waking_start_hour))
		+ Duration::minutes(minute);
	let wall = PrimitiveDateTime::new(day, wall_clock);
	// The match-day offset can differ from the next morning's across a DST change.
	let provisional = wall.assume_offset(local_match.offset());
	let offset = to_local(provisional, tz).offset();

	wall.assume_offset(offset).to_offset(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
	use rand::{SeedableRng, rngs::StdRng};
	use time::macros::datetime;

	use super::*;

	#[test]
	fn unknown_timezone_falls_back_to_utc() {
		assert!(resolve_timezone("Mars/Olympus_Mons").is_none());

		let ts = datetime!(2024-05-01 12:00 +02:00);

		assert_eq!(to_local(ts, None).offset(), UtcOffset::UTC);
		assert_eq!(to_local(ts, None).hour(), 10);
	}

	#[test]
	fn new_york_local_hour_reflects_daylight_saving() {
		let tz = resolve_timezone("America/New_York");

		assert!(tz.is_some());
		assert_eq!(to_local(datetime!(2024-07-01 16:00 UTC), tz).hour(), 12);
		assert_eq!(to_local(datetime!(2024-01-15 16:00 UTC), tz).hour(), 11);
	}

	#[test]
	fn quiet_window_uses_next_morning() {
		let cfg = Schedule { window_hours: 1, ..Schedule::default() };
		let mut rng = StdRng::seed_from_u64(7);
		// 23:00 in UTC leaves the whole one-hour window inside quiet hours.
		let match_time = datetime!(2024-05-01 23:00 UTC);
		let scheduled = schedule_delivery(match_time, "UTC", &cfg, &mut rng);

		assert_eq!(scheduled.date(), datetime!(2024-05-02 00:00 UTC).date());
		assert_eq!(scheduled.hour(), 9);
	}

	#[test]
	fn next_morning_is_anchored_to_local_calendar() {
		let tz = resolve_timezone("Asia/Tokyo");
		let cfg = Schedule::default();
		let mut rng = StdRng::seed_from_u64(11);
		// 2024-05-01 20:00 UTC is 2024-05-02 05:00 in Tokyo.
		let scheduled = next_morning(datetime!(2024-05-01 20:00 UTC), tz, &cfg, &mut rng);
		let local = to_local(scheduled, tz);

		assert_eq!(local.date(), datetime!(2024-05-03 00:00 UTC).date());
		assert_eq!(local.hour(), 9);
	}
}
