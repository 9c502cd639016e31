/// English ordinal suffix for `n`.
pub fn ordinal_suffix(n: u32) -> &'static str {
	if (11..=13).contains(&(n % 100)) {
		return "th";
	}

	match n % 10 {
		1 => "st",
		2 => "nd",
		3 => "rd",
		_ => "th",
	}
}

/// Whole-number rank shown to users; fractional percentiles are truncated.
pub fn whole_percentile(percentile: f64) -> u32 {
	if !percentile.is_finite() {
		return 0;
	}

	percentile.clamp(0.0, 100.0).trunc() as u32
}

pub fn build_message(entity_name: &str, stat_display_name: &str, percentile: f64) -> String {
	let rank = whole_percentile(percentile);

	format!("{entity_name} is now {rank}{} percentile in {stat_display_name}", ordinal_suffix(rank))
}
