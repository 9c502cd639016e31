pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_users.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_users.sql")),
				"tables/002_user_follows.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_user_follows.sql")),
				"tables/003_user_devices.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_user_devices.sql")),
				"tables/004_notifications.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_notifications.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn includes_are_expanded() {
		let sql = render_schema();

		assert!(!sql.contains("\\ir "));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS notifications"));
		assert!(sql.contains("CREATE TABLE IF NOT EXISTS user_devices"));
	}
}
