pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let included = line.trim().strip_prefix("\\ir ").and_then(|path| match path.trim() {
			"00_extensions.sql" => Some(include_str!("../../../sql/00_extensions.sql")),
			"tables/001_tasks.sql" => Some(include_str!("../../../sql/tables/001_tasks.sql")),
			"tables/002_task_embeddings.sql" =>
				Some(include_str!("../../../sql/tables/002_task_embeddings.sql")),
			_ => None,
		});

		out.push_str(included.unwrap_or(line));
		out.push('\n');
	}

	out
}
