#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextRejection {
	Empty,
	TooLong { max_chars: u32 },
}

/// Trims `raw` and checks it against the embedder's input bounds.
pub fn normalize_text(raw: &str, max_chars: u32) -> Result<&str, TextRejection> {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return Err(TextRejection::Empty);
	}
	if trimmed.chars().count() > max_chars as usize {
		return Err(TextRejection::TooLong { max_chars });
	}

	Ok(trimmed)
}
