use unicode_segmentation::UnicodeSegmentation;

pub const ELLIPSIS: &str = "...";

/// Longest grapheme-aligned prefix of `text` holding at most `max` graphemes.
pub fn clip(text: &str, max: usize) -> &str {
	match text.grapheme_indices(true).nth(max) {
		Some((offset, _)) => &text[..offset],
		None => text,
	}
}

pub fn is_longer_than(text: &str, max: usize) -> bool {
	text.graphemes(true).nth(max).is_some()
}

/// Fits `text` into `max` graphemes, marking truncation with a trailing ellipsis.
///
/// A budget too small to hold the ellipsis gets a plain clip.
pub fn excerpt(text: &str, max: usize) -> String {
	let text = text.trim();

	if !is_longer_than(text, max) {
		return text.to_string();
	}
	if max <= ELLIPSIS.len() {
		return clip(text, max).to_string();
	}

	let keep = max.saturating_sub(ELLIPSIS.len());

	format!("{}{ELLIPSIS}", clip(text, keep).trim_end())
}

/// Clips to `max` graphemes and appends an ellipsis when anything was dropped.
pub fn preview(text: &str, max: usize) -> String {
	let text = text.trim();

	if is_longer_than(text, max) { format!("{}{ELLIPSIS}", clip(text, max)) } else { text.to_string() }
}

pub fn round3(value: f32) -> f32 {
	(value * 1_000.0).round() / 1_000.0
}
