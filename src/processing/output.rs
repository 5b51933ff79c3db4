/// Marks the start of the output a workflow embeds in its check report.
pub const OUTPUT_SENTINEL: &str = "---- BEGIN CHECK OUTPUT ----";

const FENCE: &str = "```";

/// Extracts the output embedded in a check report.
///
/// The output is whatever follows the first [`OUTPUT_SENTINEL`] up to the next code fence or
/// sentinel, whichever comes first. If the sentinel
/// is directly followed by an opening fence (e.g. `` ```json ``), that fence line is skipped and
/// the output is the block's content. A missing closing fence means the output runs until the end
/// of the report. Reports without the sentinel have no output and yield an empty string.
pub fn extract_output(report: &str) -> &str {
    let after_sentinel = match report.split(OUTPUT_SENTINEL).nth(1) {
        Some(rest) => rest,
        None => return "",
    };
    let body = skip_opening_fence(after_sentinel);
    let output = match body.split_once(FENCE) {
        Some((output, _)) => output,
        None => body,
    };
    output.trim()
}

fn skip_opening_fence(text: &str) -> &str {
    let trimmed = text.trim_start();
    if !trimmed.starts_with(FENCE) {
        return text;
    }
    match trimmed.split_once('\n') {
        Some((_, rest)) => rest,
        None => "",
    }
}
