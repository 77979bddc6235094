mod code;
mod render;
mod table;

pub use render::render_markdown;

const TAB_WIDTH: usize = 4;

/// Makes a single line of model output safe to hand to the terminal: tabs are
/// expanded and control characters are swapped for their visible Control
/// Pictures glyphs so escape sequences never reach the backend.
pub(crate) fn sanitize_inline(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        push_visible(&mut out, ch);
    }
    out
}

pub(crate) fn push_visible(out: &mut String, ch: char) {
    match ch {
        '\t' => out.extend(std::iter::repeat_n(' ', TAB_WIDTH)),
        '\n' => out.push('\n'),
        c if (c as u32) < 0x20 => {
            // U+2400 block mirrors C0 one-to-one
            out.push(char::from_u32(0x2400 + c as u32).unwrap_or('\u{FFFD}'));
        }
        '\u{7f}' => out.push('\u{2421}'),
        c if ('\u{80}'..='\u{9f}').contains(&c) => out.push('\u{FFFD}'),
        c => out.push(c),
    }
}
