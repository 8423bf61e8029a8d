use std::collections::HashMap;

use bannerwatch_core::countdown::Remaining;
use once_cell::sync::Lazy;

const FONT_HEIGHT: usize = 7;
const FONT_WIDTH: usize = 5;
const SPACING: usize = 1;
const SHADOW_OFFSET: usize = 1;
const FILL_CHAR: char = '█';
const OUTLINE_CHAR: char = '░';

type Glyph = [&'static str; FONT_HEIGHT];

static GLYPHS: Lazy<HashMap<char, Glyph>> = Lazy::new(|| {
    HashMap::from([
        ('0', [" 111 ", "1   1", "1  11", "1 1 1", "11  1", "1   1", " 111 "]),
        ('1', ["  1  ", " 11  ", "1 1  ", "  1  ", "  1  ", "  1  ", "11111"]),
        ('2', [" 111 ", "1   1", "    1", "   1 ", "  1  ", " 1   ", "11111"]),
        ('3', [" 111 ", "1   1", "    1", "  11 ", "    1", "1   1", " 111 "]),
        ('4', ["   1 ", "  11 ", " 1 1 ", "1  1 ", "11111", "   1 ", "   1 "]),
        ('5', ["11111", "1    ", "1    ", "1111 ", "    1", "1   1", " 111 "]),
        ('6', [" 111 ", "1   1", "1    ", "1111 ", "1   1", "1   1", " 111 "]),
        ('7', ["11111", "    1", "   1 ", "  1  ", " 1   ", "1    ", "1    "]),
        ('8', [" 111 ", "1   1", "1   1", " 111 ", "1   1", "1   1", " 111 "]),
        ('9', [" 111 ", "1   1", "1   1", " 1111", "    1", "1   1", " 111 "]),
        ('D', ["1111 ", "1   1", "1   1", "1   1", "1   1", "1   1", "1111 "]),
        ('H', ["1   1", "1   1", "1   1", "11111", "1   1", "1   1", "1   1"]),
        ('M', ["1   1", "11 11", "1 1 1", "1 1 1", "1   1", "1   1", "1   1"]),
        ('S', [" 111 ", "1   1", "1    ", " 111 ", "    1", "1   1", " 111 "]),
        (':', ["     ", "  1  ", "     ", "     ", "  1  ", "     ", "     "]),
        (' ', ["     ", "     ", "     ", "     ", "     ", "     ", "     "]),
        ('?', [" 111 ", "1   1", "    1", "   1 ", "  1  ", "     ", "  1  "]),
    ])
});

/// Render a countdown as `3D 04:05:06` in the block font.
pub fn render_countdown(remaining: &Remaining) -> Vec<String> {
    render(&remaining.clock())
}

/// Columns needed to render `text`.
pub fn width(text: &str) -> usize {
    let count = text.chars().count();
    if count == 0 {
        return 0;
    }
    count * FONT_WIDTH + (count - 1) * SPACING + SHADOW_OFFSET
}

/// Rows produced by [`render`].
pub const fn height() -> usize {
    FONT_HEIGHT + SHADOW_OFFSET
}

/// Render `text` with a one-cell drop shadow. Unknown characters become `?`.
pub fn render(text: &str) -> Vec<String> {
    let content: Vec<char> = text.chars().map(|c| c.to_ascii_uppercase()).collect();
    if content.is_empty() {
        return vec![String::new(); height()];
    }

    let mut canvas = vec![vec![' '; width(text)]; height()];
    for (index, ch) in content.iter().enumerate() {
        let Some(glyph) = GLYPHS.get(ch).or_else(|| GLYPHS.get(&'?')) else {
            continue;
        };
        paint_glyph(&mut canvas, glyph, index * (FONT_WIDTH + SPACING));
    }

    canvas
        .into_iter()
        .map(|row| row.into_iter().collect::<String>().trim_end().to_string())
        .collect()
}

fn paint_glyph(canvas: &mut [Vec<char>], glyph: &Glyph, x_offset: usize) {
    for (row_idx, row) in glyph.iter().enumerate() {
        for (col_idx, symbol) in row.chars().enumerate() {
            if symbol != '1' {
                continue;
            }
            let x = x_offset + col_idx;
            place(canvas, row_idx + SHADOW_OFFSET, x + SHADOW_OFFSET, OUTLINE_CHAR);
            place(canvas, row_idx, x, FILL_CHAR);
        }
    }
}

fn place(canvas: &mut [Vec<char>], y: usize, x: usize, ch: char) {
    if y >= canvas.len() || x >= canvas[y].len() {
        return;
    }
    let cell = &mut canvas[y][x];
    if *cell == ' ' || (*cell == OUTLINE_CHAR && ch == FILL_CHAR) {
        *cell = ch;
    }
}
