//
// utf16.rs
//
// LSP columns count UTF-16 code units; source text is indexed by bytes.
//

/// Byte offset within `line` of a UTF-16 column. Columns past the end clamp
/// to the line length.
pub fn utf16_column_to_byte_offset(line: &str, utf16_col: u32) -> usize {
    let mut utf16_count = 0;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= utf16_col as usize {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    line.len()
}

/// UTF-16 column of a byte offset within `line`.
pub fn byte_offset_to_utf16_column(line: &str, byte_offset: usize) -> u32 {
    let end = byte_offset.min(line.len());
    line.char_indices()
        .take_while(|(idx, _)| *idx < end)
        .map(|(_, ch)| ch.len_utf16() as u32)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_columns_are_bytes() {
        assert_eq!(utf16_column_to_byte_offset("int x;", 4), 4);
        assert_eq!(byte_offset_to_utf16_column("int x;", 4), 4);
        assert_eq!(utf16_column_to_byte_offset("int", 99), 3);
    }

    #[test]
    fn test_multibyte_columns() {
        // 'é' is 2 bytes / 1 unit, '😀' is 4 bytes / 2 units
        let line = "é😀x";
        assert_eq!(utf16_column_to_byte_offset(line, 1), 2);
        assert_eq!(utf16_column_to_byte_offset(line, 3), 6);
        assert_eq!(byte_offset_to_utf16_column(line, 6), 3);
        assert_eq!(byte_offset_to_utf16_column(line, 7), 4);
    }
}
