/// The type of a byte offset in the grammar source
pub type Offset = u32;

/// Zero-based line and column, column counted in unicode code points.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LinePos {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets to line/column positions for diagnostic rendering.
pub struct LineMap {
    lines: Vec<Offset>,
}

impl LineMap {
    pub fn new(src: &str) -> Self {
        assert!(src.len() <= Offset::MAX as usize);
        let mut lines = vec![0];
        let mut bytes = src.bytes().enumerate();

        // we recognize \r\n  \n  \r as newlines
        while let Some((mut i, b)) = bytes.next() {
            if let b'\n' | b'\r' = b {
                if b == b'\r' {
                    if let Some((new_i, b'\n')) = bytes.clone().next() {
                        bytes.next();
                        i = new_i;
                    }
                }
                lines.push(i as Offset + 1);
            }
        }

        Self { lines }
    }
    /// Returns the zero-based position of `offset`. Offsets are clamped to the end of `src`.
    pub fn offset_to_pos(&self, src: &str, offset: Offset) -> LinePos {
        let offset = offset.min(src.len() as Offset);
        assert!(src.is_char_boundary(offset as usize));

        let line = match self.lines.binary_search(&offset) {
            Ok(a) => a,
            Err(a) => a - 1,
        };
        let start = self.lines[line];
        let column = src[start as usize..offset as usize].chars().count();

        LinePos {
            line: line.try_into().unwrap(),
            column: column.try_into().unwrap(),
        }
    }
    pub fn line_start(&self, line: u32) -> Offset {
        self.lines[line as usize]
    }
    pub fn line_end(&self, src: &str, line: u32) -> Offset {
        self.lines
            .get(line as usize + 1)
            .copied()
            .unwrap_or_else(|| src.len().try_into().unwrap())
    }
    pub fn line_str<'a>(&self, src: &'a str, line: u32) -> &'a str {
        let start = self.line_start(line);
        let end = self.line_end(src, line);
        &src[start as usize..end as usize]
    }
}
