/// Maps byte offsets in a source file to 1-based line numbers.
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    pub fn line(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&x| x <= offset)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_to_one_based_lines() {
        let source = "program t;\nvar x: integer;\n\nbegin end.";
        let index = LineIndex::new(source);

        assert_eq!(index.line(0), 1);
        assert_eq!(index.line(9), 1);
        // the newline itself still belongs to the line it ends
        assert_eq!(index.line(10), 1);
        assert_eq!(index.line(11), 2);
        assert_eq!(index.line(source.find("begin").unwrap()), 4);
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn empty_source_has_one_line() {
        let index = LineIndex::new("");
        assert_eq!(index.line(0), 1);
        assert_eq!(index.line_count(), 1);
    }
}
