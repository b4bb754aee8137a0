//! Fixed-size text chunking with overlap

use studymate_core::{Chunk, Error, PipelineConfig, Result};

/// Splits document text into overlapping fixed-size character windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker; `size` must be positive and `overlap` smaller than `size`
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        validate(size, overlap)?;
        Ok(Self { size, overlap })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        split(text, self.size, self.overlap)
    }

    /// Distance between the starts of consecutive chunks
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }
}

/// Split `text` into chunks of `size` characters, consecutive chunks sharing `overlap` characters.
///
/// Offsets are character offsets, not byte offsets. Splitting stops at the
/// first chunk that reaches the end of the text. Whitespace-only chunks are
/// dropped and the kept chunks are numbered `0..n` in document order, so a
/// chunk's `index` is also its position in the returned vector.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate(size, overlap)?;
    Ok(split(text, size, overlap))
}

fn validate(size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(Error::Configuration("chunk size must be greater than 0".to_string()));
    }
    if overlap >= size {
        return Err(Error::Configuration(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, size
        )));
    }
    Ok(())
}

fn split(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, including the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + size).min(char_len);
        let slice = &text[boundaries[start]..boundaries[end]];

        if !slice.trim().is_empty() {
            chunks.push(Chunk {
                index: chunks.len(),
                text: slice.to_string(),
                char_start: start,
                char_end: end,
            });
        }

        if end == char_len {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ranges(chunks: &[Chunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.char_start, c.char_end)).collect()
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunks = chunk("", 1000, 200).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_three_chunks_for_2500_chars() {
        let text = "a".repeat(2500);
        let chunks = chunk(&text, 1000, 200).unwrap();
        assert_eq!(ranges(&chunks), vec![(0, 1000), (800, 1800), (1600, 2500)]);
        assert_eq!(chunks[2].text.len(), 900);
        assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk("Mitochondria are the powerhouse of the cell.", 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].char_start, 0);
        assert_eq!(chunks[0].char_end, 44);
    }

    #[test]
    fn test_exact_multiple_does_not_emit_tail() {
        let text = "b".repeat(1000);
        let chunks = chunk(&text, 1000, 200).unwrap();
        assert_eq!(ranges(&chunks), vec![(0, 1000)]);
    }

    #[test]
    fn test_whitespace_chunks_dropped_and_renumbered() {
        // Windows [4, 8) and [8, 12) are all spaces
        let text = "abcd        efgh";
        let chunks = chunk(text, 4, 0).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "abcd");
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].text, "efgh");
        assert_eq!((chunks[1].char_start, chunks[1].char_end), (12, 16));
    }

    #[test]
    fn test_offsets_count_characters_not_bytes() {
        let text = "ééééé";
        let chunks = chunk(text, 3, 1).unwrap();
        assert_eq!(ranges(&chunks), vec![(0, 3), (2, 5)]);
        assert_eq!(chunks[0].text, "ééé");
        assert_eq!(chunks[1].text, "ééé");
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(chunk("text", 0, 0), Err(Error::Configuration(_))));
        assert!(matches!(chunk("text", 10, 10), Err(Error::Configuration(_))));
        assert!(TextChunker::new(10, 11).is_err());
    }

    #[test]
    fn test_chunker_from_config() {
        let chunker = TextChunker::from_config(&PipelineConfig::default()).unwrap();
        assert_eq!(chunker.step(), 800);
        assert_eq!(chunker.chunk(&"x".repeat(1801)).len(), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_cover_text_with_configured_overlap(
            text in "[a-zA-Z0-9]{1,400}",
            size in 1usize..60,
            overlap_seed in 0usize..60,
        ) {
            let overlap = overlap_seed % size;
            let chunks = chunk(&text, size, overlap).unwrap();
            let len = text.chars().count();

            prop_assert!(!chunks.is_empty());
            prop_assert_eq!(chunks[0].char_start, 0);
            prop_assert_eq!(chunks.last().unwrap().char_end, len);

            for c in &chunks {
                prop_assert!(c.char_start < c.char_end);
                prop_assert!(c.char_len() <= size);
                let expected: String = text.chars().skip(c.char_start).take(c.char_len()).collect();
                prop_assert_eq!(&c.text, &expected);
            }

            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[1].index, pair[0].index + 1);
                prop_assert_eq!(pair[1].char_start, pair[0].char_start + size - overlap);
                prop_assert_eq!(pair[0].char_end - pair[1].char_start, overlap);
            }
        }
    }
}
