use super::language;
use super::{split_lines, tail_lines, Chunk, ChunkType, LineBuffer, MAX_CHUNK_SIZE, OVERLAP_LINES};

/// Line-based chunking with a fixed size bound and overlapping windows.
///
/// Used for files without syntax support and as the safety net when
/// extraction fails or finds nothing. Whitespace-only content yields no chunks.
pub fn fallback_chunks(file_path: &str, content: &str) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let language = language::tag_for(file_path);
    let lines = split_lines(content);
    let make_chunk = |content: String, start_line: usize, end_line: usize| Chunk {
        file_path: file_path.to_string(),
        content,
        start_line,
        end_line,
        chunk_type: ChunkType::Other,
        name: None,
        language: language.to_string(),
    };

    if content.chars().count() <= MAX_CHUNK_SIZE {
        return vec![make_chunk(content.to_string(), 1, lines.len())];
    }

    let mut chunks = Vec::new();
    let mut buffer = LineBuffer::default();
    let mut chunk_start_line = 1;

    for (index, line) in lines.iter().enumerate() {
        let line_number = index + 1;

        if buffer.len_with(line) > MAX_CHUNK_SIZE && !buffer.is_empty() {
            let finished = buffer.take();
            let overlap = tail_lines(&finished, OVERLAP_LINES);
            if !finished.trim().is_empty() {
                chunks.push(make_chunk(finished, chunk_start_line, line_number - 1));
            }

            buffer = LineBuffer::seeded(format!("{}\n{}", overlap, line));
            chunk_start_line = line_number.saturating_sub(OVERLAP_LINES).max(1);
        } else {
            buffer.push_line(line);
        }
    }

    if !buffer.as_str().trim().is_empty() {
        chunks.push(make_chunk(buffer.take(), chunk_start_line, lines.len()));
    }

    chunks
}
