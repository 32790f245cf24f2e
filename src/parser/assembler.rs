use super::fallback::fallback_chunks;
use super::language::Language;
use super::{split_lines, tail_lines, Chunk, ChunkType, LineBuffer, SyntaxUnit, MAX_CHUNK_SIZE, OVERLAP_LINES};

/// Units below this size are grouped with their neighbours.
pub const SMALL_THRESHOLD: usize = 500;

/// Units above this size are split; a small-unit group never grows past it.
pub const LARGE_THRESHOLD: usize = 2000;

/// Lines collected at most for the restated signature of a split unit.
const SIGNATURE_MAX_LINES: usize = 3;

/// Turn the syntax units of one file into chunks.
///
/// Emits a header chunk for text before the first unit, groups small units,
/// keeps medium units whole and splits large ones. Without units the whole
/// file goes through [`fallback_chunks`].
pub fn assemble(mut units: Vec<SyntaxUnit>, file_path: &str, content: &str, language: Language) -> Vec<Chunk> {
    if units.is_empty() {
        return fallback_chunks(file_path, content);
    }

    units.sort_by_key(|u| u.start_line);

    let mut assembler = Assembler {
        file_path,
        language,
        chunks: Vec::new(),
        group: Vec::new(),
        group_size: 0,
    };

    assembler.push_header(content, units[0].start_line);

    for unit in units {
        let size = unit.size();

        if size < SMALL_THRESHOLD {
            if assembler.group_size + size > LARGE_THRESHOLD {
                assembler.flush_group();
            }
            assembler.group_size += size;
            assembler.group.push(unit);
        } else if size <= LARGE_THRESHOLD {
            assembler.flush_group();
            let chunk = assembler.chunk(
                unit.content,
                unit.start_line,
                unit.end_line,
                ChunkType::from_node_kind(&unit.kind),
                unit.name,
            );
            assembler.chunks.push(chunk);
        } else {
            assembler.flush_group();
            let pieces = split_large_unit(&unit, file_path, language);
            assembler.chunks.extend(pieces);
        }
    }

    assembler.flush_group();
    assembler.chunks
}

struct Assembler<'a> {
    file_path: &'a str,
    language: Language,
    chunks: Vec<Chunk>,
    group: Vec<SyntaxUnit>,
    group_size: usize,
}

impl Assembler<'_> {
    fn chunk(
        &self,
        content: String,
        start_line: usize,
        end_line: usize,
        chunk_type: ChunkType,
        name: Option<String>,
    ) -> Chunk {
        Chunk {
            file_path: self.file_path.to_string(),
            content,
            start_line,
            end_line,
            chunk_type,
            name,
            language: self.language.as_str().to_string(),
        }
    }

    /// Everything above the first unit (imports, module docs, constants).
    fn push_header(&mut self, content: &str, first_unit_start: usize) {
        if first_unit_start <= 1 {
            return;
        }

        let lines = split_lines(content);
        let end = (first_unit_start - 1).min(lines.len());
        let header = lines[..end].join("\n");
        let header = header.trim();
        if header.is_empty() {
            return;
        }

        let chunk = self.chunk(header.to_string(), 1, first_unit_start - 1, ChunkType::Imports, None);
        self.chunks.push(chunk);
    }

    fn flush_group(&mut self) {
        if self.group.is_empty() {
            return;
        }

        let group = std::mem::take(&mut self.group);
        self.group_size = 0;

        let start_line = group[0].start_line;
        let end_line = group[group.len() - 1].end_line;
        let name = match group.as_slice() {
            [only] => only.name.clone(),
            _ => None,
        };
        let content = group
            .iter()
            .map(|u| u.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let chunk = self.chunk(content, start_line, end_line, ChunkType::Other, name);
        self.chunks.push(chunk);
    }
}

/// Declaration header restated at the top of every continuation piece: the
/// unit's first lines up to and including one containing `{` or `:`, capped at
/// three lines.
fn signature(lines: &[&str]) -> String {
    let mut signature = Vec::new();
    for line in lines {
        signature.push(*line);
        if line.contains('{') || line.contains(':') || signature.len() >= SIGNATURE_MAX_LINES {
            break;
        }
    }
    signature.join("\n")
}

/// Split an oversized unit into pieces of roughly [`MAX_CHUNK_SIZE`] characters.
///
/// Every piece after the first starts with a continuation marker naming the
/// unit, the unit's signature and the last lines of the previous piece.
pub fn split_large_unit(unit: &SyntaxUnit, file_path: &str, language: Language) -> Vec<Chunk> {
    let lines = split_lines(&unit.content);
    let signature = signature(&lines);
    let comment = language.line_comment();
    let marker = format!(
        "{} ... continued from {}",
        comment,
        unit.name.as_deref().unwrap_or("above")
    );
    let chunk_type = ChunkType::from_node_kind(&unit.kind);

    let make_chunk = |content: String, start_line: usize, end_line: usize| Chunk {
        file_path: file_path.to_string(),
        content,
        start_line,
        end_line,
        chunk_type,
        name: unit.name.clone(),
        language: language.as_str().to_string(),
    };

    let mut chunks = Vec::new();
    let mut buffer = LineBuffer::default();
    let mut chunk_start_line = unit.start_line;

    for (index, line) in lines.iter().enumerate() {
        if buffer.len_with(line) > MAX_CHUNK_SIZE && !buffer.is_empty() {
            let finished = buffer.take();
            let overlap = tail_lines(&finished, OVERLAP_LINES);
            // Line `index` of the unit is the one that did not fit
            chunks.push(make_chunk(finished, chunk_start_line, unit.start_line + index - 1));

            buffer = LineBuffer::seeded(format!(
                "{}\n{}\n{} ...\n{}\n{}",
                marker, signature, comment, overlap, line
            ));
            chunk_start_line = unit.start_line + index.saturating_sub(OVERLAP_LINES);
        } else {
            buffer.push_line(line);
        }
    }

    if !buffer.as_str().trim().is_empty() {
        chunks.push(make_chunk(buffer.take(), chunk_start_line, unit.end_line));
    }

    chunks
}
