//! FASTA / FASTQ sequence parsing.

use crate::error::{ErrorCode, Result, TaxaError};

/// One sequence read from an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSequence {
    /// First whitespace-separated token of the header
    pub id: String,
    /// Concatenated nucleotide lines
    pub sequence: String,
}

fn flush(record: Option<ParsedSequence>, out: &mut Vec<ParsedSequence>) {
    if let Some(record) = record.filter(|r| !r.sequence.is_empty()) {
        out.push(record);
    }
}

fn is_nucleotide_line(line: &str) -> bool {
    line.chars()
        .all(|c| matches!(c, 'A' | 'C' | 'G' | 'T' | 'N' | 'a' | 'c' | 'g' | 't' | 'n'))
}

/// Parse FASTA (`>`) and FASTQ (`@`) records.
///
/// Lines containing anything other than `ACGTN` (either case) are ignored, as
/// are FASTQ separator and quality lines. Records without sequence data are
/// dropped. An input with no usable record is an error.
pub fn parse_sequences(content: &str) -> Result<Vec<ParsedSequence>> {
    let mut sequences = Vec::new();
    let mut current: Option<ParsedSequence> = None;
    let mut skip_quality = false;

    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if skip_quality {
            skip_quality = false;
            continue;
        }

        if let Some(header) = line.strip_prefix('>').or_else(|| line.strip_prefix('@')) {
            flush(current.take(), &mut sequences);
            current = header.split_whitespace().next().map(|id| ParsedSequence {
                id: id.to_string(),
                sequence: String::new(),
            });
        } else if line.starts_with('+') {
            skip_quality = true;
        } else if let Some(record) = current.as_mut() {
            if is_nucleotide_line(line) {
                record.sequence.push_str(line);
            }
        }
    }
    flush(current.take(), &mut sequences);

    if sequences.is_empty() {
        return Err(TaxaError::new(
            ErrorCode::NoSequencesFound,
            "No valid sequences found in file",
        ));
    }
    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fasta() {
        let input = ">seq1 sample description\nACGT\nacgtn\n\n>seq2\nGGCC\n";
        let parsed = parse_sequences(input).unwrap();
        assert_eq!(
            parsed,
            vec![
                ParsedSequence { id: "seq1".into(), sequence: "ACGTacgtn".into() },
                ParsedSequence { id: "seq2".into(), sequence: "GGCC".into() },
            ]
        );
    }

    #[test]
    fn test_parse_fastq_skips_quality() {
        let input = "@read1 lane=1\nACGTACGT\n+\n@@@@IIII\n@read2\nTTTT\n+read2\nACGT\n";
        let parsed = parse_sequences(input).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].sequence, "ACGTACGT");
        // A quality line that happens to look like bases is still skipped.
        assert_eq!(parsed[1].sequence, "TTTT");
    }

    #[test]
    fn test_invalid_lines_are_ignored() {
        let input = ">seq1\nACGU\nACGT\n>empty\nXYZ\n";
        let parsed = parse_sequences(input).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].sequence, "ACGT");
    }

    #[test]
    fn test_empty_input_is_error() {
        let err = parse_sequences("just some text\n").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoSequencesFound);
        assert!(parse_sequences("").is_err());
    }
}
