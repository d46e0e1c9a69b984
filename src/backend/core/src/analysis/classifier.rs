//! Deterministic mock taxonomic classifier.
//!
//! Every score is derived from a SHA-256 digest of the sequence, so the same
//! input always yields the same report.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{Duration, Instant};

use super::fasta::{parse_sequences, ParsedSequence};
use super::{AnalysisMetadata, AnalysisReport, Analyzer, SequenceRecord, TaxonomyGroup};
use crate::error::{ErrorContext, Result};
use crate::queue::worker::ProgressReporter;
use crate::queue::Job;

const LINEAGES: [&str; 10] = [
    "Eukaryota;Amorphea;Obazoa;Opisthokonta;Holozoa;Choanozoa;Metazoa;Animalia",
    "Eukaryota;Diaphoretickes;SAR;Alveolata;Dinoflagellata",
    "Eukaryota;Diaphoretickes;Archaeplastida;Chlorophyta;Chlorophyceae",
    "Eukaryota;Amorphea;Obazoa;Opisthokonta;Nucletmycea;Fungi;Basidiomycota",
    "Eukaryota;Diaphoretickes;Archaeplastida;Rhodophyta",
    "Eukaryota;Diaphoretickes;SAR;Stramenopiles;Bacillariophyta",
    "Eukaryota;Cryptophyceae",
    "Bacteria;Proteobacteria",
    "Bacteria;Bacteroidetes",
    "Archaea;Euryarchaeota",
];

/// Keyword found in a lineage rank, and the summary group it maps to.
const GROUP_KEYWORDS: [(&str, &str); 11] = [
    ("Metazoa", "Metazoa"),
    ("Animalia", "Metazoa"),
    ("Alveolata", "Alveolata"),
    ("Dinoflagellata", "Alveolata"),
    ("Chlorophyta", "Chlorophyta"),
    ("Fungi", "Fungi"),
    ("Rhodophyta", "Rhodophyta"),
    ("Stramenopiles", "Stramenopiles"),
    ("Bacteria", "Bacteria"),
    ("Archaea", "Archaea"),
    ("Cryptophyta", "Cryptophyta"),
];

const NOVELTY_THRESHOLD: f64 = 0.15;
const NOVEL_STATUS: &str = "POTENTIALLY NOVEL";
const KNOWN_STATUS: &str = "Known";
const UNKNOWN_GROUP: &str = "Unknown";
const NOVEL_GROUP: &str = "Novel";

/// Chart color for a summary group.
pub fn group_color(group: &str) -> &'static str {
    match group {
        "Alveolata" => "#22D3EE",
        "Chlorophyta" => "#10B981",
        "Fungi" => "#A78BFA",
        "Metazoa" => "#F59E0B",
        "Rhodophyta" => "#EC4899",
        "Stramenopiles" => "#8B5CF6",
        "Bacteria" => "#EF4444",
        "Archaea" => "#F97316",
        "Cryptophyta" => "#06B6D4",
        "Haptophyta" => "#14B8A6",
        "Novel" => "#DC2626",
        _ => "#64748B",
    }
}

fn unit_interval(bytes: [u8; 2]) -> f64 {
    f64::from(u16::from_be_bytes(bytes)) / f64::from(u16::MAX)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Major group used for `C<k>` cluster ids: the last rank of long lineages,
/// the root otherwise.
fn cluster_group(lineage: &str) -> &str {
    let ranks: Vec<&str> = lineage.split(';').collect();
    if ranks.len() > 2 {
        ranks[ranks.len() - 1]
    } else {
        ranks[0]
    }
}

fn summary_group(record: &SequenceRecord) -> &'static str {
    if record.status == NOVEL_STATUS {
        return NOVEL_GROUP;
    }
    record
        .taxonomy
        .split(';')
        .map(str::trim)
        .find_map(|rank| {
            GROUP_KEYWORDS
                .iter()
                .find(|(keyword, _)| rank.contains(keyword))
                .map(|(_, group)| *group)
        })
        .unwrap_or(UNKNOWN_GROUP)
}

/// Classify one sequence at index `index` of the upload.
pub fn classify(index: usize, sequence: &ParsedSequence) -> SequenceRecord {
    let digest = Sha256::digest(sequence.sequence.as_bytes());

    let taxonomy = LINEAGES[digest[0] as usize % LINEAGES.len()];
    let confidence = round_to(0.75 + unit_interval([digest[1], digest[2]]) * 0.24, 3);
    let overlap = 70 + digest[3] % 30;
    let novelty_score = round_to(0.05 + unit_interval([digest[4], digest[5]]) * 0.20, 4);
    let is_novel = novelty_score >= NOVELTY_THRESHOLD;

    let cluster = if is_novel {
        format!("N{}", index % 3 + 1)
    } else {
        let group_digest = Sha256::digest(cluster_group(taxonomy).as_bytes());
        format!("C{}", group_digest[0] % 10 + 1)
    };

    SequenceRecord {
        accession: sequence.id.clone(),
        taxonomy: taxonomy.to_string(),
        length: sequence.sequence.len(),
        confidence,
        overlap,
        cluster,
        novelty_score,
        status: if is_novel { NOVEL_STATUS } else { KNOWN_STATUS }.to_string(),
    }
}

/// Group counts, most common first; ties keep first-seen order.
pub fn summarize(records: &[SequenceRecord]) -> Vec<TaxonomyGroup> {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for record in records {
        let group = summary_group(record);
        match counts.iter_mut().find(|(name, _)| *name == group) {
            Some((_, count)) => *count += 1,
            None => counts.push((group, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .map(|(name, value)| TaxonomyGroup {
            name: name.to_string(),
            value,
            color: group_color(name).to_string(),
        })
        .collect()
}

/// Stand-in classifier driven by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct MockClassifier {
    step_delay: Duration,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between pipeline stages, to make queueing observable.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    async fn pause(&self) {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
    }

    /// Analyse in-memory upload bytes.
    pub async fn analyze_bytes(
        &self,
        sample_name: &str,
        bytes: &[u8],
        progress: &ProgressReporter,
    ) -> Result<AnalysisReport> {
        let started = Instant::now();
        let file_sha256 = hex::encode(Sha256::digest(bytes));
        let content = String::from_utf8_lossy(bytes);

        let parsed = parse_sequences(&content)?;
        progress.report(25);
        self.pause().await;

        let sequences: Vec<SequenceRecord> = parsed
            .iter()
            .enumerate()
            .map(|(index, sequence)| classify(index, sequence))
            .collect();
        progress.report(75);
        self.pause().await;

        let taxonomy_summary = summarize(&sequences);
        let mean_confidence =
            sequences.iter().map(|s| s.confidence).sum::<f64>() / sequences.len() as f64;
        let metadata = AnalysisMetadata {
            sample_name: sample_name.to_string(),
            total_sequences: sequences.len(),
            avg_confidence: (mean_confidence * 100.0) as u8,
            novel_sequences: sequences.iter().filter(|s| s.status == NOVEL_STATUS).count(),
            processing_time: format!("{:.2}s", started.elapsed().as_secs_f64()),
            file_sha256,
        };
        progress.report(90);
        self.pause().await;

        tracing::debug!(
            sample = %sample_name,
            sequences = metadata.total_sequences,
            novel = metadata.novel_sequences,
            "Mock classification finished"
        );

        Ok(AnalysisReport {
            metadata,
            taxonomy_summary,
            sequences,
        })
    }
}

#[async_trait]
impl Analyzer for MockClassifier {
    async fn analyze(
        &self,
        job: &Job,
        input: &Path,
        progress: &ProgressReporter,
    ) -> Result<AnalysisReport> {
        let bytes = tokio::fs::read(input)
            .await
            .context(format!("Failed to read staged upload for job {}", job.id))?;
        self.analyze_bytes(&job.filename, &bytes, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobId;

    fn seq(id: &str, bases: &str) -> ParsedSequence {
        ParsedSequence {
            id: id.to_string(),
            sequence: bases.to_string(),
        }
    }

    #[test]
    fn test_classify_is_deterministic_and_in_range() {
        for (i, bases) in ["ACGT", "GGGGCCCC", "ATATATATAT", "NNNNACGT", "TTGACA"]
            .iter()
            .enumerate()
        {
            let a = classify(i, &seq("s", bases));
            let b = classify(i, &seq("s", bases));
            assert_eq!(a, b);

            assert!(LINEAGES.contains(&a.taxonomy.as_str()));
            assert!((0.75..=0.99).contains(&a.confidence));
            assert!((70..=99).contains(&a.overlap));
            assert!((0.05..=0.25).contains(&a.novelty_score));
            assert_eq!(a.length, bases.len());

            if a.novelty_score >= NOVELTY_THRESHOLD {
                assert_eq!(a.status, NOVEL_STATUS);
                assert_eq!(a.cluster, format!("N{}", i % 3 + 1));
            } else {
                assert_eq!(a.status, KNOWN_STATUS);
                assert!(a.cluster.starts_with('C'));
            }
        }
    }

    fn record(taxonomy: &str, status: &str) -> SequenceRecord {
        SequenceRecord {
            accession: "x".into(),
            taxonomy: taxonomy.into(),
            length: 4,
            confidence: 0.9,
            overlap: 90,
            cluster: "C1".into(),
            novelty_score: 0.1,
            status: status.into(),
        }
    }

    #[test]
    fn test_summary_groups_and_order() {
        let records = vec![
            record(LINEAGES[7], KNOWN_STATUS),
            record(LINEAGES[0], KNOWN_STATUS),
            record(LINEAGES[8], KNOWN_STATUS),
            record(LINEAGES[6], KNOWN_STATUS),
            record(LINEAGES[0], NOVEL_STATUS),
        ];
        let summary = summarize(&records);

        assert_eq!(summary[0].name, "Bacteria");
        assert_eq!(summary[0].value, 2);
        assert_eq!(summary[0].color, "#EF4444");
        let names: Vec<&str> = summary.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Bacteria", "Metazoa", "Unknown", "Novel"]);
        assert_eq!(summary[2].color, "#64748B");
    }

    #[test]
    fn test_cluster_group() {
        assert_eq!(cluster_group("Bacteria;Proteobacteria"), "Bacteria");
        assert_eq!(cluster_group(LINEAGES[4]), "Rhodophyta");
    }

    #[tokio::test]
    async fn test_analyze_bytes_report() {
        let classifier = MockClassifier::new();
        let progress = ProgressReporter::detached(JobId::new());
        let input = b">a\nACGTACGT\n>b\nGGCCGGCC\n>c\nTTTTAAAA\n";

        let report = classifier
            .analyze_bytes("reads.fasta", input, &progress)
            .await
            .unwrap();

        assert_eq!(report.metadata.sample_name, "reads.fasta");
        assert_eq!(report.metadata.total_sequences, 3);
        assert_eq!(report.sequences.len(), 3);
        assert_eq!(report.metadata.file_sha256.len(), 64);
        assert!((75..=99).contains(&report.metadata.avg_confidence));
        let counted: usize = report.taxonomy_summary.iter().map(|g| g.value).sum();
        assert_eq!(counted, 3);
    }

    #[tokio::test]
    async fn test_analyze_bytes_rejects_empty_upload() {
        let classifier = MockClassifier::new();
        let progress = ProgressReporter::detached(JobId::new());
        assert!(classifier
            .analyze_bytes("empty.fasta", b"", &progress)
            .await
            .is_err());
    }
}
