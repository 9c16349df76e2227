//! Paper text extraction
//!
//! The analyst agent reads papers through the [`DocumentReader`] trait.
//! [`PlainTextReader`] handles UTF-8 text renditions of papers, with pages
//! separated by form feeds (the layout `pdftotext` produces).

use crate::{GrantFlowError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pages scanned for the abstract and section headings
const FRONT_MATTER_PAGES: usize = 3;

/// Abstracts shorter than this are treated as a false match
const MIN_ABSTRACT_CHARS: usize = 50;
const MAX_ABSTRACT_CHARS: usize = 1000;

const PAGE_BREAK: char = '\u{0c}';

const SECTION_NAMES: &[&str] = &[
    "introduction",
    "background",
    "related work",
    "methodology",
    "method",
    "methods",
    "approach",
    "experiment",
    "experiments",
    "result",
    "results",
    "evaluation",
    "discussion",
    "conclusion",
    "conclusions",
    "references",
];

/// Bibliographic metadata recovered from a paper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Summary of a paper used to seed the analysis prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperInfo {
    pub metadata: PaperMetadata,
    pub num_pages: usize,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub sections: Vec<String>,
    pub file_path: PathBuf,
    pub file_size: u64,
}

/// Source of paper text
pub trait DocumentReader: Send + Sync {
    /// Metadata, page count, abstract and section headings
    fn get_paper_info(&self, path: &Path) -> Result<PaperInfo>;

    /// Full text, optionally limited to the first `max_pages` pages
    fn extract_text(&self, path: &Path, max_pages: Option<usize>) -> Result<String>;
}

/// Reader for plain-text paper renditions
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextReader;

impl PlainTextReader {
    pub fn new() -> Self {
        Self
    }

    fn read_pages(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(GrantFlowError::DocumentNotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let text = String::from_utf8(bytes).map_err(|_| {
            GrantFlowError::Document(format!("{} is not UTF-8 text", path.display()))
        })?;

        let pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
        debug!(path = %path.display(), pages = pages.len(), chars = text.len(), "Read paper text");
        Ok(pages)
    }
}

impl DocumentReader for PlainTextReader {
    fn get_paper_info(&self, path: &Path) -> Result<PaperInfo> {
        let pages = self.read_pages(path)?;
        let front_matter = pages
            .iter()
            .take(FRONT_MATTER_PAGES)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(PaperInfo {
            metadata: extract_metadata(&front_matter),
            num_pages: pages.len(),
            abstract_text: extract_abstract(&front_matter),
            sections: extract_sections(&front_matter),
            file_path: path.to_path_buf(),
            file_size: fs::metadata(path)?.len(),
        })
    }

    fn extract_text(&self, path: &Path, max_pages: Option<usize>) -> Result<String> {
        let pages = self.read_pages(path)?;
        let limit = max_pages.unwrap_or(pages.len());
        Ok(pages
            .iter()
            .take(limit)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn extract_metadata(text: &str) -> PaperMetadata {
    let title = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from);

    let author = text.lines().map(str::trim).find_map(|line| {
        let lower = line.to_lowercase();
        ["authors:", "author:"]
            .iter()
            .find(|prefix| lower.starts_with(*prefix))
            .map(|prefix| line[prefix.len()..].trim().to_string())
            .filter(|author| !author.is_empty())
    });

    PaperMetadata { title, author }
}

/// Paragraph following an "Abstract" heading, whitespace-collapsed
fn extract_abstract(text: &str) -> String {
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        if !lower.starts_with("abstract") {
            continue;
        }

        // Text may continue on the heading line after a separator
        let rest = trimmed["abstract".len()..]
            .trim_start_matches([':', '-', '—', '.'])
            .trim();

        let mut parts = Vec::new();
        if !rest.is_empty() {
            parts.push(rest.to_string());
        }

        for next in lines.by_ref() {
            let next = next.trim();
            if next.is_empty() {
                if parts.is_empty() {
                    continue;
                }
                break;
            }
            if is_section_heading(next) {
                break;
            }
            parts.push(next.to_string());
        }

        let collapsed = parts
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let abstract_text: String = collapsed.chars().take(MAX_ABSTRACT_CHARS).collect();
        if abstract_text.chars().count() > MIN_ABSTRACT_CHARS {
            return abstract_text;
        }
    }

    String::new()
}

fn section_name(line: &str) -> Option<&str> {
    let stripped = line
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.')
        .trim();
    let lower = stripped.to_lowercase();
    SECTION_NAMES
        .iter()
        .any(|name| *name == lower)
        .then_some(stripped)
}

fn is_section_heading(line: &str) -> bool {
    section_name(line).is_some()
}

fn extract_sections(text: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    for name in text.lines().filter_map(section_name) {
        let titled = title_case(name);
        if !sections.iter().any(|s| s.eq_ignore_ascii_case(&titled)) {
            sections.push(titled);
        }
    }
    sections
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PAPER: &str = "Attention Is All You Need\n\
Authors: Vaswani, Shazeer, Parmar\n\
\n\
Abstract\n\
The dominant sequence transduction models are based on complex recurrent or\n\
convolutional neural networks. We propose a new simple network architecture.\n\
\n\
1 Introduction\n\
Recurrent neural networks have been firmly established.\n\
\u{0c}2 Background\n\
Reducing sequential computation.\n\
\u{0c}3 Results\n\
We achieve 28.4 BLEU.\n\
\u{0c}4 Conclusion\n\
Done.\n";

    fn paper_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_paper_info() {
        let file = paper_file(PAPER);
        let info = PlainTextReader::new().get_paper_info(file.path()).unwrap();

        assert_eq!(info.num_pages, 4);
        assert_eq!(
            info.metadata.title.as_deref(),
            Some("Attention Is All You Need")
        );
        assert_eq!(
            info.metadata.author.as_deref(),
            Some("Vaswani, Shazeer, Parmar")
        );
        assert!(info
            .abstract_text
            .starts_with("The dominant sequence transduction models"));
        assert!(info.abstract_text.ends_with("network architecture."));
        // Only the first three pages are scanned for headings
        assert_eq!(info.sections, vec!["Introduction", "Background", "Results"]);
        assert_eq!(info.file_size, PAPER.len() as u64);
    }

    #[test]
    fn test_extract_text_page_limit() {
        let file = paper_file(PAPER);
        let reader = PlainTextReader::new();

        let all = reader.extract_text(file.path(), None).unwrap();
        assert!(all.contains("28.4 BLEU"));
        assert!(all.contains("Done."));
        assert!(!all.contains('\u{0c}'));

        let first = reader.extract_text(file.path(), Some(1)).unwrap();
        assert!(first.contains("Introduction"));
        assert!(!first.contains("Background"));
    }

    #[test]
    fn test_missing_file() {
        let err = PlainTextReader::new()
            .extract_text(Path::new("/nonexistent/paper.txt"), None)
            .unwrap_err();
        assert!(matches!(err, GrantFlowError::DocumentNotFound(_)));
    }

    #[test]
    fn test_non_utf8_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0xfd]).unwrap();
        let err = PlainTextReader::new()
            .get_paper_info(file.path())
            .unwrap_err();
        assert!(matches!(err, GrantFlowError::Document(_)));
    }

    #[test]
    fn test_inline_abstract_heading() {
        let text = "Title\n\nAbstract: We study a very particular problem in considerable depth and report results.\n\n1. Introduction\n";
        let abstract_text = extract_abstract(text);
        assert!(abstract_text.starts_with("We study"));
    }

    #[test]
    fn test_short_abstract_is_ignored() {
        assert_eq!(extract_abstract("Abstract\nToo short.\n"), "");
        assert_eq!(extract_abstract("no heading at all"), "");
    }

    #[test]
    fn test_paper_info_serializes_abstract_key() {
        let file = paper_file(PAPER);
        let info = PlainTextReader::new().get_paper_info(file.path()).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert!(json["abstract"].is_string());
        assert_eq!(json["metadata"]["title"], "Attention Is All You Need");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("related WORK"), "Related Work");
    }
}
