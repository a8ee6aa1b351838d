use std::path::PathBuf;

use rayon::prelude::*;
use recordify_syntax::ParseError;
use serde::Serialize;

use crate::pipeline::{convert_source, SourceConversion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConversion {
    pub path: PathBuf,
    pub original: String,
    pub result: Result<SourceConversion, ParseError>,
}

impl FileConversion {
    pub fn is_changed(&self) -> bool {
        self.result.as_ref().is_ok_and(SourceConversion::is_changed)
    }

    /// The converted text, if anything changed.
    pub fn output(&self) -> Option<&str> {
        match &self.result {
            Ok(conversion) if conversion.is_changed() => Some(conversion.output.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub files: usize,
    pub changed_files: usize,
    pub rewritten_classes: usize,
    pub failed_classes: usize,
    pub unparsable_files: usize,
}

/// Convert each file independently. Results come back in input order.
pub fn convert_files(files: Vec<FileInput>) -> Vec<FileConversion> {
    files
        .into_par_iter()
        .map(|file| {
            let result = convert_source(&file.text);
            if let Err(err) = &result {
                tracing::warn!(
                    target = "recordify.refactor",
                    path = %file.path.display(),
                    error = %err,
                    "skipping file that could not be parsed"
                );
            }
            FileConversion {
                path: file.path,
                original: file.text,
                result,
            }
        })
        .collect()
}

pub fn summarize(conversions: &[FileConversion]) -> BatchSummary {
    let mut summary = BatchSummary {
        files: conversions.len(),
        ..BatchSummary::default()
    };
    for conversion in conversions {
        match &conversion.result {
            Ok(result) => {
                if result.is_changed() {
                    summary.changed_files += 1;
                }
                for report in &result.reports {
                    match report.outcome.label() {
                        "rewritten" => summary.rewritten_classes += 1,
                        "failed" => summary.failed_classes += 1,
                        _ => {}
                    }
                }
            }
            Err(_) => summary.unparsable_files += 1,
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(path: &str, text: &str) -> FileInput {
        FileInput {
            path: PathBuf::from(path),
            text: text.to_string(),
        }
    }

    #[test]
    fn files_are_converted_independently_and_in_order() {
        let files = vec![
            input("A.java", "class A { private final int a; A(int a) { this.a = a; } }\n"),
            input("Broken.java", "class Broken { /* never closed\n"),
            input("C.java", "class C extends Base {}\n"),
        ];
        let conversions = convert_files(files);

        let paths: Vec<_> = conversions.iter().map(|c| c.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("A.java"),
                PathBuf::from("Broken.java"),
                PathBuf::from("C.java")
            ]
        );
        assert_eq!(conversions[0].output(), Some("record A(int a) {\n}\n"));
        assert!(conversions[1].result.is_err());
        assert_eq!(conversions[2].output(), None);

        assert_eq!(
            summarize(&conversions),
            BatchSummary {
                files: 3,
                changed_files: 1,
                rewritten_classes: 1,
                failed_classes: 0,
                unparsable_files: 1,
            }
        );
    }
}
