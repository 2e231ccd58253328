use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

pub const MESSAGE_FLOWS_FILE: &str = "message_flows.csv";
const PROCESS_TABLE_SUFFIX: &str = "_bpmn.csv";

static UNSAFE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]+").expect("valid regex"));

/// Filesystem-safe form of a participant label: every run of characters
/// other than word characters and `-` becomes a single `_`.
pub fn sanitize_label(label: &str) -> String {
    UNSAFE_RUN_RE.replace_all(label, "_").into_owned()
}

/// `<output_dir>/<sanitized participant>_bpmn.csv`
pub fn process_table_path(output_dir: &Path, participant: &str) -> PathBuf {
    output_dir.join(format!("{}{PROCESS_TABLE_SUFFIX}", sanitize_label(participant)))
}

/// `<output_dir>/message_flows.csv`
pub fn message_flow_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MESSAGE_FLOWS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_labels_unchanged() {
        assert_eq!(sanitize_label("Alice"), "Alice");
        assert_eq!(sanitize_label("QA-Lead_2"), "QA-Lead_2");
    }

    #[test]
    fn unsafe_runs_collapse_to_one_underscore() {
        assert_eq!(sanitize_label("Quality Manager"), "Quality_Manager");
        assert_eq!(sanitize_label("QA / QC  Officer"), "QA_QC_Officer");
        assert_eq!(sanitize_label("Lab (Site #2)"), "Lab_Site_2_");
        assert_eq!(sanitize_label("../etc/passwd"), "_etc_passwd");
    }

    #[test]
    fn unicode_letters_are_kept() {
        assert_eq!(sanitize_label("Responsable qualité"), "Responsable_qualité");
    }

    #[test]
    fn artifact_paths() {
        let dir = Path::new("/out");
        assert_eq!(
            process_table_path(dir, "Quality Manager"),
            PathBuf::from("/out/Quality_Manager_bpmn.csv")
        );
        assert_eq!(message_flow_path(dir), PathBuf::from("/out/message_flows.csv"));
    }
}
