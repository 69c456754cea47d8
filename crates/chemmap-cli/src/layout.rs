// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

pub const LOG_FILE_NAME: &str = "log.txt";

/// `<root>/output_<YYYY-MM-DD_HHMM>`; runs started in the same minute share
/// a directory.
#[must_use]
pub fn run_output_dir(root: &Path, started: NaiveDateTime) -> PathBuf {
    root.join(format!("output_{}", started.format("%Y-%m-%d_%H%M")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn output_dir_is_named_by_start_minute() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 7)
            .and_then(|d| d.and_hms_opt(9, 5, 59))
            .expect("timestamp");
        assert_eq!(
            run_output_dir(Path::new("runs"), started),
            PathBuf::from("runs/output_2024-03-07_0905")
        );
    }
}
