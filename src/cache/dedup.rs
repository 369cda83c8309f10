//! Two-pass merge of records from all discovery sources

use std::collections::{HashMap, HashSet};

use crate::model::AppRecord;

/// Merge records by path, then by name.
///
/// The path pass keeps the first record seen for each lowercased path. The
/// name pass keeps one record per name: a builtin always takes the slot,
/// otherwise a strictly larger executable replaces a non-builtin holder.
/// Output follows the order in which each name first appeared.
pub fn deduplicate(records: Vec<AppRecord>) -> Vec<AppRecord> {
    let mut seen_paths = HashSet::new();
    let path_deduped = records
        .into_iter()
        .filter(|app| seen_paths.insert(app.path.to_lowercase()));

    let mut slots: Vec<AppRecord> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for app in path_deduped {
        match by_name.get(&app.name) {
            None => {
                by_name.insert(app.name.clone(), slots.len());
                slots.push(app);
            }
            Some(&slot) => {
                let existing = &slots[slot];
                if app.is_builtin() || (!existing.is_builtin() && app.size_kb > existing.size_kb) {
                    slots[slot] = app;
                }
            }
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AppSource;

    fn app(name: &str, path: &str, size_kb: u64, source: AppSource) -> AppRecord {
        let exe = path.rsplit('\\').next().unwrap_or(path);
        AppRecord::new(name, exe, path, size_kb, source)
    }

    fn sample() -> Vec<AppRecord> {
        vec![
            app("code", r"C:\Apps\Code\Code.exe", 900, AppSource::StartMenu),
            app("code", r"c:\apps\code\code.exe", 900, AppSource::Disk),
            app("code", r"D:\Portable\Code.exe", 1200, AppSource::Disk),
            app("notepad", r"C:\Tools\notepad.exe", 5000, AppSource::Disk),
            app("notepad", r"C:\Windows\System32\notepad.exe", 200, AppSource::Builtin),
            app("notepad", r"D:\Big\notepad.exe", 9000, AppSource::Disk),
            app("vlc", r"C:\VLC\vlc.exe", 100, AppSource::Disk),
            app("vlc", r"D:\VLC\vlc.exe", 100, AppSource::StartMenu),
        ]
    }

    #[test]
    fn first_path_wins_case_insensitively() {
        let merged = deduplicate(vec![
            app("a", r"C:\X\A.exe", 10, AppSource::StartMenu),
            app("b", r"c:\x\a.exe", 99, AppSource::Disk),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "a");
    }

    #[test]
    fn name_pass_prefers_builtin_then_larger() {
        let merged = deduplicate(sample());
        let names: Vec<&str> = merged.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["code", "notepad", "vlc"]);

        assert_eq!(merged[0].path, r"D:\Portable\Code.exe");
        assert_eq!(merged[1].source, AppSource::Builtin);
        // equal sizes keep the first seen
        assert_eq!(merged[2].path, r"C:\VLC\vlc.exe");
    }

    #[test]
    fn at_most_one_record_per_path_and_name() {
        let merged = deduplicate(sample());
        let paths: HashSet<String> = merged.iter().map(|a| a.path.to_lowercase()).collect();
        let names: HashSet<&str> = merged.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(paths.len(), merged.len());
        assert_eq!(names.len(), merged.len());
    }

    #[test]
    fn builtin_survives_regardless_of_position() {
        let merged = deduplicate(vec![
            app("calc", r"C:\Windows\System32\calc.exe", 0, AppSource::Builtin),
            app("calc", r"D:\Calc\calc.exe", 4000, AppSource::Disk),
        ]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_builtin());
    }

    #[test]
    fn deduplicate_is_idempotent() {
        let once = deduplicate(sample());
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);
    }
}
