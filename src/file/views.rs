//! Derived views over a user's drive.
//!
//! These are pure functions over records already scoped to one user (as
//! returned by `list_files_by_user` / `list_folders_by_user`). Nothing here
//! is persisted.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

use super::{FileMetadata, Folder, FolderWithStats, Share, RECENT_DAYS};

fn recent_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(RECENT_DAYS)
}

/// Non-trashed files accessed within the recent window, newest access first.
pub fn recent_files(files: &[FileMetadata], now: DateTime<Utc>) -> Vec<FileMetadata> {
    let cutoff = recent_cutoff(now);
    let mut recent: Vec<FileMetadata> = files
        .iter()
        .filter(|f| !f.in_trash && f.last_accessed_at >= cutoff)
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
    recent
}

/// Non-trashed folders modified within the recent window, newest first.
pub fn recent_folders(folders: &[Folder], now: DateTime<Utc>) -> Vec<Folder> {
    let cutoff = recent_cutoff(now);
    let mut recent: Vec<Folder> = folders
        .iter()
        .filter(|f| !f.in_trash && f.modified_at >= cutoff)
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
    recent
}

pub fn starred_files(files: &[FileMetadata]) -> Vec<FileMetadata> {
    files
        .iter()
        .filter(|f| f.starred && !f.in_trash)
        .cloned()
        .collect()
}

pub fn starred_folders(folders: &[Folder]) -> Vec<Folder> {
    folders
        .iter()
        .filter(|f| f.starred && !f.in_trash)
        .cloned()
        .collect()
}

/// Files that appear in `shares` or carry the shared flag.
pub fn shared_files(files: &[FileMetadata], shares: &[Share]) -> Vec<FileMetadata> {
    let shared_ids: HashSet<i64> = shares.iter().filter_map(|s| s.target.file_id()).collect();
    files
        .iter()
        .filter(|f| !f.in_trash && (f.is_shared || shared_ids.contains(&f.id)))
        .cloned()
        .collect()
}

/// Folders that appear in `shares` or carry the shared flag.
pub fn shared_folders(folders: &[Folder], shares: &[Share]) -> Vec<Folder> {
    let shared_ids: HashSet<i64> = shares
        .iter()
        .filter_map(|s| s.target.folder_id())
        .collect();
    folders
        .iter()
        .filter(|f| !f.in_trash && (f.is_shared || shared_ids.contains(&f.id)))
        .cloned()
        .collect()
}

pub fn trashed_files(files: &[FileMetadata]) -> Vec<FileMetadata> {
    files.iter().filter(|f| f.in_trash).cloned().collect()
}

pub fn trashed_folders(folders: &[Folder]) -> Vec<Folder> {
    folders.iter().filter(|f| f.in_trash).cloned().collect()
}

/// Attach direct-child file totals to a single folder.
pub fn with_stats(folder: Folder, files: &[FileMetadata]) -> FolderWithStats {
    let (file_count, total_size) = files
        .iter()
        .filter(|f| !f.in_trash && f.folder_id == Some(folder.id))
        .fold((0, 0), |(count, size), f| (count + 1, size + f.size));
    FolderWithStats {
        folder,
        file_count,
        total_size,
    }
}

/// Attach direct-child file totals to each folder, preserving order.
pub fn folder_stats(folders: Vec<Folder>, files: &[FileMetadata]) -> Vec<FolderWithStats> {
    let mut totals: HashMap<i64, (i64, i64)> = HashMap::new();
    for file in files.iter().filter(|f| !f.in_trash) {
        if let Some(folder_id) = file.folder_id {
            let entry = totals.entry(folder_id).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += file.size;
        }
    }

    folders
        .into_iter()
        .map(|folder| {
            let (file_count, total_size) = totals.get(&folder.id).copied().unwrap_or((0, 0));
            FolderWithStats {
                folder,
                file_count,
                total_size,
            }
        })
        .collect()
}

/// Drop trashed folders, every folder beneath one, and the files they hold.
///
/// Trashing flags only the folder itself, so its contents must be hidden
/// here before the starred, recent and shared filters run.
pub fn outside_trash(
    files: Vec<FileMetadata>,
    folders: Vec<Folder>,
) -> (Vec<FileMetadata>, Vec<Folder>) {
    let hidden: HashSet<i64> = folders
        .iter()
        .filter(|f| f.in_trash)
        .flat_map(|f| descendant_folder_ids(&folders, f.id))
        .collect();

    let files = files
        .into_iter()
        .filter(|f| !f.folder_id.is_some_and(|id| hidden.contains(&id)))
        .collect();
    let folders = folders
        .into_iter()
        .filter(|f| !hidden.contains(&f.id))
        .collect();
    (files, folders)
}

/// Ids of `root` and every folder beneath it, parents before children.
///
/// Walks breadth-first with a visited set, so malformed parent links that
/// form a loop still terminate.
pub fn descendant_folder_ids(folders: &[Folder], root: i64) -> Vec<i64> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for folder in folders {
        if let Some(parent_id) = folder.parent_id {
            children.entry(parent_id).or_default().push(folder.id);
        }
    }

    let mut visited = HashSet::from([root]);
    let mut order = vec![root];
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        for &child in children.get(&id).map(Vec::as_slice).unwrap_or_default() {
            if visited.insert(child) {
                order.push(child);
                queue.push_back(child);
            }
        }
    }
    order
}
