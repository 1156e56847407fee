//! Playlist routing from chapter categories.

use std::collections::HashSet;

use crate::category;
use crate::upload_config::PlaylistMapping;
use crate::video::Chapter;

/// Distinct non-empty chapter categories, in chapter order (first occurrence wins).
pub fn categories_from_chapters(chapters: &[Chapter]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut categories = Vec::new();
    for chapter in chapters {
        if !chapter.kind.is_empty() && seen.insert(chapter.kind.as_str()) {
            categories.push(chapter.kind.clone());
        }
    }
    categories
}

/// Order mappings by descending priority, keeping insertion order on ties.
pub fn sort_by_priority(mappings: &mut [PlaylistMapping]) {
    mappings.sort_by(|a, b| b.priority.cmp(&a.priority));
}

/// Target playlist ids for a video's categories.
///
/// Mappings are scanned in the order given; callers pass them already sorted
/// by priority. Each mapping contributes its playlist at most once. Two
/// mappings pointing at the same playlist both contribute; see
/// [`dedup_playlist_ids`].
pub fn route_playlists(mappings: &[PlaylistMapping], categories: &[String]) -> Vec<String> {
    mappings
        .iter()
        .filter(|m| {
            categories
                .iter()
                .any(|c| category::matches(&m.category_pattern, c))
        })
        .map(|m| m.playlist_id.clone())
        .collect()
}

/// Drop repeated playlist ids, keeping the first occurrence.
pub fn dedup_playlist_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
