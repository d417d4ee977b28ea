//! Media extraction: asset references in raw passage bodies become `storeMediaFile`
//! uploads. Anki resolves media by bare file name at render time, which is why the
//! transform strips the `assets/` prefix.

use std::path::Path;

use serde_json::json;

use crate::batch::Action;
use crate::contract::Passage;
use crate::transform::asset_link_regex;

/// A file to copy into Anki's media folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub filename: String,
    pub path: String,
}

/// Asset file names referenced as `(assets/<asset>)` in `text`, in order of appearance.
pub fn asset_names(text: &str) -> Vec<String> {
    asset_link_regex()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Uploads for the own and parent bodies of each passage. Files are not checked for
/// existence and repeats are kept: storing the same name twice overwrites in place.
pub fn collect_uploads<'a, I>(passages: I, assets_dir: &Path) -> Vec<MediaUpload>
where
    I: IntoIterator<Item = &'a Passage>,
{
    passages
        .into_iter()
        .flat_map(|p| {
            let mut names = asset_names(&p.markdown);
            names.extend(asset_names(&p.parent_markdown));
            names
        })
        .map(|filename| MediaUpload {
            path: assets_dir.join(&filename).to_string_lossy().into_owned(),
            filename,
        })
        .collect()
}

pub fn store_media_action(uploads: &[MediaUpload]) -> Option<Action> {
    if uploads.is_empty() {
        return None;
    }
    let actions = uploads
        .iter()
        .map(|u| {
            Action::new(
                "storeMediaFile",
                json!({ "filename": u.filename, "path": u.path }),
            )
        })
        .collect();
    Some(Action::multi(actions))
}
