/// Name prefix used by the release group we mirror. Matching is done on the
/// lower-cased display name.
pub const NAME_PREFIX: &str = "[horriblesubs]";

pub fn has_source_prefix(name: &str) -> bool {
    name.to_lowercase().starts_with(NAME_PREFIX)
}

/// Derive index tags from a torrent's display name: a category tag for the
/// known release group plus at most one resolution tag, highest first.
pub fn generate_tags(name: &str) -> Vec<String> {
    let name = name.to_lowercase();
    let mut tags = Vec::new();

    if name.starts_with(NAME_PREFIX) {
        tags.push("horriblesubs".to_string());
    }

    if name.contains("[1080p]") {
        tags.push("1080p".to_string());
    } else if name.contains("[720p]") {
        tags.push("720p".to_string());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::{generate_tags, has_source_prefix};

    #[test]
    fn prefix_match_is_case_insensitive() {
        assert!(has_source_prefix("[HorribleSubs] X"));
        assert!(has_source_prefix("[horriblesubs] x"));
        assert!(!has_source_prefix("X [HorribleSubs]"));
        assert!(!has_source_prefix("[SomeOtherGroup] X"));
    }

    #[test]
    fn resolution_tag_prefers_1080p() {
        let tags = generate_tags("[HorribleSubs] Show - 01 [1080p].mkv");
        assert_eq!(tags, vec!["horriblesubs", "1080p"]);

        let tags = generate_tags("[HorribleSubs] Show - 01 [1080p][720p].mkv");
        assert_eq!(tags, vec!["horriblesubs", "1080p"]);
    }

    #[test]
    fn resolution_tag_falls_back_to_720p() {
        let tags = generate_tags("[HorribleSubs] Show - 01 [720p].mkv");
        assert_eq!(tags, vec!["horriblesubs", "720p"]);
    }

    #[test]
    fn no_resolution_marker_yields_no_resolution_tag() {
        let tags = generate_tags("[HorribleSubs] Show - 01.mkv");
        assert_eq!(tags, vec!["horriblesubs"]);
    }

    #[test]
    fn unknown_group_gets_no_category_tag() {
        let tags = generate_tags("Some.Show.S01E01.[1080p].mkv");
        assert_eq!(tags, vec!["1080p"]);
    }
}
