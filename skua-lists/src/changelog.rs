//! A single-pass Debian changelog parser. Unlike the stanza lexer this one
//! recovers: parsing stops at the first malformed entry and everything
//! before it is returned, with the reason recorded.

use chrono::{DateTime, FixedOffset};

#[derive(Debug, Clone)]
pub struct ChangelogEntry {
    pub source: String,
    pub version: String,
    pub distributions: Vec<String>,
    pub urgency: Option<String>,
    pub maintainer: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
    pub changes: Vec<String>,
}

#[derive(Debug)]
pub struct Changelog {
    pub entries: Vec<ChangelogEntry>,
    /// Why parsing stopped early, if it did.
    pub truncated: Option<String>,
}

/// Parse a changelog buffer into its entries, newest first as written.
pub fn parse_changelog(input: &str) -> Changelog {
    let mut entries = Vec::new();
    let mut truncated = None;
    let mut current: Option<ChangelogEntry> = None;

    for line in input.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix(" --") {
            let Some(mut entry) = current.take() else {
                truncated = Some("trailer line outside an entry".to_string());
                break;
            };
            parse_trailer(rest, &mut entry);
            entries.push(entry);
        } else if line.starts_with([' ', '\t']) {
            let Some(entry) = current.as_mut() else {
                truncated = Some("change line outside an entry".to_string());
                break;
            };
            entry.changes.push(line.trim_end().to_string());
        } else {
            if current.is_some() {
                truncated = Some(format!("entry interrupted by header: {line}"));
                break;
            }
            match parse_header(line) {
                Some(entry) => current = Some(entry),
                None => {
                    truncated = Some(format!("malformed header line: {line}"));
                    break;
                }
            }
        }
    }

    if current.is_some() && truncated.is_none() {
        truncated = Some("unterminated trailing entry".to_string());
    }

    Changelog { entries, truncated }
}

// `source (version) dist1 dist2; urgency=medium`
fn parse_header(line: &str) -> Option<ChangelogEntry> {
    let (source, rest) = line.split_once(' ')?;
    if source.is_empty() {
        return None;
    }

    let rest = rest.trim_start().strip_prefix('(')?;
    let (version, rest) = rest.split_once(')')?;
    if version.is_empty() {
        return None;
    }

    let (dists, meta) = rest.split_once(';')?;
    let urgency = meta
        .split(',')
        .find_map(|kv| kv.trim().strip_prefix("urgency="))
        .map(|u| u.to_string());

    Some(ChangelogEntry {
        source: source.to_string(),
        version: version.to_string(),
        distributions: dists.split_whitespace().map(str::to_string).collect(),
        urgency,
        maintainer: None,
        date: None,
        changes: Vec::new(),
    })
}

// ` -- John Doe <jd@example.org>  Thu, 02 May 2013 12:00:00 -0400`, with a
// double space between maintainer and date.
fn parse_trailer(rest: &str, entry: &mut ChangelogEntry) {
    let rest = rest.trim_start();
    let (maintainer, date) = match rest.split_once("  ") {
        Some((m, d)) => (m, Some(d)),
        None => (rest, None),
    };
    if !maintainer.is_empty() {
        entry.maintainer = Some(maintainer.to_string());
    }
    entry.date = date.and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok());
}

#[cfg(test)]
mod test {
    use super::parse_changelog;

    const WELL_FORMED: &str = "\
fish (3.7.1-1) unstable; urgency=medium

  * New upstream release.
  * Drop patch applied upstream.

 -- Jane Maintainer <jane@example.org>  Thu, 02 May 2024 12:00:00 -0400

fish (3.7.0-2) unstable; urgency=low

  * Rebuild against new pcre2.

 -- Jane Maintainer <jane@example.org>  Mon, 08 Jan 2024 09:30:00 +0100
";

    #[test]
    fn test_well_formed() {
        let log = parse_changelog(WELL_FORMED);
        assert!(log.truncated.is_none());
        assert_eq!(log.entries.len(), 2);

        let newest = &log.entries[0];
        assert_eq!(newest.source, "fish");
        assert_eq!(newest.version, "3.7.1-1");
        assert_eq!(newest.distributions, ["unstable"]);
        assert_eq!(newest.urgency.as_deref(), Some("medium"));
        assert_eq!(
            newest.maintainer.as_deref(),
            Some("Jane Maintainer <jane@example.org>")
        );
        assert!(newest.date.is_some());
        assert_eq!(newest.changes.len(), 2);
    }

    #[test]
    fn test_partial_recovery() {
        let broken = format!("{WELL_FORMED}\nthis is not a changelog header\n");
        let log = parse_changelog(&broken);
        assert_eq!(log.entries.len(), 2);
        assert!(log.truncated.is_some());
    }

    #[test]
    fn test_unterminated_entry_dropped() {
        let log = parse_changelog("fish (1.0-1) unstable; urgency=low\n\n  * change\n");
        assert!(log.entries.is_empty());
        assert!(log.truncated.is_some());
    }
}
