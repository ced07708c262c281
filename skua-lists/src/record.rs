use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use ahash::RandomState;

/// Where a record list came from, derived from the list's file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub uri: String,
    pub distribution: String,
}

/// One parsed stanza. Records are shared between their owning list and any
/// match chain they were filtered into.
#[derive(Debug)]
pub struct Record {
    name: String,
    version: Option<String>,
    status: Option<String>,
    origin: Option<Arc<Origin>>,
}

impl Record {
    pub(crate) fn new(
        name: String,
        version: Option<String>,
        status: Option<String>,
        origin: Option<Arc<Origin>>,
    ) -> Self {
        Record {
            name,
            version,
            status,
            origin,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Present only for records lexed from a status file.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_deref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.origin().map(|o| o.uri.as_str())
    }

    pub fn distribution(&self) -> Option<&str> {
        self.origin().map(|o| o.distribution.as_str())
    }
}

/// Records lexed from one source file. Iteration order carries no meaning:
/// chunks finish in whatever order the workers get to them.
#[derive(Debug)]
pub struct RecordList {
    origin: Option<Arc<Origin>>,
    records: Vec<Arc<Record>>,
    index: OnceLock<HashMap<String, usize, RandomState>>,
}

impl RecordList {
    pub(crate) fn new(origin: Option<Arc<Origin>>, records: Vec<Arc<Record>>) -> Self {
        RecordList {
            origin,
            records,
            index: OnceLock::new(),
        }
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.iter()
    }

    /// Exact-name point lookup, backed by an index built on first use. With
    /// several records of one name (multiple versions) the first lexed wins.
    pub fn find(&self, name: &str) -> Option<&Arc<Record>> {
        let index = self.index.get_or_init(|| {
            let mut map =
                HashMap::with_capacity_and_hasher(self.records.len(), RandomState::new());
            for (i, rec) in self.records.iter().enumerate() {
                map.entry(rec.name().to_string()).or_insert(i);
            }
            map
        });
        index.get(name).map(|&i| &self.records[i])
    }
}

/// Record lists gathered from one directory scan.
#[derive(Debug, Default)]
pub struct RecordStore {
    lists: Vec<RecordList>,
}

impl RecordStore {
    pub(crate) fn new(lists: Vec<RecordList>) -> Self {
        RecordStore { lists }
    }

    pub fn lists(&self) -> &[RecordList] {
        &self.lists
    }

    pub fn count(&self) -> usize {
        self.lists.iter().map(|l| l.len()).sum()
    }
}

/// The value attached to an automaton terminal: an optional seed record (the
/// status record or none for a bare command-line pattern) and the chain of
/// records whose name matched this terminal. The chain has its own lock so
/// parallel filtering contends per name, not globally.
#[derive(Debug, Default)]
pub struct MatchSlot {
    seed: Option<Arc<Record>>,
    chain: Mutex<Vec<Arc<Record>>>,
}

impl MatchSlot {
    /// A slot with no seed, for patterns that came from outside any list.
    pub fn stub() -> Self {
        MatchSlot::default()
    }

    pub fn seeded(record: Arc<Record>) -> Self {
        MatchSlot {
            seed: Some(record),
            chain: Mutex::new(Vec::new()),
        }
    }

    pub fn seed(&self) -> Option<&Arc<Record>> {
        self.seed.as_ref()
    }

    pub(crate) fn push(&self, record: Arc<Record>) {
        self.chain.lock().unwrap().push(record);
    }

    /// Snapshot of the chained records.
    pub fn matches(&self) -> Vec<Arc<Record>> {
        self.chain.lock().unwrap().clone()
    }

    /// The chained record with the greatest version under `cmp`.
    pub fn newest_by(&self, cmp: impl Fn(&str, &str) -> Ordering) -> Option<Arc<Record>> {
        let chain = self.chain.lock().unwrap();
        let mut newest: Option<&Arc<Record>> = None;
        for rec in chain.iter() {
            let Some(version) = rec.version() else {
                continue;
            };
            match newest.and_then(|n| n.version()) {
                Some(best) if cmp(best, version) >= Ordering::Equal => {}
                _ => newest = Some(rec),
            }
        }
        newest.cloned()
    }

    /// The chained record whose version equals the seed's under `cmp`, i.e.
    /// the list entry corresponding to what is currently installed.
    pub fn installed_by(&self, cmp: impl Fn(&str, &str) -> Ordering) -> Option<Arc<Record>> {
        let seed_version = self.seed.as_ref().and_then(|s| s.version())?;
        let chain = self.chain.lock().unwrap();
        chain
            .iter()
            .find(|rec| {
                rec.version()
                    .is_some_and(|v| cmp(v, seed_version) == Ordering::Equal)
            })
            .cloned()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{MatchSlot, Record, RecordList};

    fn record(name: &str, version: &str) -> Arc<Record> {
        Arc::new(Record::new(
            name.to_string(),
            Some(version.to_string()),
            None,
            None,
        ))
    }

    #[test]
    fn test_find_builds_index_lazily() {
        let list = RecordList::new(
            None,
            vec![record("apt", "2.7.14"), record("dpkg", "1.22.6")],
        );
        assert!(list.index.get().is_none());

        assert_eq!(list.find("dpkg").unwrap().version(), Some("1.22.6"));
        assert!(list.index.get().is_some());
        assert_eq!(list.find("apt").unwrap().name(), "apt");
        assert!(list.find("fish").is_none());
    }

    #[test]
    fn test_newest_and_installed() {
        let slot = MatchSlot::seeded(record("fish", "3.6.0"));
        slot.push(record("fish", "3.6.0"));
        slot.push(record("fish", "3.7.1"));
        slot.push(record("fish", "3.5.1"));

        let cmp = skua_utils::version::compare;
        assert_eq!(slot.newest_by(cmp).unwrap().version(), Some("3.7.1"));
        assert_eq!(slot.installed_by(cmp).unwrap().version(), Some("3.6.0"));

        let stub = MatchSlot::stub();
        stub.push(record("fish", "3.7.1"));
        assert!(stub.installed_by(cmp).is_none());
    }
}
