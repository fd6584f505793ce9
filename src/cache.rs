use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Result, SorterError};
use crate::gmail::{ThreadQuery, ThreadQueryResult};

const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    result: ThreadQueryResult,
}

/// Stores thread query results as JSON files, one per query
#[derive(Debug, Clone)]
pub struct ThreadCache {
    dir: PathBuf,
}

impl ThreadCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache file for a query, independent of limit and offline flag.
    /// The query text is hashed so any expression fits in a file name.
    fn path_for(&self, query: &ThreadQuery) -> PathBuf {
        let kind = if query.load_messages { "threads" } else { "ids" };
        let mut hasher = Sha256::new();
        hasher.update(query.query.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        self.dir
            .join(format!("{}_{}_{}.json", query.format.as_api_str(), kind, digest))
    }

    /// Loads a cached result. Missing, unreadable or outdated entries count as a miss.
    pub fn load(&self, query: &ThreadQuery) -> Result<Option<ThreadQueryResult>> {
        let path = self.path_for(query);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path).map_err(SorterError::query)?;
        let cached: CacheFile = match serde_json::from_reader(BufReader::new(file)) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = ?path, "Ignoring unreadable cache entry: {e}");
                return Ok(None);
            }
        };

        if cached.version != CACHE_VERSION {
            return Ok(None);
        }

        debug!(path = ?path, threads = cached.result.stats.threads, "Loaded cached query result");
        Ok(Some(cached.result))
    }

    pub fn store(&self, query: &ThreadQuery, result: &ThreadQueryResult) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(SorterError::query)?;
        let path = self.path_for(query);
        let file = File::create(&path).map_err(SorterError::query)?;

        let cached = CacheFile {
            version: CACHE_VERSION,
            result: result.clone(),
        };
        serde_json::to_writer(BufWriter::new(file), &cached).map_err(SorterError::query)?;
        debug!(path = ?path, "Cached query result");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MessageBuilder;
    use crate::gmail::{Thread, ThreadQueryFormat};
    use chrono::{TimeZone, Utc};
    use std::path::Path;

    fn sample_result() -> ThreadQueryResult {
        ThreadQueryResult::new(vec![Thread {
            id: "t1".to_string(),
            messages: vec![
                MessageBuilder::new()
                    .id("m1")
                    .thread_id("t1")
                    .from("a@x.com")
                    .date(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap())
                    .text_part("hello")
                    .build(),
            ],
        }])
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThreadCache::new(dir.path().join("email_cache"));
        let query = ThreadQuery::new("label:inbox", 100, ThreadQueryFormat::Full);

        assert!(cache.load(&query).unwrap().is_none());
        cache.store(&query, &sample_result()).unwrap();
        assert_eq!(cache.load(&query).unwrap(), Some(sample_result()));
    }

    #[test]
    fn test_key_ignores_limit_and_offline() {
        let cache = ThreadCache::new("/tmp/cache");
        let a = ThreadQuery::new("label:inbox", 100, ThreadQueryFormat::Full);
        let b = ThreadQuery::new("label:inbox", 5, ThreadQueryFormat::Full).offline(true);
        assert_eq!(cache.path_for(&a), cache.path_for(&b));
    }

    #[test]
    fn test_key_separates_format_and_message_loading() {
        let cache = ThreadCache::new("/tmp/cache");
        let full = ThreadQuery::new("label:inbox", 100, ThreadQueryFormat::Full);
        let meta = ThreadQuery::new("label:inbox", 100, ThreadQueryFormat::Metadata);
        let ids = full.clone().load_messages(false);
        assert_ne!(cache.path_for(&full), cache.path_for(&meta));
        assert_ne!(cache.path_for(&full), cache.path_for(&ids));
    }

    #[test]
    fn test_query_is_encoded_into_a_single_file_name() {
        let cache = ThreadCache::new("/tmp/cache");
        let query = ThreadQuery::new("from:a@x.com subject:\"a/b\"", 1, ThreadQueryFormat::Minimal);
        let path = cache.path_for(&query);
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/cache"));
    }

    #[test]
    fn test_long_query_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThreadCache::new(dir.path());
        let expression = (0..80)
            .map(|i| format!("from:sender{i}@newsletter.example.com"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let query = ThreadQuery::new(expression, 1, ThreadQueryFormat::Minimal).load_messages(false);

        let name = cache.path_for(&query);
        assert!(name.file_name().unwrap().len() < 255);

        let result = sample_result();
        cache.store(&query, &result).unwrap();
        assert_eq!(cache.load(&query).unwrap(), Some(result));
    }

    #[test]
    fn test_different_queries_use_different_files() {
        let cache = ThreadCache::new("/tmp/cache");
        let a = ThreadQuery::new("from:a@x.com", 1, ThreadQueryFormat::Minimal);
        let b = ThreadQuery::new("from:b@x.com", 1, ThreadQueryFormat::Minimal);
        assert_ne!(cache.path_for(&a), cache.path_for(&b));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThreadCache::new(dir.path());
        let query = ThreadQuery::new("label:inbox", 100, ThreadQueryFormat::Full);
        fs::write(cache.path_for(&query), "not json").unwrap();
        assert!(cache.load(&query).unwrap().is_none());
    }
}
