//! The CRUD verification sequence.
//!
//! Order matters: every step relies on the state the previous one left in
//! the pool, so an unexpected outcome on a load-bearing step ends the run
//! for this pool. `detach_all_items()` is called between fetches so each
//! lookup reaches the backend instead of a snapshot the pool kept around.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use tracing::{debug, info};

use poolcheck_contracts::{error::StepResult, tag::TagStrategy};
use poolcheck_core::{keys, CachePool};

use crate::ContractVerifier;

/// Suffix appended to the stored value before the deferred save.
pub const APPEND_SUFFIX: &str = "_appended";

/// Tag no item ever carries.
pub const UNKNOWN_TAG: &str = "unknown_tag";

/// Allowed skew, in seconds, between a fresh item's TTL and the pool default.
pub const TTL_TOLERANCE_SECS: i64 = 1;

impl ContractVerifier<'_> {
    /// Run the CRUD sequence against `pool`.
    ///
    /// With `clear` set the pool is emptied first, and the delete / clear /
    /// batch-delete steps run at the end.
    pub fn run_crud(&self, pool: &dyn CachePool, clear: bool) -> StepResult<()> {
        let reporter = self.reporter();
        reporter.info(&format!(
            "Running CRUD tests on the following backend: {}",
            pool.driver_name()
        ));
        info!(driver = pool.driver_name(), clear, "crud sequence started");

        if clear {
            reporter.debug("Clearing backend before running test...");
            pool.clear()?;
        }

        let cache_key = keys::random_cache_key("cache_key_");
        let cache_key2 = keys::random_cache_key("cache_key_");
        let cache_tag = keys::random_cache_key("cache_tag_");
        let cache_tag2 = keys::random_cache_key("cache_tag_");
        let mut cache_value = format!("cache_data_{}", rand::thread_rng().gen_range(1000..=999_999));

        // ── Default TTL and save ──────────────────────────────────────────────

        let mut item = pool.get_item(&cache_key)?;
        reporter.info(&format!("Using cache key: {cache_key}"));

        let expected_ttl = i64::try_from(pool.config().default_ttl).unwrap_or(i64::MAX);
        let ttl = item.ttl();
        if (ttl - expected_ttl).abs() <= TTL_TOLERANCE_SECS {
            self.pass(&format!("The cache item has the expected default TTL of ~{expected_ttl}s."));
        } else {
            self.fail(&format!(
                "The expected TTL of the cache item was ~{expected_ttl}s, got {ttl}s"
            ));
        }

        item.set(cache_value.as_str())
            .add_tags([cache_tag.as_str(), cache_tag2.as_str()]);

        if pool.save(&item)? {
            self.pass("The pool successfully saved an item.");
        } else {
            self.fail("The pool failed to save an item.");
            return Ok(());
        }
        drop(item);
        pool.detach_all_items();

        // ── Tag strategies ────────────────────────────────────────────────────

        let (tag1, tag2) = (cache_tag.as_str(), cache_tag2.as_str());
        let checks: [(&str, Vec<&str>, TagStrategy, bool); 4] = [
            (
                "<green>by its tags</green> <red>and an unknown tag</red>",
                vec![tag1, tag2, UNKNOWN_TAG],
                TagStrategy::All,
                false,
            ),
            ("<green>by its tags</green>", vec![tag1, tag2], TagStrategy::All, true),
            (
                "<green>by its tags</green> <red>and an unknown tag</red>",
                vec![tag1, tag2, UNKNOWN_TAG],
                TagStrategy::Only,
                false,
            ),
            ("<green>by its tags</green>", vec![tag1, tag2], TagStrategy::Only, true),
        ];

        for (label, tags, strategy, expect_hit) in checks {
            reporter.info(&format!(
                "Re-fetching item {label} (tag strategy \"<yellow>{strategy}</yellow>\")..."
            ));
            let tags: Vec<String> = tags.into_iter().map(str::to_string).collect();
            let found = pool.get_items_by_tags(&tags, strategy)?.contains_key(&cache_key);
            debug!(%strategy, ?tags, found, expect_hit, "tag strategy check");

            match (found, expect_hit) {
                (false, false) => self.pass("The pool expectedly failed to retrieve the cache item."),
                (true, true) => self.pass("The pool successfully retrieved the cache item."),
                (true, false) => {
                    self.fail("The pool unexpectedly retrieved the cache item.");
                    return Ok(());
                }
                (false, true) => {
                    self.fail("The pool failed to retrieve the cache item.");
                    return Ok(());
                }
            }
            pool.detach_all_items();
        }

        reporter.info(
            "Re-fetching item <green>by one of its tags</green> <red>and an unknown tag</red> (tag strategy \"<yellow>ONE</yellow>\")...",
        );
        let mut found = pool.get_items_by_tags(&[cache_tag.clone(), UNKNOWN_TAG.to_string()], TagStrategy::One)?;
        let mut item = match found.remove(&cache_key) {
            Some(item) if item.key() == cache_key => {
                self.pass("The pool successfully retrieved the cache item.");
                item
            }
            _ => {
                self.fail("The pool failed to retrieve the cache item.");
                return Ok(());
            }
        };

        if item.get() == &Value::String(cache_value.clone()) {
            self.pass("The pool successfully retrieved the expected value.");
        } else {
            self.fail("The pool failed to retrieve the expected value.");
            return Ok(());
        }

        // ── Deferred save and commit ──────────────────────────────────────────

        reporter.info("Updating the cache item by appending some chars...");
        item.append(APPEND_SUFFIX)?;
        cache_value.push_str(APPEND_SUFFIX);
        pool.save_deferred(&item)?;

        reporter.info("Deferred item is being committed...");
        if pool.commit()? {
            self.pass("The pool successfully committed deferred cache item.");
        } else {
            self.fail("The pool failed to commit deferred cache item.");
        }
        pool.detach_all_items();
        drop(item);

        let item = pool.get_item(&cache_key)?;
        if item.get() == &Value::String(cache_value.clone()) {
            self.pass("The pool successfully retrieved the expected new value.");
        } else {
            self.fail("The pool failed to retrieve the expected new value.");
            return Ok(());
        }
        drop(item);

        // ── Delete, clear and batch delete ────────────────────────────────────

        if clear {
            if pool.delete_item(&cache_key)? && !pool.get_item(&cache_key)?.is_hit() {
                self.pass("The pool successfully deleted the cache item.");
            } else {
                self.fail("The pool failed to delete the cache item.");
            }

            if pool.clear()? {
                self.pass("The pool successfully cleared.");
            } else {
                self.fail("The cluster failed to clear.");
            }
            pool.detach_all_items();

            if !pool.get_item(&cache_key)?.is_hit() {
                self.pass("The cache item does no longer exists in pool.");
            } else {
                self.fail("The cache item still exists in pool.");
                return Ok(());
            }

            reporter.info("Testing deleting multiple keys at once.");
            let batch = [cache_key.clone(), cache_key2.clone()];
            let items = pool.get_items(&batch)?;
            for mut item in items.into_values() {
                item.set(shuffled(&cache_value));
                pool.save(&item)?;
            }
            pool.delete_items(&batch)?;

            let still_hit: Vec<String> = pool
                .get_items(&batch)?
                .into_values()
                .filter(|item| item.is_hit())
                .map(|item| item.key().to_string())
                .collect();
            if still_hit.is_empty() {
                self.pass("The cache items does no longer exists in pool.");
            } else {
                self.fail(&format!(
                    "The cache items {} still exists in pool.",
                    still_hit.join(", ")
                ));
            }
        }

        // ── Informational stats ───────────────────────────────────────────────

        let io = pool.io();
        reporter.info(&format!(
            "I/O stats: {} HIT(S), {} MISS, {} WRITE(S)",
            io.read_hit, io.read_miss, io.write_hit
        ));
        let stats = pool.stats();
        reporter.info(&format!(
            "<yellow>Driver info</yellow>: <magenta>{}</magenta>",
            stats.info
        ));
        if stats.size > 0 {
            reporter.info(&format!(
                "<yellow>Driver size</yellow> (approximative): <magenta>{:.3} Mo</magenta>",
                stats.size as f64 / (1024.0 * 1024.0)
            ));
        }
        reporter.new_line(1);

        info!(driver = pool.driver_name(), "crud sequence finished");
        Ok(())
    }
}

/// `value` with its characters in random order.
fn shuffled(value: &str) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    chars.shuffle(&mut rand::thread_rng());
    chars.into_iter().collect()
}
