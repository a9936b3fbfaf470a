//! The bulk-retrieval verification sequence.
//!
//! Besides checking what `get_all_items` returns, the sequence subscribes
//! a probe to the pool's `GetAllItems` event and asserts that it fired,
//! which proves the key scan went through the pool's extensibility point.

use std::sync::Arc;

use tracing::{debug, info};

use poolcheck_contracts::error::{HarnessError, StepResult, Uncaught};
use poolcheck_core::{
    events::{EventFilter, EventKind, InvocationProbe, PoolEvent, PoolObserver},
    CachePool, Reporter,
};

use crate::ContractVerifier;

/// Keys written before the scan.
pub const BULK_KEYS: [&str; 3] = ["cache-test1", "cache-test2", "cache-test3"];

/// Lifetime of the items written before the scan.
pub const BULK_TTL_SECS: u64 = 3600;

/// Pattern expected to match exactly one of `BULK_KEYS`.
pub const NARROWING_PATTERN: &str = "*test1*";

/// Counts scan events and announces each one.
struct ScanProbe {
    probe: InvocationProbe,
    reporter: Reporter,
}

impl PoolObserver for ScanProbe {
    fn notify(&self, event: &PoolEvent<'_>) {
        self.probe.notify(event);
        self.reporter.info(&format!(
            "The custom event {} has been called.",
            event.kind()
        ));
    }
}

impl ContractVerifier<'_> {
    /// Run the bulk-retrieval sequence against `pool`.
    ///
    /// The pool is cleared first. A pool rejecting the pattern argument with
    /// `InvalidArgument` gets a skip for the narrowing check; any other
    /// error escapes to the session.
    pub fn run_get_all_items(&self, pool: &dyn CachePool) -> StepResult<()> {
        let reporter = self.reporter();
        let driver = pool.driver_name();

        let scan = Arc::new(ScanProbe {
            probe: InvocationProbe::new(),
            reporter: reporter.clone(),
        });
        let _subscription = pool
            .events()
            .subscribe_scoped(EventFilter::Only(EventKind::GetAllItems), scan.clone());

        reporter.note(&format!(
            "<blue>Testing</blue> <red>{}</red> <blue>against getAllItems() method</blue>",
            driver.to_uppercase()
        ));
        info!(driver, "bulk retrieval sequence started");

        pool.clear()?;
        let mut items = Vec::with_capacity(BULK_KEYS.len());
        for key in BULK_KEYS {
            let mut item = pool.get_item(key)?;
            let value = key.trim_start_matches("cache-").to_string();
            item.set(value).expires_after(BULK_TTL_SECS);
            items.push(item);
        }
        pool.save_multiple(&items)?;
        pool.detach_all_items();
        drop(items);

        let found = pool.get_all_items(None)?;
        if found.len() == BULK_KEYS.len() {
            self.pass("getAllItems() returned 3 cache items as expected.");
        } else {
            self.fail(&format!(
                "getAllItems() unexpectedly returned {} cache items.",
                found.len()
            ));
        }

        for (key, item) in &found {
            if item.is_hit() {
                self.pass(&format!("Item #{} is hit.", item.key()));
            } else {
                self.fail(&format!("Item #{} is not hit.", item.key()));
            }

            if key == item.key() {
                self.pass(&format!(
                    "Cache item #{} object is identified by its cache key.",
                    item.key()
                ));
            } else {
                self.fail(&format!(
                    "Cache item #{} object is identified by \"{key}\".",
                    item.key()
                ));
            }
        }

        if scan.probe.fired() {
            self.pass(&format!(
                "The {} event fired during the key scan.",
                EventKind::GetAllItems
            ));
        } else {
            self.fail(&format!(
                "The {} event never fired during the key scan.",
                EventKind::GetAllItems
            ));
        }

        reporter.note("<blue>Testing getAllItems() method</blue> <yellow>(with pattern)</yellow>");
        match pool.get_all_items(Some(NARROWING_PATTERN)) {
            Ok(narrowed) if narrowed.len() == 1 => self.pass("Found 1 item using the pattern argument"),
            Ok(narrowed) => self.fail(&format!(
                "Found {} items using the pattern argument",
                narrowed.len()
            )),
            Err(HarnessError::InvalidArgument { reason }) => {
                debug!(driver, %reason, "pattern argument rejected");
                self.skip(&format!("Pattern argument unsupported by {driver} driver"));
            }
            Err(other) => return Err(Uncaught::from(other)),
        }

        reporter.new_line(1);
        info!(driver, scans = scan.probe.invocations(), "bulk retrieval sequence finished");
        Ok(())
    }
}
