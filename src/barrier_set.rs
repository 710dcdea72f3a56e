use std::fmt;
use std::sync::Arc;

use crate::plan::barriers::{Barrier, BarrierSelector, CardMarkPolicy, CardTableBarrier, NoBarrier};
use crate::plan::thread_registry::ThreadRegistry;
use crate::util::card_table::CardTable;
use crate::util::options::Options;
use crate::util::MemRegion;

/// A barrier set builder. Set options here, then build the barrier set once the covered heap
/// range is known.
pub struct CardBarrierSetBuilder {
    /// The options for this instance.
    pub options: Options,
}

impl CardBarrierSetBuilder {
    /// Create a builder. Options take their defaults, overridden by `CARDMARK_*` environment variables.
    pub fn new() -> Self {
        CardBarrierSetBuilder {
            options: Options::default(),
        }
    }

    /// Create a builder with the defaults of all options, ignoring environment variables.
    pub fn new_no_env_vars() -> Self {
        CardBarrierSetBuilder {
            options: Options::without_env(),
        }
    }

    /// Set an option by its snake_case name. Returns false (and keeps the old value) if the
    /// name is unknown or the value is invalid.
    pub fn set_option(&mut self, name: &str, val: &str) -> bool {
        self.options.set_from_str(name, val)
    }

    /// Set multiple options given as whitespace-separated `name=value` pairs.
    /// Returns false if any pair fails; the valid pairs are still applied.
    pub fn set_options_bulk(&mut self, options: &str) -> bool {
        let mut all_valid = true;
        for opt in options.split_ascii_whitespace() {
            let kv_pair: Vec<&str> = opt.split('=').collect();
            if kv_pair.len() != 2 {
                warn!("Malformed option {:?}", opt);
                all_valid = false;
                continue;
            }
            all_valid &= self.set_option(kv_pair[0], kv_pair[1]);
        }
        all_valid
    }

    /// Build a barrier set whose card table covers `covered`.
    pub fn build(&self, covered: MemRegion) -> CardBarrierSet {
        CardBarrierSet::new(self.options.clone(), covered)
    }
}

impl Default for CardBarrierSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The card table, the selected barrier and the registry of attached threads.
///
/// A runtime usually builds one barrier set at collector initialization and keeps it for the
/// life of the heap. Mutators hold a static reference to it.
pub struct CardBarrierSet {
    options: Options,
    card_table: Arc<CardTable>,
    barrier: Box<dyn Barrier>,
    registry: ThreadRegistry,
}

impl CardBarrierSet {
    fn new(options: Options, covered: MemRegion) -> Self {
        let card_table = Arc::new(CardTable::new(
            covered,
            options.log_bytes_in_card,
            options.concurrent_card_scanning,
        ));
        let barrier: Box<dyn Barrier> = match options.barrier {
            BarrierSelector::NoBarrier => Box::new(NoBarrier),
            BarrierSelector::CardTableBarrier => Box::new(CardTableBarrier::new(
                card_table.clone(),
                options.reduce_initial_card_marks,
            )),
        };
        info!("Initialized {}", barrier);
        debug!("{}", card_table);
        CardBarrierSet {
            options,
            card_table,
            barrier,
            registry: ThreadRegistry::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn card_table(&self) -> &CardTable {
        &self.card_table
    }

    /// The installed barrier, for coarse operations. Store barriers should go through
    /// [`CardBarrierSet::barrier_as`] so they are resolved at compile time.
    pub fn barrier(&self) -> &dyn Barrier {
        self.barrier.as_ref()
    }

    /// The installed barrier as its concrete type, or `None` if another barrier is installed.
    pub fn barrier_as<B: Barrier>(&self) -> Option<&B> {
        self.barrier.downcast_ref::<B>()
    }

    pub fn card_mark_policy(&self) -> CardMarkPolicy {
        self.barrier.card_mark_policy()
    }

    pub(crate) fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// The number of attached mutator threads.
    pub fn num_mutators(&self) -> usize {
        self.registry.len()
    }

    /// Discharge the deferred card marks of all threads. The safepoint machinery calls this
    /// after all mutators have stopped, before the collector looks at the card table.
    pub fn prepare_for_safepoint(&self) {
        let discharged = self.registry.flush_all(self.barrier());
        debug!(
            "Discharged {} deferred card mark(s) of {} thread(s) at safepoint",
            discharged,
            self.registry.len()
        );
    }
}

impl fmt::Display for CardBarrierSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}]", self.barrier, self.card_table)
    }
}
