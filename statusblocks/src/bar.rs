//! Status bar state: block slots, the change set and the last published line

use crate::blocks::BlockRegistry;
use crate::error::{Error, Result};
use crate::executor::{Executor, SlotText};
use crate::sink::OutputSink;

/// One bit per block index, set when that block's slot is rewritten
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet(u32);

impl ChangeSet {
    pub fn mark(&mut self, index: usize) {
        debug_assert!(index < u32::BITS as usize);
        self.0 |= 1 << index;
    }

    pub fn contains(&self, index: usize) -> bool {
        index < u32::BITS as usize && self.0 & (1 << index) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Return the current bits and clear them
    pub fn take(&mut self) -> u32 {
        std::mem::take(&mut self.0)
    }

    #[cfg(test)]
    pub(crate) fn bits(&self) -> u32 {
        self.0
    }
}

/// Slots for every block plus everything needed to redraw them
pub struct StatusBar {
    registry: BlockRegistry,
    executor: Executor,
    delimiter: String,
    slots: Vec<SlotText>,
    changed: ChangeSet,
    last_published: Option<Vec<u8>>,
}

impl StatusBar {
    pub fn new(registry: BlockRegistry, executor: Executor, delimiter: impl Into<String>) -> Self {
        let slots = vec![SlotText::default(); registry.len()];
        Self {
            registry,
            executor,
            delimiter: delimiter.into(),
            slots,
            changed: ChangeSet::default(),
            last_published: None,
        }
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn changed(&self) -> ChangeSet {
        self.changed
    }

    pub fn slot(&self, index: usize) -> Option<&SlotText> {
        self.slots.get(index)
    }

    pub fn last_published(&self) -> Option<&[u8]> {
        self.last_published.as_deref()
    }

    /// Re-run block `index` and store its output
    ///
    /// Spawn failures leave the slot as it was and are only logged.
    pub fn execute(&mut self, index: usize) {
        let Some(block) = self.registry.get(index) else {
            return;
        };

        match self.executor.execute(block) {
            Ok(Some(text)) => {
                log::debug!("block {} -> {:?}", index, String::from_utf8_lossy(&text.body));
                self.slots[index] = text;
                self.changed.mark(index);
            }
            Ok(None) => log::debug!("block {} skipped its update", index),
            Err(e) => log::warn!("block {}: {}", index, e),
        }
    }

    /// Run every block due at `elapsed` seconds
    pub fn refresh_due(&mut self, elapsed: u64) {
        let due: Vec<usize> = self.registry.due(elapsed).collect();
        for index in due {
            self.execute(index);
        }
    }

    /// Run the block bound to trigger `signal`
    pub fn trigger(&mut self, signal: u32) -> Result<usize> {
        let index = self
            .registry
            .find_by_signal(signal)
            .ok_or(Error::UnknownTrigger(signal))?;
        self.execute(index);
        Ok(index)
    }

    /// Concatenate the visible slots, separated by the delimiter
    pub fn compose(&self) -> Vec<u8> {
        let mut status = Vec::new();
        let mut first = true;
        for slot in self.slots.iter().filter(|slot| slot.is_visible()) {
            if !first {
                status.extend_from_slice(self.delimiter.as_bytes());
            }
            slot.push_to(&mut status);
            first = false;
        }
        status
    }

    /// Hand the status line to `sink` if any slot changed since last time
    ///
    /// Returns whether the sink was written. A rewrite that produced the
    /// same line as the last publish does not reach the sink.
    pub fn publish(&mut self, sink: &mut dyn OutputSink) -> Result<bool> {
        if self.changed.is_empty() {
            return Ok(false);
        }
        self.changed.take();

        let status = self.compose();
        if self.last_published.as_deref() == Some(status.as_slice()) {
            log::trace!("status unchanged, skipping publish");
            return Ok(false);
        }

        sink.publish(&status)?;
        log::debug!("published {:?}", String::from_utf8_lossy(&status));
        self.last_published = Some(status);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockSpec;
    use crate::executor::DEFAULT_SHELL;
    use crate::sink::RecordingSink;

    fn bar(blocks: Vec<BlockSpec>, delimiter: &str) -> StatusBar {
        let registry = BlockRegistry::new(blocks, 30).unwrap();
        let limit = Executor::read_limit_for(50, delimiter);
        StatusBar::new(registry, Executor::new(DEFAULT_SHELL, limit), delimiter)
    }

    #[test]
    fn test_change_set() {
        let mut set = ChangeSet::default();
        assert!(set.is_empty());
        set.mark(0);
        set.mark(31);
        assert!(set.contains(0) && set.contains(31) && !set.contains(1));
        assert_eq!(set.take(), 0x8000_0001);
        assert!(set.is_empty());
    }

    #[test]
    fn test_end_to_end_initial_pass_and_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("value");
        std::fs::write(&file, "y\n").unwrap();

        let mut bar = bar(
            vec![
                BlockSpec::new("A", "echo x", 10, 0),
                BlockSpec::new("B", &format!("cat {}", file.display()), 0, 5),
            ],
            "|",
        );
        let mut sink = RecordingSink::default();

        bar.refresh_due(0);
        assert!(bar.publish(&mut sink).unwrap());
        assert_eq!(sink.lines(), vec!["Ax|\u{5}By".to_string()]);

        // same output: the slot is rewritten but the line is not republished
        assert_eq!(bar.trigger(5).unwrap(), 1);
        assert!(bar.changed().contains(1));
        assert!(!bar.publish(&mut sink).unwrap());
        assert!(bar.changed().is_empty());
        assert_eq!(sink.lines().len(), 1);

        std::fs::write(&file, "z\n").unwrap();
        bar.trigger(5).unwrap();
        assert!(bar.publish(&mut sink).unwrap());
        assert_eq!(sink.lines().last().unwrap(), "Ax|\u{5}Bz");
        assert_eq!(bar.last_published(), Some(&b"Ax|\x05Bz"[..]));
    }

    #[test]
    fn test_publish_without_changes_writes_nothing() {
        let mut bar = bar(vec![BlockSpec::new("", "echo a", 1, 0)], " ");
        let mut sink = RecordingSink::default();

        assert!(!bar.publish(&mut sink).unwrap());
        bar.execute(0);
        assert!(bar.publish(&mut sink).unwrap());
        assert!(!bar.publish(&mut sink).unwrap());
        assert_eq!(sink.lines(), vec!["a".to_string()]);
    }

    #[test]
    fn test_one_changed_slot_writes_full_line_once() {
        let mut bar = bar(
            vec![
                BlockSpec::new("", "echo a", 1, 0),
                BlockSpec::new("", "date +%N", 1, 0),
                BlockSpec::new("", "echo c", 1, 0),
            ],
            " ",
        );
        let mut sink = RecordingSink::default();
        bar.refresh_due(0);
        bar.publish(&mut sink).unwrap();

        bar.execute(1);
        assert_eq!(bar.changed().bits(), 0b010);
        assert!(bar.publish(&mut sink).unwrap());
        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("a ") && lines[1].ends_with(" c"));
    }

    #[test]
    fn test_delimiter_only_between_visible_slots() {
        for delimiter in ["", " ", " | "] {
            let mut bar = bar(
                vec![
                    BlockSpec::new("", "echo a", 1, 0),
                    BlockSpec::new("", "printf ''", 1, 0),
                    BlockSpec::new("", "echo b", 1, 0),
                    BlockSpec::new("", "printf ''", 1, 0),
                ],
                delimiter,
            );
            bar.refresh_due(0);
            assert_eq!(bar.compose(), format!("a{}b", delimiter).into_bytes());
        }
    }

    #[test]
    fn test_sentinel_leaves_slot_and_change_bit() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("value");
        std::fs::write(&file, "on\n").unwrap();

        let mut bar = bar(
            vec![BlockSpec::new("V", &format!("cat {}", file.display()), 0, 2)],
            " ",
        );
        let mut sink = RecordingSink::default();
        bar.execute(0);
        bar.publish(&mut sink).unwrap();

        std::fs::write(&file, "\n").unwrap();
        bar.trigger(2).unwrap();
        assert!(bar.changed().is_empty());
        assert_eq!(bar.slot(0).unwrap().body, b"Von");
    }

    #[test]
    fn test_unknown_trigger_changes_nothing() {
        let mut bar = bar(vec![BlockSpec::new("", "echo a", 0, 4)], " ");
        assert!(matches!(bar.trigger(9), Err(Error::UnknownTrigger(9))));
        assert!(bar.changed().is_empty());
        assert_eq!(bar.slot(0), Some(&SlotText::default()));
    }

    #[test]
    fn test_spawn_failure_keeps_slot() {
        let registry = BlockRegistry::new(vec![BlockSpec::new("", "echo a", 1, 0)], 30).unwrap();
        let mut bar = StatusBar::new(registry, Executor::new("/nonexistent/shell", 48), " ");
        bar.execute(0);
        assert!(bar.changed().is_empty());
        assert!(bar.compose().is_empty());
    }

    #[test]
    fn test_non_utf8_output_is_published_unchanged() {
        let mut bar = bar(
            vec![
                BlockSpec::new("", "printf 'a\\377'", 1, 0),
                BlockSpec::new("", "echo b", 1, 0),
            ],
            " ",
        );
        let mut sink = RecordingSink::default();
        bar.refresh_due(0);
        assert!(bar.publish(&mut sink).unwrap());
        assert_eq!(sink.raw_lines(), vec![b"a\xff b".to_vec()]);
    }
}
