//! Work deferred to the next event-loop tick.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellTask {
    /// Handle a `popstate` once `location` has settled.
    PopState,
    /// Restore the scroll offset remembered for `href`.
    RestoreScroll { href: String },
    Navigate { href: String },
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: VecDeque<ShellTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: ShellTask) {
        self.pending.push_back(task);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ShellTask> {
        self.pending.iter()
    }

    /// Everything queued so far. Tasks pushed while these run belong to the
    /// following tick.
    pub fn take_tick(&mut self) -> Vec<ShellTask> {
        self.pending.drain(..).collect()
    }
}

/// The narrow capability handed to collaborators: schedule a navigation
/// without holding the orchestrator.
#[derive(Debug)]
pub struct Deferred<'a> {
    queue: &'a mut TaskQueue,
}

impl<'a> Deferred<'a> {
    pub fn new(queue: &'a mut TaskQueue) -> Self {
        Self { queue }
    }

    pub fn navigate(&mut self, href: &str) {
        self.queue.push(ShellTask::Navigate {
            href: href.to_owned(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::Deferred;
    use super::ShellTask;
    use super::TaskQueue;

    #[test]
    fn tick_takes_only_current_tasks() {
        let mut queue = TaskQueue::new();
        queue.push(ShellTask::PopState);
        Deferred::new(&mut queue).navigate("https://shop.example/cart");

        let tick = queue.take_tick();
        assert_eq!(tick.len(), 2);
        assert!(queue.is_empty());

        queue.push(ShellTask::RestoreScroll {
            href: "https://shop.example/".to_owned(),
        });
        assert_eq!(queue.len(), 1);
        assert_eq!(
            tick[1],
            ShellTask::Navigate {
                href: "https://shop.example/cart".to_owned()
            }
        );
    }
}
