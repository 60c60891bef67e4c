//! Task representation.

use super::TaskQueue;
use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error returned by a failing task body.
pub type TaskError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type TaskResult = std::result::Result<(), TaskError>;

type Operation = Box<dyn FnOnce(&TaskQueue) -> TaskResult + Send + 'static>;

/// Human-readable description of a task: the operation name plus the
/// arguments it was bound with, rendered once at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    name: Cow<'static, str>,
    args: Vec<String>,
    options: Vec<(Cow<'static, str>, String)>,
}

impl Signature {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        let options = self.options.iter().map(|(k, v)| format!("{k}={v}"));
        for (i, part) in self.args.iter().cloned().chain(options).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&part)?;
        }
        f.write_str(")")
    }
}

/// A deferred unit of work.
///
/// The operation is a closure that has already captured its arguments; the
/// [`Signature`] only records how they looked for logging. The closure gets
/// the queue handle so it can schedule follow-up work.
///
/// ```
/// use threadqueue::{Task, TaskQueue};
///
/// let queue = TaskQueue::new();
/// let party = 7;
/// let task = Task::new("create_party", move |_q: &TaskQueue| {
///     let _ = party;
///     Ok(())
/// })
/// .arg(&party)
/// .option("dry_run", &true);
///
/// assert_eq!(task.signature().to_string(), "create_party(7, dry_run=true)");
/// queue.enqueue(task);
/// ```
pub struct Task {
    id: TaskId,
    signature: Signature,
    op: Operation,
    enqueued_at: Instant,
}

impl Task {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, op: F) -> Self
    where
        F: FnOnce(&TaskQueue) -> TaskResult + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            signature: Signature::new(name),
            op: Box::new(op),
            enqueued_at: Instant::now(),
        }
    }

    /// Record a positional argument in the signature.
    pub fn arg<T: fmt::Debug + ?Sized>(mut self, value: &T) -> Self {
        self.signature.args.push(format!("{value:?}"));
        self
    }

    /// Record a named option in the signature.
    pub fn option<T: fmt::Debug + ?Sized>(
        mut self,
        key: impl Into<Cow<'static, str>>,
        value: &T,
    ) -> Self {
        self.signature.options.push((key.into(), format!("{value:?}")));
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Run the operation, consuming the task.
    pub(crate) fn execute(self, queue: &TaskQueue) -> TaskResult {
        (self.op)(queue)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("signature", &self.signature.to_string())
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}
