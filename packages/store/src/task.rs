//! In-flight actions.
//!
//! A dispatched action is polled once at dispatch time, so every handler runs
//! up to its first suspension point before `dispatch` returns. Whatever is
//! left is parked here and driven by whoever gets to it first: the caller
//! awaiting the result, or [`Store::flush`](crate::Store::flush).

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::task::noop_waker;
use statetree_value::Value;

use crate::error::{Error, Result};
use crate::module::ActionFuture;

/// Where an action task delivers its outcome.
pub(crate) type Outcome = oneshot::Sender<Result<Value>>;

/// Progress of one poll of an [`ActionTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskState {
    Done,
    Pending,
    /// Already being polled further up the stack.
    Busy,
}

/// One dispatched action: the remaining work plus the waker of the caller
/// awaiting its result, if any.
pub(crate) struct ActionTask {
    future: RefCell<Option<LocalBoxFuture<'static, ()>>>,
    waker: RefCell<Option<Waker>>,
}

impl ActionTask {
    /// Wrap `work` and poll it once. The returned future resolves with the
    /// value `work` sends, and drives the task itself while it is awaited.
    pub fn start<W, F>(work: W) -> (Rc<Self>, ActionFuture)
    where
        W: FnOnce(Outcome) -> F,
        F: Future<Output = ()> + 'static,
    {
        let (tx, mut rx) = oneshot::channel();
        let task = Rc::new(ActionTask {
            future: RefCell::new(Some(work(tx).boxed_local())),
            waker: RefCell::new(None),
        });
        task.poll_once();

        let driver = task.clone();
        let result = future::poll_fn(move |cx| {
            *driver.waker.borrow_mut() = Some(cx.waker().clone());
            if driver.poll_once() == TaskState::Busy {
                cx.waker().wake_by_ref();
            }
            match rx.poll_unpin(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Error::StoreDropped)),
                Poll::Pending => Poll::Pending,
            }
        })
        .boxed_local();
        (task, result)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.future.try_borrow(), Ok(slot) if slot.is_none())
    }

    /// Poll the remaining work with the awaiting caller's waker, or a no-op
    /// waker when nobody is awaiting.
    pub fn poll_once(&self) -> TaskState {
        let Ok(mut slot) = self.future.try_borrow_mut() else {
            return TaskState::Busy;
        };
        let Some(work) = slot.as_mut() else {
            return TaskState::Done;
        };
        let waker = self.waker.borrow().clone().unwrap_or_else(noop_waker);
        let mut cx = Context::from_waker(&waker);
        match work.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                *slot = None;
                TaskState::Done
            }
            Poll::Pending => TaskState::Pending,
        }
    }
}

/// Actions started by a store that have not settled yet.
#[derive(Default)]
pub(crate) struct TaskSet {
    tasks: RefCell<Vec<Rc<ActionTask>>>,
}

impl TaskSet {
    pub fn push(&self, task: Rc<ActionTask>) {
        if !task.is_done() {
            self.tasks.borrow_mut().push(task);
        }
    }

    /// Poll every parked action once and forget the ones that settled.
    pub fn drive(&self) {
        let tasks = self.tasks.borrow().clone();
        for task in &tasks {
            task.poll_once();
        }
        self.tasks.borrow_mut().retain(|task| !task.is_done());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn runs_to_first_suspension_on_start() {
        let steps = Rc::new(Cell::new(0));
        let seen = steps.clone();
        let (task, _result) = ActionTask::start(move |tx| async move {
            seen.set(1);
            future::pending::<()>().await;
            let _ = tx.send(Ok(Value::Null));
        });
        assert_eq!(steps.get(), 1);
        assert!(!task.is_done());
    }

    #[test]
    fn finished_work_is_not_parked() {
        let set = TaskSet::default();
        let (task, result) = ActionTask::start(|tx| async move {
            let _ = tx.send(Ok(Value::from(5)));
        });
        set.push(task);
        assert_eq!(set.len(), 0);
        assert_eq!(result.now_or_never().map(|r| r.ok()), Some(Some(Value::from(5))));
    }

    #[test]
    fn drive_completes_parked_work_without_an_awaiter() {
        let set = TaskSet::default();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        let (task, result) = ActionTask::start(move |tx| async move {
            let _ = release_rx.await;
            flag.set(true);
            let _ = tx.send(Ok(Value::Null));
        });
        drop(result);
        set.push(task);
        assert_eq!(set.len(), 1);

        release_tx.send(()).unwrap();
        set.drive();

        assert!(done.get());
        assert_eq!(set.len(), 0);
    }
}
