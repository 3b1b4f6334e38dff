use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

use super::ScheduledTask;

const VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop_waker);

/// Build a waker that re-posts `task` onto its scheduler when woken.
///
/// Producers on other threads only ever touch the task through this
/// waker, so every resumption goes back through the scheduler queue.
pub(crate) fn scheduler_waker(task: Arc<ScheduledTask>) -> Waker {
    let raw = RawWaker::new(Arc::into_raw(task) as *const (), &VTABLE);
    unsafe { Waker::from_raw(raw) }
}

unsafe fn clone(ptr: *const ()) -> RawWaker {
    let task = Arc::from_raw(ptr as *const ScheduledTask);
    std::mem::forget(task.clone());
    RawWaker::new(Arc::into_raw(task) as *const (), &VTABLE)
}

unsafe fn wake(ptr: *const ()) {
    Arc::from_raw(ptr as *const ScheduledTask).schedule();
}

unsafe fn wake_by_ref(ptr: *const ()) {
    let task = Arc::from_raw(ptr as *const ScheduledTask);
    task.clone().schedule();
    std::mem::forget(task);
}

unsafe fn drop_waker(ptr: *const ()) {
    drop(Arc::from_raw(ptr as *const ScheduledTask));
}
