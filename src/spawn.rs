//! Fire-and-forget task launch.

use crate::context::IoContext;
use crate::task::{ScheduledTask, Task};

/// Start `task` on the context's scheduler and release it.
///
/// The task is awaited inside an internal detached future, so its frame
/// is freed when it completes. There is no consumer for its outcome:
/// bodies that can fail should handle or log their own errors before
/// returning.
pub fn spawn_detached(ctx: &IoContext, task: Task<()>) {
    if !task.valid() {
        return;
    }
    ScheduledTask::new(ctx.scheduler(), async move { task.await }).schedule();
}
