//! 防抖调度器
//!
//! 只保留一个待触发的定时任务：每次触发都会取消旧任务并重新计时，
//! 静默期结束后执行一次动作。任务通过 `spawn_local` 运行，必须在 `LocalSet` 内使用。

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// 防抖统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    pub triggers: u64,
    pub fires: u64,
}

pub struct DebounceScheduler {
    delay: Duration,
    pending: RefCell<Option<JoinHandle<()>>>,
    triggers: Cell<u64>,
    fires: Rc<Cell<u64>>,
}

impl DebounceScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: RefCell::new(None),
            triggers: Cell::new(0),
            fires: Rc::new(Cell::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 重新计时，静默期结束后执行 `action`
    pub fn trigger<F>(&self, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.triggers.set(self.triggers.get() + 1);
        self.cancel();

        let delay = self.delay;
        let fires = Rc::clone(&self.fires);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            fires.set(fires.get() + 1);
            action();
        });

        *self.pending.borrow_mut() = Some(handle);
    }

    /// 取消待触发的任务
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.borrow_mut().take() {
            handle.abort();
        }
    }

    /// 是否有尚未执行的任务
    pub fn is_pending(&self) -> bool {
        self.pending
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stats(&self) -> DebounceStats {
        DebounceStats {
            triggers: self.triggers.get(),
            fires: self.fires.get(),
        }
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
