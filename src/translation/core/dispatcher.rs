//! 并发调度器
//!
//! 闸门任务按提交顺序从有界队列中取出作业，先获取信号量许可再启动作业。
//! 许可与活跃计数守卫随作业任务一起释放（成功、失败或 panic），
//! 因此任何结束路径都会归还槽位并让下一个排队作业启动。

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::translation::error::{TranslationError, TranslationResult};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// 调度统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub submitted: usize,
    pub active: usize,
    pub peak_active: usize,
    pub completed: usize,
}

impl DispatchStats {
    /// 已提交但尚未启动的作业数
    pub fn queued(&self) -> usize {
        self.submitted
            .saturating_sub(self.active)
            .saturating_sub(self.completed)
    }
}

#[derive(Default)]
struct DispatchState {
    submitted: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    completed: AtomicUsize,
}

/// 活跃计数守卫
struct ActiveGuard {
    state: Arc<DispatchState>,
}

impl ActiveGuard {
    fn enter(state: Arc<DispatchState>) -> Self {
        let active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak_active.fetch_max(active, Ordering::SeqCst);
        Self { state }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        self.state.completed.fetch_add(1, Ordering::SeqCst);
    }
}

/// 作业完成凭据
pub struct Ticket<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Future for Ticket<T> {
    type Output = TranslationResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| {
            result.map_err(|_| {
                TranslationError::ConcurrencyError("作业在完成前终止".to_string())
            })
        })
    }
}

/// 并发调度器
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Job>,
    state: Arc<DispatchState>,
    max_concurrent: usize,
}

impl Dispatcher {
    /// 创建调度器并启动闸门任务；必须在 tokio 运行时内调用
    pub fn new(max_concurrent: usize, queue_capacity: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let state = Arc::new(DispatchState::default());
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        tokio::spawn(Self::run_gate(receiver, semaphore, Arc::clone(&state)));

        Self {
            sender,
            state,
            max_concurrent,
        }
    }

    async fn run_gate(
        mut receiver: mpsc::Receiver<Job>,
        semaphore: Arc<Semaphore>,
        state: Arc<DispatchState>,
    ) {
        while let Some(job) = receiver.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let guard = ActiveGuard::enter(Arc::clone(&state));

            tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;
                job.await;
            });
        }
        tracing::debug!("调度器闸门已退出");
    }

    /// 提交作业，按提交顺序排队；返回可等待结果的凭据
    pub async fn enqueue<F, T>(&self, future: F) -> TranslationResult<Ticket<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let output = future.await;
            let _ = tx.send(output);
        });

        self.state.submitted.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(job).await.is_err() {
            self.state.submitted.fetch_sub(1, Ordering::SeqCst);
            return Err(TranslationError::ConcurrencyError(
                "调度器已关闭".to_string(),
            ));
        }

        Ok(Ticket { receiver: rx })
    }

    /// 提交作业并等待其完成
    pub async fn submit<F, T>(&self, future: F) -> TranslationResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(future).await?.await
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.state.submitted.load(Ordering::SeqCst),
            active: self.state.active.load(Ordering::SeqCst),
            peak_active: self.state.peak_active.load(Ordering::SeqCst),
            completed: self.state.completed.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ceiling_is_respected() {
        let dispatcher = Dispatcher::new(3, 64);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tickets = Vec::new();
        for _ in 0..12 {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            let ticket = dispatcher
                .enqueue(async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            tickets.push(ticket);
        }

        for ticket in tickets {
            ticket.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        let stats = dispatcher.stats();
        assert!(stats.peak_active <= 3);
        assert_eq!(stats.submitted, 12);
        assert_eq!(stats.completed, 12);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.queued(), 0);
    }

    #[tokio::test]
    async fn test_fifo_start_order() {
        let dispatcher = Dispatcher::new(1, 16);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut tickets = Vec::new();
        for i in 0..5 {
            let order = Arc::clone(&order);
            tickets.push(
                dispatcher
                    .enqueue(async move {
                        order.lock().unwrap().push(i);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                    })
                    .await
                    .unwrap(),
            );
        }
        for ticket in tickets {
            ticket.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_start_order_with_deep_queue() {
        let dispatcher = Dispatcher::new(3, 16);
        let started = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(Mutex::new(Vec::new()));

        let mut tickets = Vec::new();
        for i in 0..10u64 {
            let started = Arc::clone(&started);
            let finished = Arc::clone(&finished);
            tickets.push(
                dispatcher
                    .enqueue(async move {
                        started.lock().unwrap().push(i);
                        // 先提交的作业耗时更长，完成顺序与提交顺序相反
                        tokio::time::sleep(Duration::from_millis(10 * (10 - i))).await;
                        finished.lock().unwrap().push(i);
                    })
                    .await
                    .unwrap(),
            );
        }
        for ticket in tickets {
            ticket.await.unwrap();
        }

        assert_eq!(*started.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert_ne!(*finished.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert_eq!(dispatcher.stats().peak_active, 3);
    }

    #[tokio::test]
    async fn test_errors_release_slot() {
        let dispatcher = Dispatcher::new(1, 16);

        let failed: TranslationResult<Result<(), String>> =
            dispatcher.submit(async { Err("boom".to_string()) }).await;
        assert_eq!(failed.unwrap(), Err("boom".to_string()));

        let next = dispatcher.submit(async { 7 }).await.unwrap();
        assert_eq!(next, 7);
        assert_eq!(dispatcher.stats().active, 0);
    }

    #[tokio::test]
    async fn test_panic_releases_slot() {
        let dispatcher = Dispatcher::new(1, 16);

        let panicked = dispatcher
            .submit(async {
                if true {
                    panic!("job exploded");
                }
            })
            .await;
        assert!(matches!(
            panicked,
            Err(TranslationError::ConcurrencyError(_))
        ));

        let next = dispatcher.submit(async { "after" }).await.unwrap();
        assert_eq!(next, "after");
        assert_eq!(dispatcher.stats().completed, 2);
    }
}
