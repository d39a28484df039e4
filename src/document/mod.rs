//! 可观察的活动文档
//!
//! 将 `RcDom` 包装为可被宿主代码与翻译管道共同修改的文档。
//! 所有结构修改与字符数据修改都会生成 [`MutationRecord`]，
//! 并投递给根节点覆盖该修改位置的观察者。

pub mod live;
pub mod mutation;

pub use live::{LiveDocument, ObserverId};
pub use mutation::{MutationKind, MutationOrigin, MutationRecord};
