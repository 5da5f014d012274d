//! Beaver open-value cache
//!
//! Caches the opened masked value x−a together with the replay descriptor of
//! the mask a, keyed by the identity of the operand's backing buffer. A
//! later multiplication that reuses the operand passes the descriptor back
//! to the provider (which regenerates the same a) and skips the open round.
//!
//! Cached tensors are treated as immutable once caching is enabled; the
//! kernel never mutates buffers, so an entry stays valid until the tensor is
//! explicitly disabled or the evaluator is dropped. The cache only ever
//! stores the opened masked value, which is already public.

use super::ReplayDesc;
use crate::ring::Tensor;
use std::collections::{HashMap, HashSet};

/// 缓存条目：掩码重放描述符 + 已打开的 x−a
#[derive(Debug, Clone)]
pub struct CachedOpen {
    pub replay: ReplayDesc,
    pub opened: Tensor,
}

/// 一次缓存查询的结果
#[derive(Debug, Clone, Default)]
pub struct CacheQuery {
    /// 该操作数是否开启了缓存
    pub enabled: bool,
    /// 已缓存的打开值（若有）
    pub hit: Option<CachedOpen>,
}

/// 求值上下文私有的 Beaver 缓存
///
/// 以 (缓冲区标识, 是否矩阵乘) 为键；逐元素与矩阵乘使用的掩码形状
/// 约定不同，因而互不共享条目。
#[derive(Debug, Default)]
pub struct BeaverCache {
    enabled: HashSet<usize>,
    entries: HashMap<(usize, bool), CachedOpen>,
}

impl BeaverCache {
    pub fn new() -> BeaverCache {
        BeaverCache::default()
    }

    /// 为张量开启缓存；下一次乘法会记录其掩码与打开值
    pub fn enable(&mut self, t: &Tensor) {
        self.enabled.insert(t.buffer_id());
    }

    /// 关闭缓存并丢弃该张量的所有条目
    pub fn disable(&mut self, t: &Tensor) {
        let id = t.buffer_id();
        self.enabled.remove(&id);
        self.entries.remove(&(id, false));
        self.entries.remove(&(id, true));
    }

    pub fn get(&self, t: &Tensor, matmul: bool) -> CacheQuery {
        let id = t.buffer_id();
        if !self.enabled.contains(&id) {
            return CacheQuery::default();
        }
        CacheQuery {
            enabled: true,
            hit: self.entries.get(&(id, matmul)).cloned(),
        }
    }

    /// 记录打开值；仅当该张量已开启缓存时生效
    pub fn set(&mut self, t: &Tensor, matmul: bool, replay: ReplayDesc, opened: Tensor) {
        let id = t.buffer_id();
        if self.enabled.contains(&id) {
            self.entries.insert((id, matmul), CachedOpen { replay, opened });
        }
    }
}
