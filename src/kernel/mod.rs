//! # 内核模块 (Kernel Module)
//!
//! 无状态的协议操作处理器，共享一个求值上下文 [`Evaluator`]。上下文
//! 持有四个协作服务：通信端点、随机源、Beaver 提供者与打开值缓存。
//!
//! ## 调度模型 (Scheduling Model)
//!
//! 每个参与方由单个逻辑求值线程顺序处理操作；操作内部的逐元素工作在
//! 环代数层做数据并行。参与方之间靠集合通信的顺序锁步协作：所有方
//! 必须以相同顺序、相同标签执行相同的集合通信序列。唯一的阻塞点是
//! 网络原语；环运算、随机数与缓存查询都是 CPU 工作。
//!
//! ## 操作一览 (Operations)
//!
//! - 份额转换: `rand_a` / `p2a` / `a2p` / `v2a` / `a2v` / `negate_a`
//! - 线性运算: `add_ap` / `add_aa` / `sub_aa` / `sub_ap` / `mul_ap` /
//!   `matmul_ap` / `lshift_a`
//! - 乘法: `mul_aa` / `square_a` / `matmul_aa` / `mul_a1b` / `mul_vvs`
//! - 截断: `trunc_a` / `trunc_a_pr` / `trunc_a_pr2`
//! - 缓存: `enable_cache` / `disable_cache`

pub mod conversion;
pub mod linear;
pub mod mul;
pub mod trunc;

pub use trunc::TruncSign;

use crate::beaver::{BeaverCache, BeaverProvider};
use crate::comm::{CommStats, Communicator};
use crate::prg::PrgState;
use crate::ring::{ElementType, RingField, Tensor};
use crate::{MpcError, Result};
use tracing::debug;

/// 单个参与方的求值上下文
///
/// 操作处理器本身无状态；跨操作的状态（PRSS 计数器、Beaver 缓存、
/// 通信计数）都集中在这里，由求值线程独占访问。
pub struct Evaluator {
    comm: Communicator,
    prg: PrgState,
    provider: Box<dyn BeaverProvider>,
    cache: BeaverCache,
}

impl Evaluator {
    pub fn new(comm: Communicator, prg: PrgState, provider: Box<dyn BeaverProvider>) -> Evaluator {
        debug!(rank = comm.rank(), world = comm.world_size(), "evaluator up");
        Evaluator {
            comm,
            prg,
            provider,
            cache: BeaverCache::new(),
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    #[inline]
    pub fn world_size(&self) -> usize {
        self.comm.world_size()
    }

    /// 通信统计快照（轮数 / 字节数）
    pub fn comm_stats(&self) -> CommStats {
        self.comm.stats()
    }

    pub(crate) fn comm(&self) -> &Communicator {
        &self.comm
    }

    pub(crate) fn prg_mut(&mut self) -> &mut PrgState {
        &mut self.prg
    }

    pub(crate) fn provider_mut(&mut self) -> &mut dyn BeaverProvider {
        self.provider.as_mut()
    }

    pub(crate) fn cache(&self) -> &BeaverCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut BeaverCache {
        &mut self.cache
    }

    /// 为张量开启 Beaver 掩码缓存
    ///
    /// 下一次以该张量为操作数的乘法会记录掩码重放描述符并缓存打开的
    /// x−a；后续乘法复用同一掩码并跳过打开轮。开启缓存后张量的缓冲区
    /// 必须保持不变。
    pub fn enable_cache(&mut self, t: &Tensor) {
        debug!(buffer = t.buffer_id(), "enable beaver cache");
        self.cache.enable(t);
    }

    /// 关闭缓存并丢弃该张量的条目
    pub fn disable_cache(&mut self, t: &Tensor) {
        debug!(buffer = t.buffer_id(), "disable beaver cache");
        self.cache.disable(t);
    }
}

// ---- 操作入口处的结构检查 ----

pub(crate) fn expect_arith(t: &Tensor) -> Result<RingField> {
    match t.ty() {
        ElementType::Arith(f) => Ok(f),
        other => Err(MpcError::TypeMismatch(format!(
            "expected an arithmetic share, got {other:?}"
        ))),
    }
}

pub(crate) fn expect_public(t: &Tensor) -> Result<RingField> {
    match t.ty() {
        ElementType::Public(f) => Ok(f),
        other => Err(MpcError::TypeMismatch(format!(
            "expected a public tensor, got {other:?}"
        ))),
    }
}

pub(crate) fn expect_private(t: &Tensor) -> Result<(RingField, usize)> {
    match t.ty() {
        ElementType::Private(f, owner) => Ok((f, owner)),
        other => Err(MpcError::TypeMismatch(format!(
            "expected a private tensor, got {other:?}"
        ))),
    }
}

pub(crate) fn expect_bool(t: &Tensor) -> Result<RingField> {
    match t.ty() {
        ElementType::Bool(f) => Ok(f),
        other => Err(MpcError::TypeMismatch(format!(
            "expected a boolean share, got {other:?}"
        ))),
    }
}

pub(crate) fn expect_same_field(a: &Tensor, b: &Tensor) -> Result<RingField> {
    if a.field() != b.field() {
        return Err(MpcError::TypeMismatch(format!(
            "operands live in different rings: {:?} vs {:?}",
            a.field(),
            b.field()
        )));
    }
    Ok(a.field())
}

pub(crate) fn expect_same_shape(a: &Tensor, b: &Tensor) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(MpcError::ShapeMismatch(format!(
            "operand shapes differ: {:?} vs {:?}",
            a.shape(),
            b.shape()
        )));
    }
    Ok(())
}
